//! Selector registry and defaults for a print sheet.
//!
//! Everything the engine needs to know about the host page and its own DOM
//! vocabulary is passed in through [`LayoutConfig`]; nothing is global.

use serde::{Deserialize, Serialize};

use crate::model::SectionGeometry;
use crate::px::Px;

/// A built-in section and where its content comes from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionDefault {
    pub id: String,
    /// Host page element whose content populates the section.
    #[serde(default)]
    pub region_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub geometry: SectionGeometry,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    /// Id of the element that hosts every floating element.
    pub container_id: String,
    pub default_sections: Vec<SectionDefault>,
    /// Closed set of border style names.
    pub border_styles: Vec<String>,
    /// Class prefix that turns a border style name into a class.
    pub border_class_prefix: String,
    /// Tags removed from snapshots.
    pub interactive_tags: Vec<String>,
    /// Elements carrying any of these classes are removed from snapshots.
    pub non_printable_classes: Vec<String>,
    /// Classes that mark a label usable as a title.
    pub title_classes: Vec<String>,
    pub untitled_label: String,
    /// Class suffixes of inner structural containers.
    pub header_suffix: String,
    pub content_suffix: String,
    /// Placement of newly created elements.
    pub placement: SectionGeometry,
    /// Offset applied to duplicates relative to their source.
    pub cascade_offset: Px,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            container_id: String::from("ps-print-layout"),
            default_sections: Vec::new(),
            border_styles: ["none", "solid", "dashed", "dotted", "double", "ornate"]
                .map(String::from)
                .to_vec(),
            border_class_prefix: String::from("ps-border-"),
            interactive_tags: ["button", "select", "input", "textarea", "menu"]
                .map(String::from)
                .to_vec(),
            non_printable_classes: ["no-print", "ps-no-print"].map(String::from).to_vec(),
            title_classes: ["ps-label", "section-title"].map(String::from).to_vec(),
            untitled_label: String::from("Untitled"),
            header_suffix: String::from("__header"),
            content_suffix: String::from("__content"),
            placement: SectionGeometry::at(24, 24).sized(320, 200),
            cascade_offset: Px(16.0),
        }
    }
}

impl LayoutConfig {
    pub fn section_default(&self, id: &str) -> Option<&SectionDefault> {
        self.default_sections.iter().find(|section| section.id == id)
    }

    pub fn is_border_style(&self, style: &str) -> bool {
        self.border_styles.iter().any(|known| known == style)
    }

    pub fn border_class(&self, style: &str) -> String {
        format!("{}{style}", self.border_class_prefix)
    }

    pub fn is_structural_class(&self, class: &str) -> bool {
        (!self.header_suffix.is_empty() && class.ends_with(&self.header_suffix))
            || (!self.content_suffix.is_empty() && class.ends_with(&self.content_suffix))
    }
}
