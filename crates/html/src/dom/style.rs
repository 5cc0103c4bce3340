//! Class list and inline style helpers.

use indextree::NodeId;

use super::Document;

/// Split an inline `style` attribute into `(property, value)` pairs.
/// Property names are lowercased; empty declarations are dropped.
pub fn parse_declarations(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|declaration| {
            let (property, value) = declaration.split_once(':')?;
            let property = property.trim().to_ascii_lowercase();
            let value = value.trim();
            if property.is_empty() || value.is_empty() {
                return None;
            }
            Some((property, value.to_owned()))
        })
        .collect()
}

pub fn serialize_declarations(declarations: &[(String, String)]) -> String {
    declarations
        .iter()
        .map(|(property, value)| format!("{property}: {value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Document {
    pub fn classes(&self, node: NodeId) -> Vec<String> {
        self.attr(node, "class")
            .map(|value| value.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attr(node, "class")
            .is_some_and(|value| value.split_whitespace().any(|token| token == class))
    }

    pub fn set_classes(&mut self, node: NodeId, classes: &[String]) {
        if classes.is_empty() {
            self.remove_attr(node, "class");
        } else {
            self.set_attr(node, "class", &classes.join(" "));
        }
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        let mut classes = self.classes(node);
        if !classes.iter().any(|token| token == class) {
            classes.push(class.to_owned());
            self.set_classes(node, &classes);
        }
    }

    /// Remove a class, returning whether it was present.
    pub fn remove_class(&mut self, node: NodeId, class: &str) -> bool {
        let mut classes = self.classes(node);
        let before = classes.len();
        classes.retain(|token| token != class);
        let removed = classes.len() != before;
        if removed {
            self.set_classes(node, &classes);
        }
        removed
    }

    /// Remove every class accepted by `predicate`, returning the removed classes.
    pub fn remove_classes_where<F>(&mut self, node: NodeId, predicate: F) -> Vec<String>
    where
        F: Fn(&str) -> bool,
    {
        let (removed, kept): (Vec<String>, Vec<String>) = self
            .classes(node)
            .into_iter()
            .partition(|token| predicate(token));
        if !removed.is_empty() {
            self.set_classes(node, &kept);
        }
        removed
    }

    pub fn style(&self, node: NodeId, property: &str) -> Option<String> {
        let needle = property.to_ascii_lowercase();
        parse_declarations(self.attr(node, "style")?)
            .into_iter()
            .find(|(name, _)| *name == needle)
            .map(|(_, value)| value)
    }

    pub fn set_style(&mut self, node: NodeId, property: &str, value: &str) {
        let needle = property.to_ascii_lowercase();
        let mut declarations = self
            .attr(node, "style")
            .map(parse_declarations)
            .unwrap_or_default();
        if let Some(slot) = declarations.iter_mut().find(|(name, _)| *name == needle) {
            value.clone_into(&mut slot.1);
        } else {
            declarations.push((needle, value.to_owned()));
        }
        self.set_attr(node, "style", &serialize_declarations(&declarations));
    }

    pub fn remove_style(&mut self, node: NodeId, property: &str) -> Option<String> {
        let needle = property.to_ascii_lowercase();
        let mut declarations = parse_declarations(self.attr(node, "style")?);
        let position = declarations.iter().position(|(name, _)| *name == needle)?;
        let (_, value) = declarations.remove(position);
        if declarations.is_empty() {
            self.remove_attr(node, "style");
        } else {
            self.set_attr(node, "style", &serialize_declarations(&declarations));
        }
        Some(value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Test code may use unwrap for simplicity")]
mod tests {
    use super::*;

    #[test]
    fn declarations_round_trip() {
        let parsed = parse_declarations("Left: 10px;top:4px; ;width:");
        assert_eq!(
            parsed,
            vec![
                (String::from("left"), String::from("10px")),
                (String::from("top"), String::from("4px")),
            ]
        );
        assert_eq!(serialize_declarations(&parsed), "left: 10px; top: 4px");
    }
}
