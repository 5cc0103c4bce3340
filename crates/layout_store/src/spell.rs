use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A reference item as supplied by the upstream data source.
///
/// Only `name` is required; unknown fields are kept in `extra` so a cached
/// item serializes back out unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spell {
    pub name: String,
    #[serde(
        default,
        deserialize_with = "lenient_level",
        skip_serializing_if = "Option::is_none"
    )]
    pub level: Option<u32>,
    #[serde(default, alias = "desc")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Spell {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: None,
            description: description.into(),
            range: None,
            school: None,
            extra: Map::new(),
        }
    }
}

/// Levels arrive as numbers, numeric strings or "cantrip".
fn lenient_level<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(number)) => number.as_u64().and_then(|level| u32::try_from(level).ok()),
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            if trimmed.eq_ignore_ascii_case("cantrip") {
                Some(0)
            } else {
                trimmed.parse().ok()
            }
        }
        _ => None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Test code may use unwrap for simplicity")]
mod tests {
    use super::*;

    #[test]
    fn level_accepts_numbers_strings_and_cantrips() {
        let spells: Vec<Spell> = serde_json::from_str(
            r#"[{"name":"A","level":3},{"name":"B","level":"2"},{"name":"C","level":"Cantrip"},{"name":"D","level":null,"components":"V"}]"#,
        )
        .unwrap();
        let levels: Vec<Option<u32>> = spells.iter().map(|spell| spell.level).collect();
        assert_eq!(levels, vec![Some(3), Some(2), Some(0), None]);
        assert_eq!(spells[3].extra.get("components"), Some(&Value::from("V")));
    }
}
