use std::env;
use std::time::Duration;

/// Upstream reference endpoint settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpellSourceConfig {
    /// `http(s)://` URL queried per name, or a `file://` URL holding the whole list.
    /// A `{name}` placeholder is replaced by the requested name; otherwise the
    /// name is sent as the `name` query parameter.
    pub endpoint: String,
    pub timeout: Duration,
}

impl SpellSourceConfig {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.open5e.com/v1/spells/";

    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `PRINTSHEET_SPELL_ENDPOINT`: endpoint URL (default: [`Self::DEFAULT_ENDPOINT`])
    /// - `PRINTSHEET_SPELL_TIMEOUT_MS`: request timeout in milliseconds (default: 10000)
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let endpoint = env::var("PRINTSHEET_SPELL_ENDPOINT")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(defaults.endpoint);
        let timeout = env::var("PRINTSHEET_SPELL_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or(defaults.timeout, Duration::from_millis);
        Self { endpoint, timeout }
    }
}

impl Default for SpellSourceConfig {
    fn default() -> Self {
        Self {
            endpoint: String::from(Self::DEFAULT_ENDPOINT),
            timeout: Duration::from_secs(10),
        }
    }
}
