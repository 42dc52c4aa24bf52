use serde::{Deserialize, Serialize};

/// Construction-time settings for a [`KeyValueStore`](crate::KeyValueStore).
///
/// The prefix namespaces every key as `prefix:key`. An empty prefix behaves
/// exactly like no prefix.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub prefix: Option<String>,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Load a config from a JSON document such as `{"prefix": "app"}`.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// The prefix in effect, with the empty string folded into `None`.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref().filter(|p| !p.is_empty())
    }
}
