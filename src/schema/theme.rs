use serde::{Deserialize, Serialize};
use std::fmt;

/// Newtype wrapper for theme keys (e.g. `"forest"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThemeKey(pub String);

impl ThemeKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThemeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ThemeKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A themed story offered on the selection screen.
///
/// Themes are fixed when the catalog is built and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub key: ThemeKey,
    pub display_name: String,
    pub description: String,
}
