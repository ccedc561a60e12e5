//! API key guard configuration.

use serde::{Deserialize, Serialize};

/// Static pre-shared key checked on every request except the health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// The expected key value. An empty key disables the guard.
    #[serde(default)]
    pub api_key: String,
    /// Request header carrying the key.
    #[serde(default = "default_header_name")]
    pub header_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            header_name: default_header_name(),
        }
    }
}

impl AuthConfig {
    /// Whether requests must present a key.
    pub fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }
}

fn default_header_name() -> String {
    "x-api-key".to_string()
}
