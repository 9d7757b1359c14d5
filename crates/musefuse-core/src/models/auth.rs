use serde::{Deserialize, Serialize};

/// Response envelope for `/login` and `/refresh-token`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginResponse {
    pub error: bool,
    #[serde(default)]
    pub token: Option<String>,
    /// Seconds until the token expires
    #[serde(rename = "expiresIn", default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl LoginResponse {
    /// The issued token, if the backend reported success and supplied one.
    pub fn granted_token(&self) -> Option<&str> {
        if self.error {
            return None;
        }
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn message_or(&self, fallback: &str) -> String {
        self.message
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Generic `{error, message}` envelope used by register and delete.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    pub error: bool,
    #[serde(default)]
    pub message: Option<String>,
}
