use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Credentials presented by an Admin Console request.
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    /// Header names lowercased.
    pub headers: HashMap<String, String>,
}

impl AuthRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// The admin an operation is performed on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Recorded as `submitted_by` / audit `user_id`.
    pub admin: String,
    pub method: String,
}

impl Identity {
    /// Identity used when the gate is configured open (`method = "none"`).
    pub fn console() -> Self {
        Self {
            admin: "console".to_string(),
            method: "none".to_string(),
        }
    }
}
