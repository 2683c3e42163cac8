//! Authenticator implementations.

use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Accepts every request as the console identity.
///
/// Must be explicitly configured; there is no implicit fallback to it.
#[derive(Debug, Default)]
pub struct OpenGate;

#[async_trait]
impl Authenticator for OpenGate {
    async fn authenticate(&self, _request: &AuthRequest) -> Result<Identity, AuthError> {
        Ok(Identity::console())
    }

    fn method_name(&self) -> &'static str {
        "none"
    }
}

/// Validates a shared admin key passed as `Authorization: Bearer <key>` or `X-API-Key`.
pub struct AdminKeyGate {
    expected_key: String,
    admin_name: String,
}

impl AdminKeyGate {
    pub fn new(api_key: impl Into<String>, admin_name: impl Into<String>) -> Self {
        Self {
            expected_key: api_key.into(),
            admin_name: admin_name.into(),
        }
    }

    fn presented_key<'a>(&self, request: &'a AuthRequest) -> Option<&'a str> {
        if let Some(value) = request.header("authorization") {
            let value = value.trim();
            if let Some(key) = value
                .strip_prefix("Bearer ")
                .or_else(|| value.strip_prefix("bearer "))
            {
                return Some(key.trim());
            }
        }
        request.header("x-api-key").map(str::trim)
    }
}

#[async_trait]
impl Authenticator for AdminKeyGate {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let key = self
            .presented_key(request)
            .ok_or(AuthError::NotAuthenticated)?;

        if constant_time_eq(key.as_bytes(), self.expected_key.as_bytes()) {
            Ok(Identity {
                admin: self.admin_name.clone(),
                method: "api_key".to_string(),
            })
        } else {
            Err(AuthError::InvalidCredentials("Invalid API key".to_string()))
        }
    }

    fn method_name(&self) -> &'static str {
        "api_key"
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
