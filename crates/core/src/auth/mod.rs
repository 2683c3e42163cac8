//! Authentication Gate for the Admin Console.

mod gate;
mod traits;
mod types;

pub use gate::{AdminKeyGate, OpenGate};
pub use traits::*;
pub use types::*;

use crate::config::{AuthConfig, AuthMethod};

/// Build the gate described by the `[auth]` section.
pub fn create_authenticator(config: &AuthConfig) -> Result<Box<dyn Authenticator>, AuthError> {
    match config.method {
        AuthMethod::None => Ok(Box::new(OpenGate)),
        AuthMethod::ApiKey => {
            let api_key = config
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| {
                    AuthError::ConfigurationError(
                        "api_key must be set when using the api_key method".to_string(),
                    )
                })?;
            Ok(Box::new(AdminKeyGate::new(api_key, config.admin_name.clone())))
        }
    }
}
