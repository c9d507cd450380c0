//! Secrets loaded from environment variables.
//!
//! These are read once at startup (after `.env` has been loaded) and never
//! written to the settings file.

use crate::errors::{Error, Result};

/// Secret material the service needs at runtime.
#[derive(Clone)]
pub struct Secrets {
    /// HMAC key for signing auth tokens (`JWT_SECRET`)
    pub jwt_secret: String,
    /// Generative Language API key (`GEMINI_API_KEY`), optional
    pub gemini_api_key: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("jwt_secret", &"<redacted>")
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Reads secrets from the environment.
///
/// # Errors
/// Returns [`Error::Config`] when `JWT_SECRET` is missing or shorter than 32 bytes.
pub fn load_secrets() -> Result<Secrets> {
    let jwt_secret = std::env::var("JWT_SECRET").map_err(|_| Error::Config {
        message: "JWT_SECRET must be set".to_string(),
    })?;
    if jwt_secret.len() < 32 {
        return Err(Error::Config {
            message: "JWT_SECRET must be at least 32 bytes".to_string(),
        });
    }

    let gemini_api_key = std::env::var("GEMINI_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty());
    if gemini_api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY not set; chatbot questions will fail");
    }

    Ok(Secrets {
        jwt_secret,
        gemini_api_key,
    })
}
