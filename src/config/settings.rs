//! Service settings loading from config.toml
//!
//! Every section and field has a default, so a missing file or a partial file
//! both produce a usable configuration. Secrets never live here; see
//! [`crate::config::secrets`].

use crate::core::anomaly::AnomalyPolicy;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// HTTP listener settings
    pub server: ServerSettings,
    /// File upload limits and storage
    pub uploads: UploadSettings,
    /// Anomaly detection behavior
    pub anomaly: AnomalySettings,
    /// Assistant model and context limits
    pub chatbot: ChatbotSettings,
    /// Token lifetime
    pub auth: AuthSettings,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address the API binds to
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// File upload limits and storage
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Largest accepted upload in bytes
    pub max_bytes: usize,
    /// Directory uploaded source files are copied into
    pub upload_dir: PathBuf,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            upload_dir: PathBuf::from("data/uploads"),
        }
    }
}

/// Anomaly detection behavior
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct AnomalySettings {
    /// What to do when a department is still over budget on a repeated check
    pub policy: AnomalyPolicy,
}

/// Assistant model and context limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatbotSettings {
    /// Generative model name
    pub model: String,
    /// Base URL of the Generative Language API
    pub api_base: String,
    /// Most recent session entries sent with each question
    pub max_history_entries: usize,
    /// Upper bound on the assembled prompt, in characters
    pub max_context_chars: usize,
}

impl Default for ChatbotSettings {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            max_history_entries: 20,
            max_context_chars: 12_000,
        }
    }
}

/// Token lifetime
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Hours an issued token stays valid
    pub token_ttl_hours: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self { token_ttl_hours: 24 }
    }
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if the file exists but cannot be read, or if the TOML is invalid.
/// A missing file yields [`Settings::default`].
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::info!("No config file at {}, using defaults", path.display());
        return Ok(Settings::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path.display()),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path.display()),
    })
}

/// Loads settings from `CONFIG_PATH`, or ./config.toml when unset
pub fn load_default_config() -> Result<Settings> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_config(path)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
            [server]
            bind_address = "127.0.0.1:3000"

            [anomaly]
            policy = "one_open_per_department"

            [chatbot]
            max_history_entries = 4
        "#;

        let settings: Settings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.server.bind_address, "127.0.0.1:3000");
        assert_eq!(settings.anomaly.policy, AnomalyPolicy::OneOpenPerDepartment);
        assert_eq!(settings.chatbot.max_history_entries, 4);
        // Untouched fields keep their defaults
        assert_eq!(settings.chatbot.max_context_chars, 12_000);
        assert_eq!(settings.uploads.max_bytes, 10 * 1024 * 1024);
        assert_eq!(settings.auth.token_ttl_hours, 24);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.anomaly.policy, AnomalyPolicy::RecordEvery);
        assert_eq!(settings.server.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let settings = load_config("definitely/not/here.toml").unwrap();
        assert_eq!(settings.chatbot.model, "gemini-1.5-flash");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = toml::from_str::<Settings>("[server\nbind_address = 3").unwrap_err();
        assert!(!err.to_string().is_empty());
    }
}
