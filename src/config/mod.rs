/// Database configuration and connection management
pub mod database;

/// Secrets read from environment variables
pub mod secrets;

/// Service settings loading from config.toml
pub mod settings;
