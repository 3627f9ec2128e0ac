//! Settings errors.

use thiserror::Error;

/// Result alias for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

/// Errors raised while interpreting configuration.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// An environment variable held a value that could not be parsed.
    #[error("invalid value for {variable}: {message}")]
    InvalidValue {
        /// Variable name.
        variable: &'static str,
        /// Parse failure description.
        message: String,
    },
}
