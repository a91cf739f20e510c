//! Unified error type for the offer configurator.
//!
//! Variants fall in four groups: validation, not-found, configuration and
//! infrastructure. The first two are safe to show to a client verbatim, the
//! database variant is reported as a generic failure.

use thiserror::Error;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// A request failed validation
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable reason
        message: String,
    },

    /// A category string is not one of `TILE`, `GUTTER`, `ACCESSORY`
    #[error("Invalid category: {value}")]
    InvalidCategory {
        /// The rejected input
        value: String,
    },

    /// An enum-like text field holds an unknown value
    #[error("Invalid {kind}: {value}")]
    InvalidEnumValue {
        /// Which field was being parsed (e.g. "group option")
        kind: &'static str,
        /// The rejected input
        value: String,
    },

    /// Monetary amount or percent out of range, NaN or infinite
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected value
        amount: f64,
    },

    /// The referenced project does not exist
    #[error("Project not found: {id}")]
    ProjectNotFound {
        /// Project id
        id: i64,
    },

    /// The referenced catalog product does not exist
    #[error("Product not found: {id}")]
    ProductNotFound {
        /// Product id
        id: i64,
    },

    /// The referenced task does not exist
    #[error("Task not found: {id}")]
    TaskNotFound {
        /// Task id
        id: i64,
    },

    /// Database or batch statement failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Whether the error was caused by the caller (validation or not-found)
    /// rather than by the backend.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::InvalidCategory { .. }
                | Self::InvalidEnumValue { .. }
                | Self::InvalidAmount { .. }
                | Self::ProjectNotFound { .. }
                | Self::ProductNotFound { .. }
                | Self::TaskNotFound { .. }
        )
    }

    /// Message suitable for the presentation layer. Infrastructure details
    /// are not leaked.
    #[must_use]
    pub fn user_message(&self) -> String {
        if self.is_client_error() {
            self.to_string()
        } else {
            "Internal error, please try again later".to_string()
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_keep_their_message() {
        let err = Error::ProjectNotFound { id: 42 };
        assert!(err.is_client_error());
        assert_eq!(err.user_message(), "Project not found: 42");

        let err = Error::InvalidCategory {
            value: "ROOF".to_string(),
        };
        assert_eq!(err.user_message(), "Invalid category: ROOF");
    }

    #[test]
    fn test_infrastructure_errors_are_generic() {
        let err = Error::Database(sea_orm::DbErr::Custom("disk I/O error".to_string()));
        assert!(!err.is_client_error());
        assert!(!err.user_message().contains("disk"));
    }
}
