//! # Error Handling
//!
//! This module defines the centralized error type for the `heat-merge`
//! library. It uses the `thiserror` library to create an `Error` enum that
//! covers every fatal failure mode of a merge.
//!
//! ## Key Components
//!
//! - **`Error`**: The enum of fatal errors. Any of these aborts the whole
//!   merge call; no partial document is returned.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! Non-fatal merge conflicts (two templates defining the same parameter with
//! different bodies, and so on) are *not* errors in this sense. They are
//! collected as [`crate::template::merge::Conflict`] values and reported
//! alongside the merged document.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for heat-merge operations
#[derive(Error, Debug)]
pub enum Error {
    /// A directive or option is malformed.
    ///
    /// Covers bad `__include__` directives, invalid role translations, bad
    /// scaling rules, malformed `Merge::Map` bodies and unresolvable
    /// `SubKey` paths.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Config {
        message: String,
        /// Optional hint for how to fix the input
        hint: Option<String>,
    },

    /// A template does not have the shape a merge needs.
    #[error("Invalid template {path}: {message}")]
    InvalidTemplate { path: String, message: String },

    /// A scalar would be multiplied by scaling where only one value fits.
    #[error("Scaling error for '{value}': {message}")]
    Scaling { value: String, message: String },

    /// A template, include or `FileInclude` target could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing or serialization error, wrapped from `serde_yaml::Error`.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON serialization error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a [`Error::Config`] without a hint.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            hint: None,
        }
    }

    /// Shorthand for a [`Error::Config`] with a hint.
    pub fn config_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
