//! Error types for md2pdf studio
//!
//! This module defines the error types shared across the crate. Errors are
//! organized by category; each user-facing category can produce a message
//! suitable for an alert.

use std::path::PathBuf;
use thiserror::Error;

pub use crate::markdown::export::ExportError;
pub use crate::markdown::grammar::GrammarError;

/// Main application error type encompassing all error categories
#[derive(Error, Debug)]
pub enum AppError {
    /// File or URL import errors
    #[error(transparent)]
    Import(#[from] ImportError),

    /// PDF render job errors
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Style option errors
    #[error(transparent)]
    Style(#[from] StyleError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Grammar loading errors
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    /// File watcher errors
    #[error(transparent)]
    Watcher(#[from] WatcherError),
}

/// Errors raised while importing Markdown from a file or a URL
#[derive(Error, Debug)]
pub enum ImportError {
    /// The file type is not accepted
    #[error("Unsupported file type: {name}")]
    DisallowedFile { name: String },

    /// The remote URL does not point at an accepted document type
    #[error("Unsupported URL: {url}")]
    DisallowedUrl { url: String },

    /// File not found at specified path
    #[error("File not found: {path}")]
    NotFound { path: PathBuf },

    /// File is too large to open
    #[error("File too large: {path} ({size} bytes, max {max_size} bytes)")]
    TooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    /// File content is not UTF-8 text
    #[error("Unable to read file as text: {path}")]
    Encoding { path: PathBuf },

    /// Error reading file
    #[error("Could not read file: {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Remote server answered with a non-success status
    #[error("Fetching {url} failed with status {status}")]
    Status { url: String, status: u16 },

    /// Transport failure while fetching a URL
    #[error("Could not fetch {url}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Style option errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StyleError {
    /// Option name is not part of the style schema
    #[error("Unknown style option: {0}")]
    UnknownOption(String),

    /// Value type does not match the option's declared type
    #[error("Style option {name} expects a {expected} value")]
    TypeMismatch { name: String, expected: &'static str },

    /// Numeric input could not be parsed
    #[error("Invalid number for {name}: {raw:?}")]
    InvalidNumber { name: String, raw: String },

    /// Boolean input could not be parsed
    #[error("Invalid toggle value for {name}: {raw:?}")]
    InvalidToggle { name: String, raw: String },

    /// Color input did not normalize to a #RRGGBB value
    #[error("Invalid color for {name}: {raw:?}")]
    InvalidColor { name: String, raw: String },

    /// No input is registered under this binding id
    #[error("Unknown input binding: {0}")]
    UnknownBinding(usize),
}

/// Configuration related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error loading configuration file
    #[error("Could not load configuration: {0}")]
    LoadError(String),

    /// Error parsing configuration
    #[error("Invalid configuration format: {0}")]
    ParseError(String),

    /// Invalid configuration value
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    /// Configuration directory error
    #[error("Could not access configuration directory")]
    DirectoryError,
}

/// File watcher errors
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Could not initialize file watcher
    #[error("Could not start file watcher: {0}")]
    InitError(String),

    /// Could not watch path
    #[error("Could not watch path: {path}")]
    WatchError {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Result type alias for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for import operations
pub type ImportResult<T> = Result<T, ImportError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for style operations
pub type StyleResult<T> = Result<T, StyleError>;

impl ImportError {
    /// Create a user-friendly error message suitable for an alert
    pub fn user_message(&self) -> String {
        match self {
            ImportError::DisallowedFile { .. } => {
                "Only text or Markdown files can be uploaded (.md, .markdown, .txt).".to_string()
            }
            ImportError::DisallowedUrl { .. } => {
                "Only Markdown URLs are allowed (.md, .markdown, .mdown, .txt).".to_string()
            }
            ImportError::NotFound { .. } => {
                "The file could not be found. It may have been moved or deleted.".to_string()
            }
            ImportError::TooLarge { max_size, .. } => {
                format!(
                    "This file is too large to open. Maximum file size is {} bytes.",
                    max_size
                )
            }
            ImportError::Encoding { .. } => {
                "This file cannot be opened as text. It may be a binary file or use an unsupported encoding.".to_string()
            }
            ImportError::Status { .. } | ImportError::Fetch { .. } => {
                "Could not load the file from this link. Try a raw link (raw.githubusercontent.com) or another source.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl AppError {
    /// Message shown to the user for a failed action
    pub fn user_message(&self) -> String {
        match self {
            AppError::Import(err) => err.user_message(),
            AppError::Export(err) => err.user_message(),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_error_display() {
        let err = ImportError::NotFound {
            path: PathBuf::from("/test/file.md"),
        };
        assert!(err.to_string().contains("/test/file.md"));
    }

    #[test]
    fn test_disallowed_file_user_message() {
        let err = ImportError::DisallowedFile {
            name: "photo.png".to_string(),
        };
        assert!(err.user_message().contains(".md"));
    }

    #[test]
    fn test_app_error_from_style_error() {
        let style_err = StyleError::UnknownOption("fontWeight".to_string());
        let app_err: AppError = style_err.into();
        assert!(matches!(app_err, AppError::Style(_)));
        assert!(app_err.user_message().contains("fontWeight"));
    }
}
