//! Error types for the credential cache

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for credential cache operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// I/O error while reading or writing the cache directory
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(kubecredcache::cache::io),
        help("Check that the cache directory exists and is readable and writable")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "write", "create_dir_all")
        operation: String,
    },

    /// The invocation does not carry enough information to build a cache key
    #[error("Unable to determine cache identity: {reason}")]
    #[diagnostic(code(kubecredcache::cache::missing_identity))]
    MissingIdentity {
        /// What was missing
        reason: String,
    },

    /// A cache key that cannot be mapped to a file name
    #[error("Cache key is invalid: {key}")]
    #[diagnostic(code(kubecredcache::cache::invalid_key))]
    InvalidKey {
        /// Debug rendering of the offending key
        key: String,
    },

    /// Cached payload is not a well-formed exec credential
    #[error("Unable to parse cache entry: {message}")]
    #[diagnostic(code(kubecredcache::cache::payload))]
    PayloadParse {
        /// Error message describing the parse failure
        message: String,
    },

    /// Configuration or environment error
    #[error("Cache configuration error: {message}")]
    #[diagnostic(code(kubecredcache::cache::config))]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create a missing identity error
    #[must_use]
    pub fn missing_identity(reason: impl Into<String>) -> Self {
        Self::MissingIdentity {
            reason: reason.into(),
        }
    }

    /// Create an invalid key error
    #[must_use]
    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::InvalidKey { key: key.into() }
    }

    /// Create a payload parse error
    #[must_use]
    pub fn payload(msg: impl Into<String>) -> Self {
        Self::PayloadParse {
            message: msg.into(),
        }
    }
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, Error>;
