//! Expiry-aware credential cache for Kubernetes exec-credential plugins
//!
//! This crate holds the logic behind `kubecredcache`:
//! - Deriving a cache identity from a wrapped command invocation
//! - Mapping that identity to a file in the cache directory
//! - Deciding whether a cached `ExecCredential` is still usable
//! - Sweeping stale cache files
//!
//! # Overview
//!
//! ```text
//! invocation -> key::build -> CacheStore::read -> ExpiryPolicy::is_expired
//!                                 |                      |
//!                                 +--- miss / expired ---+--> run command -> CacheStore::write
//! ```
//!
//! The cache directory is always passed in explicitly, so every component can
//! be exercised against a temporary directory.

#![expect(
    clippy::missing_errors_doc,
    reason = "Error variants are documented on the Error type"
)]

mod error;
pub mod expiry;
pub mod janitor;
pub mod key;
pub mod store;

pub use error::{Error, Result};

pub use expiry::{DEFAULT_EARLY_MARGIN_SECONDS, ExecCredential, ExecCredentialStatus, ExpiryPolicy};
pub use janitor::{DEFAULT_RETENTION_SECONDS, Janitor, RESERVED_FILE_NAMES, SweepReport};
pub use key::{CacheKey, CommandFamily, ParsedIdentity, build, parse};
pub use store::CacheStore;
