// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

//! kubecredcache - caching wrapper for Kubernetes exec-credential commands
//!
//! `kubectl` runs the command configured under `users[].user.exec` every time
//! it needs a token. Pointing that entry at `kubecredcache` instead keeps the
//! last credential per cluster, region and access key on disk and serves it
//! until shortly before it expires:
//!
//! ```yaml
//! exec:
//!   apiVersion: client.authentication.k8s.io/v1beta1
//!   command: kubecredcache
//!   args: [aws, --region, us-west-2, eks, get-token, --cluster-name, prod]
//! ```
//!
//! The storage layer lives in `kubecredcache-cache`; this crate wires it to
//! the process environment.

/// CLI argument parsing, errors and exit codes.
pub mod cli;
/// Rewriting kubeconfig exec entries to go through the wrapper.
pub mod install;
/// Cache lookup and fallthrough to the wrapped command.
pub mod orchestrator;
/// Running the wrapped command.
pub mod runner;
/// Settings from `config.toml` and the environment.
pub mod settings;
/// Structured logging setup.
pub mod tracing;

pub use install::InstallArgs;
pub use orchestrator::{Disposition, Invocation, Orchestrator, Outcome};
pub use runner::{CommandRunner, RunError, RunOutput, SystemRunner};
pub use settings::Settings;
