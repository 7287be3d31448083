//! Cache lookup and fallthrough to the wrapped command

use crate::cli::{CliError, EXIT_OK};
use crate::runner::{CommandRunner, RunError};
use kubecredcache_cache::{CacheStore, ExpiryPolicy, key};
use std::fmt;
use std::io::Write;

/// How an invocation was served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// A fresh cached payload was returned
    Hit,
    /// No cache entry existed
    MissEmpty,
    /// A cache entry existed but was expired or unreadable
    MissExpired,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hit => write!(f, "cache hit"),
            Self::MissEmpty => write!(f, "cache miss (cache empty)"),
            Self::MissExpired => write!(f, "cache miss (token expired)"),
        }
    }
}

/// A wrapped command line
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// Wrapped command name
    pub command: &'a str,
    /// Arguments passed through to it
    pub args: &'a [String],
    /// Access key identifier of the caller
    pub access_key: &'a str,
}

/// Outcome of [`Orchestrator::execute`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Hit or kind of miss
    pub disposition: Disposition,
    /// Process exit code to report
    pub exit_code: i32,
}

/// Serves credentials from the cache or runs the wrapped command
#[derive(Debug)]
pub struct Orchestrator<R> {
    store: CacheStore,
    policy: ExpiryPolicy,
    runner: R,
    quiet: bool,
}

impl<R: CommandRunner> Orchestrator<R> {
    /// Create an orchestrator over `store`
    pub fn new(store: CacheStore, policy: ExpiryPolicy, runner: R) -> Self {
        Self {
            store,
            policy,
            runner,
            quiet: false,
        }
    }

    /// Suppress the status line
    #[must_use]
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Serve one invocation.
    ///
    /// The credential goes to `stdout`; the status line goes to `status`.
    /// On a miss the wrapped command's output is mirrored to `stdout` while
    /// it runs and cached only if the command exits successfully.
    ///
    /// # Errors
    ///
    /// Returns an error if no cache key can be derived, the cache cannot be
    /// read or written, the wrapped command cannot be started, or its output
    /// cannot be relayed.
    pub fn execute(
        &self,
        invocation: Invocation<'_>,
        stdout: &mut dyn Write,
        status: &mut dyn Write,
    ) -> Result<Outcome, CliError> {
        let key = key::build(invocation.command, invocation.args, invocation.access_key)?;
        let cached = self.store.read(&key)?;

        let disposition = match &cached {
            None => Disposition::MissEmpty,
            Some(payload) if self.policy.is_expired(payload) => Disposition::MissExpired,
            Some(_) => Disposition::Hit,
        };
        tracing::info!(
            cluster_id = %key.cluster_id,
            region = key.region.as_deref().unwrap_or(""),
            %disposition,
            "Resolved cache disposition"
        );

        if let (Disposition::Hit, Some(payload)) = (disposition, &cached) {
            self.report(status, &disposition.to_string());
            stdout
                .write_all(payload)
                .and_then(|()| stdout.flush())
                .map_err(|e| CliError::cache(format!("Error returning cached data: {e}")))?;
            return Ok(Outcome {
                disposition,
                exit_code: EXIT_OK,
            });
        }

        self.report(
            status,
            &format!("{disposition}; calling '{}'", invocation.command),
        );
        let output = self
            .runner
            .run(invocation.command, invocation.args, stdout)
            .map_err(|e| match e {
                RunError::Spawn(source) => CliError::exec(invocation.command, source.to_string()),
                RunError::Relay(source) => CliError::cache(format!(
                    "Error relaying output of '{}': {source}",
                    invocation.command
                )),
            })?;

        if !output.success() {
            tracing::warn!(
                command = invocation.command,
                code = output.code,
                "Wrapped command failed; not caching its output"
            );
            return Ok(Outcome {
                disposition,
                exit_code: output.code,
            });
        }

        self.store.write(&key, &output.stdout)?;
        Ok(Outcome {
            disposition,
            exit_code: EXIT_OK,
        })
    }

    fn report(&self, status: &mut dyn Write, line: &str) {
        if self.quiet {
            return;
        }
        // The status line is informational; a closed stderr must not fail the request.
        let _ = writeln!(status, "kubecredcache: {line}");
    }
}
