use crate::runner::EXIT_SPAWN_FAILED;
use crate::tracing::{LogLevel, TracingFormat};
use clap::Parser;
use miette::{Diagnostic, Report};
use std::io::{self, Write};
use thiserror::Error;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// Configuration or identity error exit code
pub const EXIT_CONFIG: i32 = 2;
/// Cache directory I/O error exit code
pub const EXIT_CACHE: i32 = 3;

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// Configuration or identity error (exit code 2)
    #[error("Configuration error: {message}")]
    #[diagnostic(code(kubecredcache::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Cache read/write failure (exit code 3)
    #[error("Cache error: {message}")]
    #[diagnostic(code(kubecredcache::cli::cache))]
    Cache {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// The wrapped command could not be started (exit code 127)
    #[error("Unable to run '{command}': {message}")]
    #[diagnostic(
        code(kubecredcache::cli::exec),
        help("Check that the command is installed and on PATH")
    )]
    Exec {
        /// The wrapped command
        command: String,
        /// The error message
        message: String,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new cache error
    #[must_use]
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new exec error
    #[must_use]
    pub fn exec(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Exec {
            command: command.into(),
            message: message.into(),
        }
    }
}

/// Convert `kubecredcache_cache::Error` to the appropriate `CliError` variant.
///
/// - Identity and configuration problems -> Config (exit code 2)
/// - Cache directory I/O -> Cache (exit code 3)
impl From<kubecredcache_cache::Error> for CliError {
    fn from(err: kubecredcache_cache::Error) -> Self {
        use kubecredcache_cache::Error;
        match err {
            Error::Configuration { message } => Self::config(message),
            Error::MissingIdentity { reason } => Self::config_with_help(
                format!("Unable to determine cache identity: {reason}"),
                "Supported commands: 'aws ... --cluster-name <name>' and \
                 'aws-iam-authenticator ... -i <cluster-id>'",
            ),
            Error::InvalidKey { .. } => Self::config(err.to_string()),
            Error::Io {
                source,
                path,
                operation,
            } => {
                let path_str = path
                    .as_ref()
                    .map_or(String::new(), |p| format!(" on {}", p.display()));
                Self::Cache {
                    message: format!("I/O {operation} failed{path_str}: {source}"),
                    help: Some("Check permissions on the cache directory".to_string()),
                }
            }
            Error::PayloadParse { message } => Self::cache(message),
        }
    }
}

/// Map CLI error to appropriate exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CONFIG,
        CliError::Cache { .. } => EXIT_CACHE,
        CliError::Exec { .. } => EXIT_SPAWN_FAILED,
    }
}

/// Render an error on stderr through miette
#[allow(clippy::print_stderr)]
pub fn render_error(err: &CliError) {
    let report = Report::new(err.clone());
    eprintln!("{report:?}");
    // Ensure output is flushed before process exit
    let _ = io::stderr().flush();
}

/// Caching wrapper for Kubernetes exec-credential commands.
///
/// Runs `<COMMAND> [ARGS]...` on a cache miss and stores its output;
/// serves the stored output while the token it carries is still valid.
#[derive(Parser, Debug)]
#[command(name = "kubecredcache")]
#[command(version)]
pub struct Cli {
    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long = "log-level",
        env = "KUBECREDCACHE_LOG_LEVEL",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    /// Log output format.
    #[arg(
        long = "log-format",
        env = "KUBECREDCACHE_LOG_FORMAT",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,

    /// Suppress the cache status line on stderr.
    #[arg(short, long)]
    pub quiet: bool,

    /// The wrapped command followed by its arguments, passed through unchanged.
    #[arg(
        value_name = "COMMAND",
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

impl Cli {
    /// The wrapped command name and its arguments
    #[must_use]
    pub fn invocation(&self) -> (&str, &[String]) {
        match self.command.split_first() {
            Some((name, args)) => (name.as_str(), args),
            None => ("", &[]),
        }
    }
}

/// Parse the wrapper's command line
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
