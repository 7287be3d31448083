//! kubecredcache binary
//!
//! `kubecredcache [OPTIONS] <COMMAND> [ARGS]...`

// The credential payload goes to stdout - this is intentional
#![allow(clippy::print_stdout, clippy::print_stderr)]

use kubecredcache::cli::{self, CliError, exit_code_for, render_error};
use kubecredcache::settings::Settings;
use kubecredcache::tracing::{self, TracingConfig};
use kubecredcache::{Invocation, Orchestrator, SystemRunner};
use kubecredcache_cache::{CacheStore, ExpiryPolicy, Janitor};
use std::io;
use std::time::Duration;

fn main() {
    // NOTE: Using eprintln! in panic hook is intentional - tracing infrastructure
    // may be corrupted during a panic, so we use the most reliable output method.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("kubecredcache panicked: {panic_info}");
        eprintln!("Run with KUBECREDCACHE_LOG_LEVEL=debug for more information.");
    }));

    let cli = cli::parse();

    let tracing_config = TracingConfig {
        format: cli.log_format,
        level: cli.level.into(),
        ..Default::default()
    };
    // Ignore error if tracing already initialized
    let _ = tracing::init_tracing(tracing_config);

    let exit_code = match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            render_error(&err);
            exit_code_for(&err)
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: &cli::Cli) -> Result<i32, CliError> {
    let settings = Settings::load()?;
    settings.bootstrap()?;

    let access_key = std::env::var(&settings.access_key_env)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            CliError::config_with_help(
                format!("{} is not set", settings.access_key_env),
                format!(
                    "Export your credentials or set {} to the variable holding the access key id",
                    kubecredcache::settings::ENV_ACCESS_KEY_ENV
                ),
            )
        })?;

    if settings.gc_retention_seconds > 0 {
        let report = Janitor::new(
            &settings.cache_dir,
            Duration::from_secs(settings.gc_retention_seconds),
        )
        .sweep();
        ::tracing::debug!(
            scanned = report.scanned,
            removed = report.removed,
            failed = report.failed,
            "Swept cache directory"
        );
    }

    let (command, args) = cli.invocation();
    let orchestrator = Orchestrator::new(
        CacheStore::new(&settings.cache_dir),
        ExpiryPolicy::from_seconds(settings.expire_early_seconds),
        SystemRunner,
    )
    .quiet(cli.quiet || settings.quiet);

    let outcome = orchestrator.execute(
        Invocation {
            command,
            args,
            access_key: &access_key,
        },
        &mut io::stdout().lock(),
        &mut io::stderr(),
    )?;
    Ok(outcome.exit_code)
}
