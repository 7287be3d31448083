//! Point kubeconfig exec entries at kubecredcache

#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::Parser;
use kubecredcache::InstallArgs;
use kubecredcache::cli::{exit_code_for, render_error};
use kubecredcache::tracing::{self, TracingConfig};

fn main() {
    let args = InstallArgs::parse();
    let _ = tracing::init_tracing(TracingConfig::default());

    match kubecredcache::install::run(&args) {
        Ok((report, rendered)) => {
            if let Some(yaml) = rendered {
                print!("{yaml}");
            }
            eprintln!("{}", report.summary(&args.wrapper));
        }
        Err(err) => {
            render_error(&err);
            std::process::exit(exit_code_for(&err));
        }
    }
}
