//! Kubeconfig installer
//!
//! Rewrites exec-credential users in a kubeconfig so that
//! `command: aws, args: [eks, get-token, ...]` becomes
//! `command: kubecredcache, args: [aws, eks, get-token, ...]`.

use crate::cli::CliError;
use crate::settings::PROGRAM_NAME;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Insert kubecredcache in front of exec-credential commands in a kubeconfig.
#[derive(Parser, Debug)]
#[command(name = "kubecredcache-install")]
#[command(version)]
pub struct InstallArgs {
    /// Kubeconfig to edit (defaults to the first entry of $KUBECONFIG, then ~/.kube/config).
    #[arg(long, value_name = "PATH")]
    pub kubeconfig: Option<PathBuf>,

    /// Only rewrite the user with this name.
    #[arg(long, value_name = "NAME")]
    pub user: Option<String>,

    /// Wrapper command to insert.
    #[arg(long, value_name = "CMD", default_value = PROGRAM_NAME)]
    pub wrapper: String,

    /// Print the rewritten kubeconfig instead of saving it.
    #[arg(long)]
    pub dry_run: bool,
}

/// The parts of a kubeconfig the installer touches; everything else is kept
/// verbatim in the flattened maps.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KubeConfig {
    /// Named users
    #[serde(default)]
    pub users: Vec<NamedUser>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_yaml::Value>,
}

/// A `users[]` entry
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NamedUser {
    /// User name referenced by contexts
    pub name: String,
    /// Auth settings
    #[serde(default)]
    pub user: AuthInfo,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_yaml::Value>,
}

/// A user's auth settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthInfo {
    /// Exec-credential plugin, if configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<ExecConfig>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_yaml::Value>,
}

/// An exec-credential plugin invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExecConfig {
    /// Executable to run
    pub command: String,
    /// Arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_yaml::Value>,
}

/// What an install pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Users rewritten to go through the wrapper
    pub wrapped: Vec<String>,
    /// Users already going through the wrapper
    pub already_wrapped: Vec<String>,
}

impl InstallReport {
    /// Whether the kubeconfig changed
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.wrapped.is_empty()
    }

    /// One-line summary for the user
    #[must_use]
    pub fn summary(&self, wrapper: &str) -> String {
        if self.changed() {
            format!("Wrapped users: {}", self.wrapped.join(", "))
        } else if self.already_wrapped.is_empty() {
            "Nothing to do: no user in the kubeconfig has an exec credential command".to_string()
        } else {
            format!("Nothing to do: every exec user already uses {wrapper}")
        }
    }
}

impl ExecConfig {
    fn is_wrapped_by(&self, wrapper: &str) -> bool {
        executable_name(&self.command) == executable_name(wrapper)
    }

    fn wrap(&mut self, wrapper: &str) {
        let original = std::mem::replace(&mut self.command, wrapper.to_string());
        let mut args = vec![original];
        args.extend(self.args.take().unwrap_or_default());
        self.args = Some(args);
    }
}

fn executable_name(command: &str) -> &str {
    Path::new(command)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(command)
}

impl KubeConfig {
    /// Parse a kubeconfig document
    pub fn from_yaml(content: &str) -> Result<Self, CliError> {
        serde_yaml::from_str(content)
            .map_err(|e| CliError::config(format!("Invalid kubeconfig: {e}")))
    }

    /// Serialize back to YAML
    pub fn to_yaml(&self) -> Result<String, CliError> {
        serde_yaml::to_string(self)
            .map_err(|e| CliError::config(format!("Unable to serialize kubeconfig: {e}")))
    }

    /// Wrap every matching exec user with `wrapper`.
    ///
    /// Users that already run `wrapper` are left alone, so installing twice is
    /// a no-op. Fails if `only_user` names a user that has no exec block.
    pub fn install(&mut self, wrapper: &str, only_user: Option<&str>) -> Result<InstallReport, CliError> {
        let mut report = InstallReport::default();
        let mut matched = false;

        for named in &mut self.users {
            if only_user.is_some_and(|u| u != named.name) {
                continue;
            }
            let Some(exec) = named.user.exec.as_mut() else {
                continue;
            };
            matched = true;

            if exec.is_wrapped_by(wrapper) {
                report.already_wrapped.push(named.name.clone());
            } else {
                exec.wrap(wrapper);
                report.wrapped.push(named.name.clone());
            }
        }

        if let Some(user) = only_user
            && !matched
        {
            return Err(CliError::config_with_help(
                format!("No exec-credential user named '{user}' in kubeconfig"),
                "Run without --user to wrap every exec-credential user",
            ));
        }

        Ok(report)
    }
}

/// Resolve the kubeconfig path the way kubectl does for a single file.
pub fn default_kubeconfig(
    kubeconfig_env: Option<&str>,
    home: Option<&Path>,
) -> Result<PathBuf, CliError> {
    if let Some(first) = kubeconfig_env
        .and_then(|v| std::env::split_paths(v).find(|p| !p.as_os_str().is_empty()))
    {
        return Ok(first);
    }
    home.map(|h| h.join(".kube").join("config"))
        .ok_or_else(|| CliError::config("Could not determine home directory"))
}

/// Run the installer. Returns the rewritten document when `dry_run` is set.
pub fn run(args: &InstallArgs) -> Result<(InstallReport, Option<String>), CliError> {
    let path = match &args.kubeconfig {
        Some(path) => path.clone(),
        None => default_kubeconfig(
            std::env::var("KUBECONFIG").ok().as_deref(),
            dirs::home_dir().as_deref(),
        )?,
    };

    let content = fs::read_to_string(&path).map_err(|e| {
        CliError::config(format!("Unable to read kubeconfig '{}': {e}", path.display()))
    })?;
    let mut config = KubeConfig::from_yaml(&content)?;
    let report = config.install(&args.wrapper, args.user.as_deref())?;

    for name in &report.already_wrapped {
        tracing::info!(user = %name, "User already uses the wrapper");
    }

    let rendered = config.to_yaml()?;
    if args.dry_run {
        return Ok((report, Some(rendered)));
    }

    if report.changed() {
        fs::write(&path, rendered).map_err(|e| {
            CliError::config(format!("Unable to write kubeconfig '{}': {e}", path.display()))
        })?;
        tracing::info!(path = %path.display(), users = ?report.wrapped, "Updated kubeconfig");
    }
    Ok((report, None))
}
