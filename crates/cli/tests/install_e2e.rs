//! End-to-end tests for kubecredcache-install

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const KUBECONFIG: &str = r"apiVersion: v1
kind: Config
users:
- name: prod
  user:
    exec:
      apiVersion: client.authentication.k8s.io/v1beta1
      command: aws
      args: [--region, us-west-2, eks, get-token, --cluster-name, prod]
- name: static
  user:
    token: abc
";

fn install() -> Command {
    #[allow(deprecated)]
    let cmd = Command::cargo_bin("kubecredcache-install").unwrap();
    cmd
}

#[test]
fn dry_run_prints_rewritten_config_and_leaves_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config");
    fs::write(&path, KUBECONFIG).unwrap();

    install()
        .arg("--kubeconfig")
        .arg(&path)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("command: kubecredcache"))
        .stderr(predicate::str::contains("prod"));

    assert_eq!(fs::read_to_string(&path).unwrap(), KUBECONFIG);
}

#[test]
fn install_rewrites_file_once() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config");
    fs::write(&path, KUBECONFIG).unwrap();

    install().arg("--kubeconfig").arg(&path).assert().success();
    let rewritten = fs::read_to_string(&path).unwrap();
    assert!(rewritten.contains("command: kubecredcache"));
    assert!(rewritten.contains("token: abc"));

    install()
        .arg("--kubeconfig")
        .arg(&path)
        .assert()
        .success()
        .stderr(predicate::str::contains("Nothing to do"));
    assert_eq!(fs::read_to_string(&path).unwrap(), rewritten);
}

#[test]
fn kubeconfig_without_exec_users_is_reported() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config");
    let content = "apiVersion: v1\nkind: Config\nusers:\n- name: static\n  user:\n    token: abc\n";
    fs::write(&path, content).unwrap();

    install()
        .arg("--kubeconfig")
        .arg(&path)
        .assert()
        .success()
        .stderr(predicate::str::contains("no user in the kubeconfig has an exec"));

    assert_eq!(fs::read_to_string(&path).unwrap(), content);
}

#[test]
fn missing_kubeconfig_is_a_config_error() {
    let temp = TempDir::new().unwrap();

    install()
        .arg("--kubeconfig")
        .arg(temp.path().join("absent"))
        .assert()
        .code(2);
}
