//! CLI integration tests

use std::process::Command;

fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "kube-usage-cli", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = run_cli(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("resource usage versus allocation"),
        "Should show description"
    );
    assert!(stdout.contains("show"), "Should show show command");
    assert!(stdout.contains("node"), "Should show node command");
    assert!(stdout.contains("--kubeconfig"), "Should show kubeconfig option");
    assert!(stdout.contains("--format"), "Should show format option");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = run_cli(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("kube-usage"), "Should show binary name");
}

/// Test show subcommand help
#[test]
fn test_show_help() {
    let output = run_cli(&["show", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Show help should succeed");
    assert!(stdout.contains("--proxy-port"), "Should show proxy port option");
    assert!(stdout.contains("--proxy-url"), "Should show proxy url option");
    assert!(
        stdout.contains("--exclude-namespace"),
        "Should show exclude namespace option"
    );
    assert!(stdout.contains("--no-exclude"), "Should show no exclude option");
    assert!(
        stdout.contains("--show-excluded"),
        "Should show show excluded option"
    );
    assert!(stdout.contains("--namespace"), "Should show namespace option");
}

/// Test node subcommand help
#[test]
fn test_node_help() {
    let output = run_cli(&["node", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Node help should succeed");
    assert!(stdout.contains("<NAME>"), "Should show node name argument");
    assert!(stdout.contains("--timeout"), "Should show timeout option");
}

/// Test that node requires a name
#[test]
fn test_node_missing_name() {
    let output = run_cli(&["node"]);

    assert!(!output.status.success(), "Node without a name should fail");
}

/// Test that an unknown command fails
#[test]
fn test_invalid_command() {
    let output = run_cli(&["invalid-command"]);

    assert!(!output.status.success(), "Invalid command should fail");
}

/// Test that an unknown output format is rejected
#[test]
fn test_invalid_format() {
    let output = run_cli(&["show", "--format", "yaml"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Invalid format should fail");
    assert!(stderr.contains("yaml"), "Should name the rejected value");
}

/// Test that excluding and disabling exclusion together is rejected
#[test]
fn test_exclude_conflicts_with_no_exclude() {
    let output = run_cli(&["show", "--no-exclude", "--exclude-namespace", "monitoring"]);

    assert!(!output.status.success(), "Conflicting flags should fail");
}
