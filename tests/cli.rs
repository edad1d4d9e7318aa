use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("empathy").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: empathy"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("--api-url <API_URL>"))
        .stdout(predicate::str::contains("--timeout-secs <TIMEOUT_SECS>"))
        .stdout(predicate::str::contains("--version"));
}

#[test]
fn test_cli_serve_help() {
    let mut cmd = Command::cargo_bin("empathy").unwrap();
    cmd.arg("serve")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: empathy serve"))
        .stdout(predicate::str::contains("--host <HOST>"))
        .stdout(predicate::str::contains("--port <PORT>"));
}

#[test]
fn test_cli_chat_help() {
    let mut cmd = Command::cargo_bin("empathy").unwrap();
    cmd.arg("chat")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: empathy chat"));
}

#[test]
fn test_cli_no_command() {
    // clap exits with non-zero status when no command is given
    let mut cmd = Command::cargo_bin("empathy").unwrap();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage: empathy"));
}

#[test]
fn test_cli_rejects_zero_timeout() {
    let mut cmd = Command::cargo_bin("empathy").unwrap();
    cmd.args(["--timeout-secs", "0", "chat"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value '0'"))
        .stderr(predicate::str::contains("--timeout-secs"));
}

#[test]
fn test_chat_falls_back_when_backend_is_unreachable() {
    // Nothing listens on port 9 (discard) on a test machine; the call fails fast.
    let mut cmd = Command::cargo_bin("empathy").unwrap();
    cmd.args(["--api-url", "http://127.0.0.1:9", "--timeout-secs", "5", "chat"])
        .write_stdin("I feel anxious\nexit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "AI Therapist: Hello! I'm your AI therapist. How are you feeling today?",
        ))
        .stdout(predicate::str::contains("You: I feel anxious"))
        .stdout(predicate::str::contains(
            "AI Therapist: Oops! Something went wrong. Please try again later.",
        ));
}
