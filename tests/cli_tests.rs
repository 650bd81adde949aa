// Exit status and diagnostics of the udp-perf binary

use std::process::{Command, Output};

fn udp_perf(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_udp-perf"))
        .args(args)
        .output()
        .expect("failed to run udp-perf")
}

#[test]
fn test_unknown_flag_exits_one() {
    let output = udp_perf(&["--server", "--bogus"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_missing_role_exits_one() {
    let output = udp_perf(&[]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_both_roles_exit_one() {
    let output = udp_perf(&["--client", "--server"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_help_exits_zero() {
    let output = udp_perf(&["--help"]);
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--pktsize"));
}

#[test]
fn test_small_packet_size_prints_error_and_usage() {
    // Port 9 (discard) has no listener; reaching the network would fail differently.
    let output = udp_perf(&["--client", "--port", "9", "--pktsize", "41"]);
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Configuration error: Cannot send packets that small"));
    assert!(stderr.contains("Usage:"));
    assert!(!stderr.contains("Control connection established"));
}

#[test]
fn test_minimum_packet_size_passes_validation() {
    // 42 is valid: the binary gets past validation and fails on connect instead.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port().to_string();
    drop(listener);

    let output = udp_perf(&["--client", "--port", &port, "--pktsize", "42"]);
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("Configuration error"));
    assert!(stderr.contains("connect"));
}
