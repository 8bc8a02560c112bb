//! End-to-end tests
//!
//! A stub `iperf3` script on PATH stands in for the real tool and a local
//! TCP listener stands in for Carbon, so a full sweep runs without any
//! network dependency.

#![cfg(unix)]

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::io::Read;
use std::net::TcpListener;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Command;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const IPERF_STUB: &str = r#"#!/bin/sh
case "$*" in
  *" -R "*) RATE=23456 ;;
  *) RATE=12345 ;;
esac
echo "Connecting to host, port 5201"
echo "[ ID] Interval           Transfer     Bitrate"
echo "[  5]   0.00-5.00   sec  7.36 MBytes  $RATE Kbits/sec    0             sender"
echo "[  5]   0.00-5.04   sec  7.30 MBytes  $RATE Kbits/sec                  receiver"
echo ""
echo "iperf Done."
"#;

const IPERF_FAILING_STUB: &str = r#"#!/bin/sh
echo "iperf3: error - unable to connect to server: Connection refused" >&2
exit 1
"#;

fn install_stub(dir: &Path, name: &str, script: &str) {
    let path = dir.join(name);
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

fn path_with(dir: &Path) -> String {
    format!("{}:{}", dir.display(), std::env::var("PATH").unwrap_or_default())
}

/// Accept `count` Carbon connections and return what each one sent
fn carbon_listener(count: usize) -> (u16, thread::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let mut lines = Vec::new();
        for _ in 0..count {
            let (mut socket, _) = listener.accept().unwrap();
            socket.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
            let mut received = String::new();
            socket.read_to_string(&mut received).unwrap();
            lines.push(received);
        }
        lines
    });
    (port, handle)
}

fn create_test_cmd(workdir: &TempDir, bin: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cbandwidth").unwrap();
    cmd.current_dir(workdir.path()).env("PATH", path_with(bin.path()));
    for (key, _) in std::env::vars() {
        if key.starts_with("CBANDWIDTH_") {
            cmd.env_remove(key);
        }
    }
    cmd
}

#[test]
fn test_single_sweep_records_both_directions_to_carbon() {
    let workdir = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    install_stub(bin.path(), "iperf3", IPERF_STUB);

    let (port, carbon) = carbon_listener(2);

    create_test_cmd(&workdir, &bin)
        .args([
            "--nocontainer",
            "--once",
            "--no-color",
            "--perf-servers", "127.0.0.1:lab",
            "--grafana-address", "127.0.0.1",
            "--grafana-port", &port.to_string(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sweep #1 finished: 2 recorded"));

    let lines = carbon.join().unwrap();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("bandwidth.download.lab 12345000 "), "{:?}", lines);
    assert!(lines[1].starts_with("bandwidth.upload.lab 23456000 "), "{:?}", lines);
    assert!(lines.iter().all(|line| line.ends_with('\n')));
}

#[test]
fn test_configuration_file_and_env_file_are_merged() {
    let workdir = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    install_stub(bin.path(), "iperf3", IPERF_STUB);

    let (port, carbon) = carbon_listener(2);

    fs::write(
        workdir.path().join("configuration.yaml"),
        "tsdb-download-prefix: dc.down\ntsdb-upload-prefix: dc.up\niperf-servers:\n  - 127.0.0.1: from-file\n",
    )
    .unwrap();
    fs::write(
        workdir.path().join(".env"),
        format!("CBANDWIDTH_GRAFANA_ADDRESS=127.0.0.1\nCBANDWIDTH_GRAFANA_PORT={}\n", port),
    )
    .unwrap();

    create_test_cmd(&workdir, &bin)
        .args(["--nocontainer", "--once", "--no-color"])
        .assert()
        .success();

    let lines = carbon.join().unwrap();
    assert!(lines[0].starts_with("dc.down.from-file 12345000 "), "{:?}", lines);
    assert!(lines[1].starts_with("dc.up.from-file 23456000 "), "{:?}", lines);
}

#[test]
fn test_failed_probe_does_not_stop_the_run() {
    let workdir = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    install_stub(bin.path(), "iperf3", IPERF_FAILING_STUB);

    // Nothing should ever be sent, so nothing listens
    create_test_cmd(&workdir, &bin)
        .args([
            "--nocontainer",
            "--once",
            "--no-color",
            "--perf-servers", "127.0.0.1",
            "--grafana-address", "127.0.0.1",
            "--grafana-port", "1",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("Sweep #1 finished: 0 recorded, 2 probe failures"));
}
