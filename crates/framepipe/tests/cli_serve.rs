#![cfg(all(unix, feature = "cli"))]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/framepipe-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

/// Spawn `serve` and return the child plus the endpoint it printed.
fn spawn_serve(args: &[&str]) -> (Child, serde_json::Value) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_framepipe"))
        .args(["--format", "json", "--log-level", "error", "serve"])
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("serve command should start");

    let stdout = child.stdout.take().expect("stdout should be piped");
    let mut line = String::new();
    BufReader::new(stdout)
        .read_line(&mut line)
        .expect("endpoint line should be readable");
    let endpoint: serde_json::Value =
        serde_json::from_str(line.trim()).expect("endpoint line should be json");
    (child, endpoint)
}

fn endpoint_addr(endpoint: &serde_json::Value) -> SocketAddr {
    endpoint["path"]
        .as_str()
        .and_then(|path| path.strip_prefix("tcp://"))
        .expect("path should be a tcp uri")
        .parse()
        .expect("path should carry a socket address")
}

#[test]
fn inbound_serve_writes_subprocess_output_to_file() {
    let dir = unique_temp_dir("inbound");
    let output = dir.join("out.bin");
    let (mut child, endpoint) = spawn_serve(&[
        "--direction",
        "inbound",
        "--output",
        output.to_str().expect("utf-8 path"),
    ]);
    assert_eq!(endpoint["direction"], "inbound");
    assert_eq!(endpoint["kind"], "loopback-socket");
    let path = endpoint["path"].as_str().expect("path should be a string");
    assert_eq!(endpoint["argument"], format!("\"{path}\" -y"));

    let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 253) as u8).collect();
    let mut stream = TcpStream::connect(endpoint_addr(&endpoint)).expect("peer should connect");
    for chunk in payload.chunks(3_000) {
        stream.write_all(chunk).expect("chunk should send");
    }
    drop(stream);

    let status = child.wait().expect("serve should exit");
    assert_eq!(status.code(), Some(0));
    assert_eq!(std::fs::read(&output).expect("output file"), payload);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn outbound_serve_streams_file_to_subprocess() {
    let dir = unique_temp_dir("outbound");
    let input = dir.join("in.bin");
    let payload: Vec<u8> = (0..50_000u32).map(|i| (i % 241) as u8).collect();
    std::fs::write(&input, &payload).expect("input file should be writable");

    let (mut child, endpoint) = spawn_serve(&[
        "--direction",
        "outbound",
        "--input",
        input.to_str().expect("utf-8 path"),
        "--stream-args",
        "-f mp4",
    ]);
    let path = endpoint["path"].as_str().expect("path should be a string");
    assert_eq!(endpoint["argument"], format!("-y -f mp4 -i \"{path}\""));

    let mut stream = TcpStream::connect(endpoint_addr(&endpoint)).expect("peer should connect");
    let mut received = Vec::new();
    stream
        .read_to_end(&mut received)
        .expect("stream should read to end");
    assert_eq!(received, payload);

    let status = child.wait().expect("serve should exit");
    assert_eq!(status.code(), Some(0));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn serve_times_out_without_subprocess() {
    let dir = unique_temp_dir("timeout");
    let output = dir.join("out.bin");
    let (mut child, _endpoint) = spawn_serve(&[
        "--direction",
        "inbound",
        "--output",
        output.to_str().expect("utf-8 path"),
        "--connect-timeout",
        "200ms",
    ]);

    let status = child.wait().expect("serve should exit");
    assert_eq!(status.code(), Some(124));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn outbound_without_input_is_usage_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_framepipe"))
        .args(["serve", "--direction", "outbound"])
        .output()
        .expect("serve command should run");

    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--input"), "stderr: {stderr}");
}

#[test]
fn formats_lists_every_layout_as_json() {
    let output = Command::new(env!("CARGO_BIN_EXE_framepipe"))
        .args(["--format", "json", "formats"])
        .output()
        .expect("formats command should run");
    assert!(output.status.success());

    let rows: Vec<serde_json::Value> =
        serde_json::from_slice(&output.stdout).expect("formats output should be json");
    assert_eq!(rows.len(), 14);
    let supported: Vec<&str> = rows
        .iter()
        .filter_map(|row| row["pix_fmt"].as_str())
        .collect();
    assert_eq!(supported.len(), 7);
    assert!(supported.contains(&"bgr24"));
    assert!(rows
        .iter()
        .any(|row| row["layout"] == "indexed8" && row["pix_fmt"].is_null()));
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_framepipe"))
        .arg("version")
        .output()
        .expect("version command should run");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("framepipe {}", env!("CARGO_PKG_VERSION"))
    );
}
