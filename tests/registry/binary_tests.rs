//! The psc-registry and psc-regsrv executables

use std::io::{BufRead, BufReader};
use std::process::{Command, Output, Stdio};

use tempfile::{tempdir, TempDir};

use crate::common::*;
use psc_registry::config::{RegistryConfig, RegistryLocation};

/// Run psc-registry against `server` with an isolated config file
fn run_cli(server: &TestServer, home: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_psc-registry"))
        .env_remove("PSC_REGISTRY")
        .env_remove("RUST_LOG")
        .arg("--registry")
        .arg(server.location().to_string())
        .arg("--config")
        .arg(home.path().join("periscope.toml"))
        .args(args)
        .output()
        .expect("Failed to run psc-registry")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

const CREATE_ARGS: [&str; 17] = [
    "create", "--app", "lulesh", "--site", "lrz", "--mach", "supermuc", "--node", "node01",
    "--port", "50002", "--pid", "4711", "--comp", "aagent", "--tag", "leaf",
];

#[test]
fn test_cli_create_list_show() {
    let server = TestServer::start();
    let home = tempdir().unwrap();

    let output = run_cli(&server, &home, &CREATE_ARGS);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout(&output), "created entry 1\n");

    let output = run_cli(&server, &home, &["add-str", "1", "hello world"]);
    assert_eq!(stdout(&output), "1\n");

    let output = run_cli(&server, &home, &["-f", "json", "list"]);
    let json = assert_valid_json(&stdout(&output), "list");
    assert_eq!(json[0]["id"], 1);
    assert_eq!(json[0]["comp"], "aagent");

    let output = run_cli(&server, &home, &["-f", "json", "show", "1", "--strings"]);
    let json = assert_valid_json(&stdout(&output), "show");
    assert_eq!(json["strings"][0], "hello world");

    let output = run_cli(&server, &home, &["search", "--tag", "leaf"]);
    let text = stdout(&output);
    assert!(text.starts_with("ID\tAPP"));
    assert_eq!(text.lines().count(), 2);
}

#[test]
fn test_cli_show_text_and_get_str_json() {
    let server = TestServer::start();
    let home = tempdir().unwrap();

    run_cli(&server, &home, &CREATE_ARGS);
    run_cli(&server, &home, &["add-str", "1", "first note"]);

    let output = run_cli(&server, &home, &["show", "1", "--strings"]);
    assert_eq!(
        stdout(&output),
        "id:   1\napp:  lulesh\nsite: lrz\nmach: supermuc\nnode: node01\n\
         port: 50002\npid:  4711\ncomp: aagent\ntag:  leaf\n[1]  first note\n"
    );

    let output = run_cli(&server, &home, &["-f", "json", "get-str", "1", "1"]);
    let json = assert_valid_json(&stdout(&output), "get-str");
    assert_eq!(json["pos"], 1);
    assert_eq!(json["text"], "first note");
}

#[test]
fn test_cli_exit_codes() {
    let server = TestServer::start();
    let home = tempdir().unwrap();

    let output = run_cli(&server, &home, &["show", "42"]);
    assert_eq!(output.status.code(), Some(4));

    let output = run_cli(&server, &home, &["create", "--app", "a", "--site", "s", "--mach", "m",
        "--node", "n", "--port", "0", "--pid", "1", "--comp", "c", "--tag", "t"]);
    assert_eq!(output.status.code(), Some(3));

    let output = run_cli(&server, &home, &["raw", "FROB"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "-ERR unknown command: FROB\n");
}

#[test]
fn test_cli_config_set_get() {
    let server = TestServer::start();
    let home = tempdir().unwrap();

    let output = run_cli(&server, &home, &["config", "set", "registry.port", "6123"]);
    assert!(output.status.success());

    let output = run_cli(&server, &home, &["config", "get", "registry.port"]);
    assert_eq!(stdout(&output), "6123\n");

    let output = run_cli(&server, &home, &["config", "set", "logging.level", "loud"]);
    assert_eq!(output.status.code(), Some(6));
}

#[test]
fn test_regsrv_announces_and_records_address() {
    let home = tempdir().unwrap();
    let config_path = home.path().join("periscope.toml");

    let mut child = Command::new(env!("CARGO_BIN_EXE_psc-regsrv"))
        .env_remove("PSC_REGISTRY")
        .args(["0", "--host", "127.0.0.1", "--advertise", "127.0.0.1", "--write-config"])
        .arg("--config")
        .arg(&config_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to start psc-regsrv");

    let stdout = child.stdout.take().unwrap();
    let mut line = String::new();
    BufReader::new(stdout).read_line(&mut line).unwrap();
    let location = RegistryLocation::from_announcement(&line).expect("announcement");
    assert_eq!(location.host, "127.0.0.1");

    let mut client =
        psc_registry::client::RegistryClient::open(&location.host, location.port).unwrap();
    assert!(client.welcome().starts_with(&location.to_string()));
    assert!(client.close().unwrap());

    let config = RegistryConfig::load_from(&config_path).unwrap();
    assert_eq!(config.registry.port, location.port);

    child.kill().unwrap();
    child.wait().unwrap();
}

#[test]
fn test_regsrv_rejects_malformed_env() {
    let home = tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_psc-regsrv"))
        .env("PSC_REGISTRY", "no-port-here")
        .arg("--config")
        .arg(home.path().join("periscope.toml"))
        .output()
        .expect("Failed to run psc-regsrv");
    assert!(!output.status.success());
}
