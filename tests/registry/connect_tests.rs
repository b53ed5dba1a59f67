//! Bind and connect retry behaviour

use std::thread;
use std::time::{Duration, Instant};

use crate::common::*;
use psc_registry::client::RegistryClient;
use psc_registry::error::RegistryError;
use psc_registry::net::{BindRetry, ConnectRetry};
use psc_registry::server::ServerOptions;

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[test]
fn test_connect_gives_up_after_budget() {
    let port = free_port();
    let retry = ConnectRetry {
        attempts: 3,
        delay: Duration::from_millis(20),
    };

    let started = Instant::now();
    let result = RegistryClient::connect("127.0.0.1", port, &retry);
    match result {
        Err(RegistryError::Connection { target, .. }) => {
            assert_eq!(target, format!("127.0.0.1:{}", port));
        }
        Err(other) => panic!("Expected connection error, got {:?}", other),
        Ok(_) => panic!("Connected to a closed port"),
    }
    // Two pauses between three attempts
    assert!(started.elapsed() >= Duration::from_millis(40));
}

#[test]
fn test_connect_waits_for_late_server() {
    let port = free_port();

    let starter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(150));
        let mut options = ServerOptions::new("127.0.0.1", port);
        options.bind_retry = BindRetry {
            retries: 0,
            max_step: 1,
        };
        TestServer::with_options(options)
    });

    let retry = ConnectRetry {
        attempts: 100,
        delay: Duration::from_millis(20),
    };
    let mut client = RegistryClient::connect("127.0.0.1", port, &retry).unwrap();
    assert!(client.list_entries().unwrap().is_empty());
    assert!(client.close().unwrap());

    drop(starter.join().unwrap());
}

#[test]
fn test_second_server_steps_to_another_port() {
    let first = TestServer::start();

    let mut options = ServerOptions::new("127.0.0.1", first.port());
    options.bind_retry = BindRetry {
        retries: 20,
        max_step: 8,
    };
    let Ok(second) = TestServer::try_with_options(options) else {
        // Only possible right at the top of the port range
        assert!(first.port() > u16::MAX - 160);
        return;
    };

    assert_ne!(second.port(), first.port());
    assert!(second.port() > first.port());

    // Both serve independent tables
    second.client().create_entry(&sample_fields("x")).unwrap();
    assert_eq!(first.store().len(), 0);
    assert_eq!(second.store().len(), 1);
}
