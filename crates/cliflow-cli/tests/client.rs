#![allow(missing_docs)]

mod common;

use common::{Home, complete_request};
use predicates::prelude::*;

#[test]
fn client_without_daemon_fails_silently() {
    let home = Home::new();
    home.client()
        .arg(complete_request("git ch", home.path()))
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());
}

#[test]
fn client_without_request_fails_silently() {
    let home = Home::new();
    home.client()
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());
}

#[test]
fn client_honors_socket_override() {
    let home = Home::new();
    let elsewhere = tempfile::tempdir().unwrap();
    home.client()
        .env("CLIFLOW_SOCKET", elsewhere.path().join("other.sock"))
        .arg(r#"{"type":"health"}"#)
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());
}

#[test]
fn client_gives_up_on_silent_daemon() {
    let home = Home::new();
    std::fs::write(
        home.path().join("config.toml"),
        "[client]\ntimeout_ms = 200\n",
    )
    .unwrap();

    let listener = std::os::unix::net::UnixListener::bind(home.socket()).unwrap();
    let holder = std::thread::spawn(move || {
        // Accept and never answer
        let (stream, _) = listener.accept().unwrap();
        std::thread::sleep(std::time::Duration::from_secs(3));
        drop(stream);
    });

    let started = std::time::Instant::now();
    home.client()
        .arg(r#"{"type":"health"}"#)
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());
    assert!(started.elapsed() < std::time::Duration::from_secs(2));
    holder.join().unwrap();
}
