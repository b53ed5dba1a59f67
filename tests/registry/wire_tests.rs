//! Exact protocol output over raw sockets

use crate::common::*;
use psc_registry::server::ServerOptions;

const CREATE: &str = r#"CREATE app="lulesh" site="lrz" mach="supermuc" node="node01" port=50002 pid=4711 comp="aagent" tag="leaf""#;

#[test]
fn test_welcome_line() {
    let server = TestServer::start();
    let mut conn = server.raw();
    let welcome = conn.expect_line();
    let prefix = format!("+OK 127.0.0.1:{} PERISCOPE registry server ver. ", server.port());
    assert!(welcome.starts_with(&prefix), "unexpected welcome: {}", welcome);
}

#[test]
fn test_create_show_exact_lines() {
    let server = TestServer::start();
    let mut conn = server.raw();
    conn.expect_line();

    assert_ok(&conn.request(CREATE), "entry ID is 1");
    assert_ok(&conn.request("SHOW 1"), "showing entry 1");
    assert_eq!(
        conn.expect_line(),
        r#"ID 1 app="lulesh " site="lrz " mach="supermuc " node="node01 " port=50002 pid=4711 comp="aagent " tag="leaf ""#
    );
    assert_ok(&conn.request("LIST"), "1 entries in registry");
    assert_eq!(conn.read_body().len(), 1);
}

#[test]
fn test_crlf_and_case_insensitive_commands() {
    let server = TestServer::start();
    let mut conn = server.raw();
    conn.expect_line();

    conn.send_bytes(b"list\r\n");
    assert_ok(&conn.expect_line(), "0 entries in registry");
    assert!(conn.read_body().is_empty());

    conn.send_bytes(b"CoUnTsTr 5\r\n");
    assert_eq!(conn.expect_line(), "-ERR no such entry ID");
}

#[test]
fn test_compact_pairs_and_whitespace_around_equals() {
    let server = TestServer::start();
    let mut conn = server.raw();
    conn.expect_line();

    let line = r#"CREATE app = "a" site=s mach="m" node="n" port= 7 pid=8 comp="c"tag="t""#;
    assert_ok(&conn.request(line), "entry ID is 1");
    assert_ok(&conn.request("SEARCH comp=c tag=\"t\""), "displaying search results");
    let body = conn.read_body();
    assert_eq!(body.len(), 1);
    assert!(body[0].starts_with("ID 1 app=\"a \" site=\"s \""));
}

#[test]
fn test_error_lines() {
    let server = TestServer::start();
    let mut conn = server.raw();
    conn.expect_line();

    assert_eq!(conn.request("FROB 1 2"), "-ERR unknown command: FROB");
    assert_eq!(conn.request("SHOW"), "-ERR bad format. Usage: SHOW <entry id>");
    assert_eq!(conn.request("DELETE 0"), "-ERR bad format. Usage: DELETE <entry id>");
    assert_eq!(conn.request("SHOW +1"), "-ERR bad format. Usage: SHOW <entry id>");
    assert_err_starts_with(&conn.request(r#"CREATE app="a""#), "incomplete data. Usage: CREATE ");
    assert_err_starts_with(&conn.request(r#"SEARCH app="open"#), "bad format. Usage: SEARCH ");
    assert_err_starts_with(&conn.request("SEARCH colour=red"), "bad format.");
    assert_eq!(conn.request("GETSTR 1 1"), "-ERR no such entry ID");

    assert_ok(&conn.request(CREATE), "entry ID is 1");
    assert_eq!(conn.request("GETSTR 1 1"), "-ERR no such string ID");
    assert_eq!(
        conn.request("ADDSTR 1"),
        "-ERR bad format. Usage: ADDSTR <entry id> <string>"
    );
}

#[test]
fn test_liststr_dot_stuffing() {
    let server = TestServer::start();
    let mut conn = server.raw();
    conn.expect_line();

    conn.request(CREATE);
    assert_ok(&conn.request(r#"ADDSTR 1 ".""#), "string ID is 1");
    assert_ok(&conn.request("ADDSTR 1 ..x"), "string ID is 2");
    assert_ok(&conn.request("LISTSTR 1"), "listing 2 strings for entry 1");
    assert_eq!(conn.read_body(), vec!["..", "...x"]);

    assert_ok(&conn.request("GETSTR 1 1"), "string 1 of entry 1 size 1");
    assert_eq!(conn.expect_line(), ".");
}

#[test]
fn test_quit_closes_connection() {
    let server = TestServer::start();
    let mut conn = server.raw();
    conn.expect_line();

    assert_ok(
        &conn.request("quit"),
        &format!("127.0.0.1:{} PERISCOPE registry server closing connection", server.port()),
    );
    assert_eq!(conn.read_line(), None);
}

#[test]
fn test_partial_line_at_eof_is_answered() {
    let server = TestServer::start();
    let mut conn = server.raw();
    conn.expect_line();

    conn.send_bytes(b"COUNTSTR 9");
    conn.finish();
    assert_eq!(conn.expect_line(), "-ERR no such entry ID");
    assert_eq!(conn.read_line(), None);
}

#[test]
fn test_overlong_line_keeps_session() {
    let mut options = ServerOptions::new("127.0.0.1", 0);
    options.max_line_len = 64;
    let server = TestServer::with_options(options);
    let mut conn = server.raw();
    conn.expect_line();

    conn.send(&format!("ADDSTR 1 {}", "x".repeat(200)));
    assert_eq!(conn.expect_line(), "-ERR bad format. line exceeds 64 bytes");
    assert_ok(&conn.request("LIST"), "0 entries in registry");
    assert!(conn.read_body().is_empty());
}

#[test]
fn test_crlf_line_at_limit_is_accepted() {
    let mut options = ServerOptions::new("127.0.0.1", 0);
    options.max_line_len = 16;
    let server = TestServer::with_options(options);
    let mut conn = server.raw();
    conn.expect_line();

    conn.send_bytes(b"COUNTSTR 1234567\r\n");
    assert_eq!(conn.expect_line(), "-ERR no such entry ID");
    conn.send_bytes(b"COUNTSTR 12345678\r\n");
    assert_eq!(conn.expect_line(), "-ERR bad format. line exceeds 16 bytes");
}

#[test]
fn test_help_listing() {
    let server = TestServer::start();
    let mut conn = server.raw();
    conn.expect_line();

    assert_ok(&conn.request("HELP"), "showing available commands");
    let body = conn.read_body();
    let names: Vec<_> = body
        .iter()
        .map(|line| line[..10].trim_start().to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "QUIT", "HELP", "CREATE", "SEARCH", "CHANGE", "DELETE", "LIST", "SHOW", "CLEAN",
            "ADDSTR", "GETSTR", "DELSTR", "LISTSTR", "COUNTSTR"
        ]
    );
}
