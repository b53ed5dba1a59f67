//! RegistryClient against a live server

use crate::common::*;
use psc_registry::error::RegistryError;
use psc_registry::server::ServerOptions;
use psc_registry::store::FieldSet;

#[test]
fn test_create_and_fill_entry() {
    let server = TestServer::start();
    let mut client = server.client();

    let fields = sample_fields("leaf");
    let id = client.create_entry(&fields).unwrap();
    assert_eq!(id, 1);

    let record = client.fill_entry(id).unwrap();
    assert_eq!(record.id, id);
    assert_eq!(record.fields, fields);
    assert!(client.close().unwrap());
}

#[test]
fn test_values_with_spaces_survive() {
    let server = TestServer::start();
    let mut client = server.client();

    let mut fields = sample_fields("two words");
    fields.app = "my app  v2".to_string();
    let id = client.create_entry(&fields).unwrap();
    assert_eq!(client.fill_entry(id).unwrap().fields, fields);
}

#[test]
fn test_string_workflow() {
    let server = TestServer::start();
    let mut client = server.client();
    let id = client.create_entry(&sample_fields("t")).unwrap();

    assert_eq!(client.store_string(id, "alpha").unwrap(), 1);
    assert_eq!(client.store_string(id, "beta gamma").unwrap(), 2);
    assert_eq!(client.store_string(id, ".hidden").unwrap(), 3);
    assert_eq!(client.count_strings(id).unwrap(), 3);
    assert_eq!(client.get_string_at(id, 2).unwrap(), "beta gamma");

    client.delete_string(id, 1).unwrap();
    assert_eq!(
        client.list_strings(id).unwrap(),
        vec!["beta gamma".to_string(), ".hidden".to_string()]
    );
    assert_eq!(client.get_string_at(id, 1).unwrap(), "beta gamma");

    match client.get_string_at(id, 3) {
        Err(RegistryError::StringNotFound { id: got, pos: 3 }) => assert_eq!(got, id),
        other => panic!("Expected StringNotFound, got {:?}", other),
    }
}

#[test]
fn test_large_string_reads_back() {
    let mut options = ServerOptions::new("127.0.0.1", 0);
    options.max_line_len = 16 << 20;
    let server = TestServer::with_options(options);
    let mut client = server.client();
    let id = client.create_entry(&sample_fields("big")).unwrap();

    let text = "x".repeat(5 << 20);
    assert_eq!(client.store_string(id, &text).unwrap(), 1);
    assert_eq!(client.get_string_at(id, 1).unwrap(), text);
    assert_eq!(client.list_strings(id).unwrap(), vec![text]);
}

#[test]
fn test_change_entry() {
    let server = TestServer::start();
    let mut client = server.client();
    let id = client.create_entry(&sample_fields("old")).unwrap();

    client
        .change_entry(id, &FieldSet::new().tag("new").port(0))
        .unwrap();
    let record = client.fill_entry(id).unwrap();
    assert_eq!(record.fields.tag, "new");
    assert_eq!(record.fields.port, 50002);

    let err = client
        .change_entry(id, &FieldSet::new().node(""))
        .unwrap_err();
    assert!(matches!(err, RegistryError::IncompleteData { .. }));
    assert_eq!(client.fill_entry(id).unwrap().fields.node, "node01");

    assert_entry_not_found(client.change_entry(id + 100, &FieldSet::new().tag("x")));
}

#[test]
fn test_incomplete_create_is_rejected() {
    let server = TestServer::start();
    let mut client = server.client();

    let mut fields = sample_fields("t");
    fields.pid = 0;
    let err = client.create_entry(&fields).unwrap_err();
    assert!(matches!(err, RegistryError::IncompleteData { .. }));
    assert!(client.list_entries().unwrap().is_empty());
}

#[test]
fn test_query_and_open_entry() {
    let server = TestServer::start();
    let mut client = server.client();

    let a = client.create_entry(&sample_fields("a")).unwrap();
    let mut other = sample_fields("b");
    other.comp = "hagent".to_string();
    let b = client.create_entry(&other).unwrap();
    let c = client.create_entry(&sample_fields("a")).unwrap();

    let all: Vec<_> = client
        .query_entries(&FieldSet::new())
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(all, vec![a, b, c]);

    let tagged: Vec<_> = client
        .query_entries(&FieldSet::new().tag("a").port(-1))
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(tagged, vec![a, c]);

    assert_eq!(client.open_entry(&FieldSet::new().comp("hagent")).unwrap(), Some(b));
    assert_eq!(client.open_entry(&FieldSet::new().comp("nobody")).unwrap(), None);
}

#[test]
fn test_delete_and_clean() {
    let server = TestServer::start();
    let mut client = server.client();

    let a = client.create_entry(&sample_fields("a")).unwrap();
    client.create_entry(&sample_fields("b")).unwrap();
    client.store_string(a, "s").unwrap();

    assert_eq!(client.delete_entry(a).unwrap(), a);
    assert_entry_not_found(client.fill_entry(a));
    assert_entry_not_found(client.count_strings(a));
    assert_entry_not_found(client.delete_entry(a));

    assert_eq!(client.clean().unwrap(), 1);
    assert_eq!(client.clean().unwrap(), 0);
    assert!(client.list_entries().unwrap().is_empty());

    // Ids keep increasing after CLEAN
    assert_eq!(client.create_entry(&sample_fields("c")).unwrap(), 3);
}

#[test]
fn test_unencodable_text_is_rejected_locally() {
    let server = TestServer::start();
    let mut client = server.client();
    let id = client.create_entry(&sample_fields("t")).unwrap();

    assert_bad_format(client.store_string(id, "say \"hi\""));
    assert_bad_format(client.store_string(id, "two\nlines"));
    assert_bad_format(client.store_string(id, ""));
    assert_bad_format(client.create_entry(&sample_fields("bad\"tag")));

    // The session is still in sync
    assert_eq!(client.count_strings(id).unwrap(), 0);
}

#[test]
fn test_help_and_raw() {
    let server = TestServer::start();
    let mut client = server.client();
    assert!(client.welcome().contains("PERISCOPE registry server ver."));

    let help = client.help().unwrap();
    assert_eq!(help.len(), 14);
    assert_eq!(help[0], "      QUIT terminates the connection");
    assert!(help.iter().any(|line| line.trim_start().starts_with("COUNTSTR ")));

    let id = client.create_entry(&sample_fields("t")).unwrap();
    let lines = client.raw(&format!("show {}", id)).unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], format!("+OK showing entry {}", id));
    assert!(lines[1].starts_with(&format!("ID {} app=\"lulesh \"", id)));

    assert_eq!(client.raw("FROB").unwrap(), vec!["-ERR unknown command: FROB"]);
    assert_eq!(
        client.raw("list").unwrap().first().map(String::as_str),
        Some("+OK 1 entries in registry")
    );

    // Still in sync after the multi-line raw reply
    assert_eq!(client.count_strings(id).unwrap(), 0);
}

#[test]
fn test_entries_visible_across_sessions() {
    let server = TestServer::start();
    let mut writer = server.client();
    let mut reader = server.client();

    let id = writer.create_entry(&sample_fields("shared")).unwrap();
    writer.store_string(id, "hello").unwrap();
    assert_eq!(reader.get_string_at(id, 1).unwrap(), "hello");
    assert_eq!(server.store().len(), 1);
}
