#![cfg(feature = "sqlite")]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use extdb::backend::LoginParams;
use extdb::config::ExtensionConfig;
use extdb::reply;
use extdb::{ExtDbError, Extension};

const GAME: &str = r#"
[Default]
Version = 1
"Number of Retrys" = 1

[getUser]
SQL1_1 = "SELECT name, born FROM users"
SQL1_2 = "WHERE id = ?"
SQL1_INPUTS = "1"
OUTPUT = "1-string,2"

[addUser]
"Return InsertID" = true
SQL1_1 = "INSERT INTO users (name) VALUES (?)"
SQL1_INPUTS = "1"

[userCount]
"Prepared Statement" = false
SQL1_1 = "SELECT COUNT(*) FROM users WHERE name <> '$CUSTOM_1$'"
SQL1_INPUTS = "1-mysql_escape"

[avatar]
SQL1_1 = "SELECT avatar FROM users WHERE id = ?"
SQL1_INPUTS = "1"
"#;

fn setup(output_size: usize) -> Result<(tempfile::TempDir, Extension), ExtDbError> {
    let dir = tempfile::tempdir().map_err(|err| ExtDbError::Other(err.to_string()))?;
    let path = dir.path().join("game.sqlite");
    {
        let conn = rusqlite::Connection::open(&path)?;
        conn.execute_batch(
            "
            CREATE TABLE users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                born DATE,
                avatar BLOB
            );
            INSERT INTO users (name, born, avatar) VALUES ('alice', '2001-02-03', x'00ff');
            ",
        )?;
    }
    let config = ExtensionConfig::default()
        .with_threads(2)
        .with_database("Database", LoginParams::for_database(path.to_string_lossy()))
        .with_definitions("game", GAME);
    let ext = Extension::builder(Arc::new(config))
        .output_size(output_size)
        .build()?;
    assert_eq!(ext.call("9:ADD_DATABASE:Database"), reply::OK);
    assert_eq!(
        ext.call("9:ADD_DATABASE_PROTOCOL:Database:SQL_CUSTOM:game:game"),
        reply::OK
    );
    assert_eq!(
        ext.call("9:ADD_DATABASE_PROTOCOL:Database:SQL:raw:TEXT-NULL"),
        reply::OK
    );
    Ok((dir, ext))
}

fn poll_until_ready(ext: &Extension, handle: &str) -> String {
    for _ in 0..500 {
        let reply = ext.call(&format!("4:{handle}"));
        if reply != reply::COMPUTING {
            return reply;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("handle {handle} never completed");
}

fn handle_of(stored: &str) -> String {
    stored
        .trim_start_matches("[2,\"")
        .trim_end_matches("\"]")
        .to_string()
}

#[test]
fn template_calls_round_trip_through_sqlite() -> Result<(), ExtDbError> {
    let (_dir, ext) = setup(10_240)?;
    assert_eq!(ext.call("0:game:getUser:1"), r#"[1,[["alice",[2001,2,3]]]]"#);
    assert_eq!(ext.call("0:game:addUser:bob"), "[1,[2,[]]]");
    assert_eq!(ext.call("0:game:getUser:2"), r#"[1,[["bob",""]]]"#);
    assert_eq!(ext.call("0:game:userCount:o'neil"), "[1,[[2]]]");
    assert_eq!(ext.call("0:game:getUser"), reply::arity_mismatch(0, 1));
    assert_eq!(ext.call("0:game:avatar:1"), reply::UNSUPPORTED_FIELD_TYPE);
    Ok(())
}

#[test]
fn pass_through_quotes_text_and_marks_nulls() -> Result<(), ExtDbError> {
    let (_dir, ext) = setup(10_240)?;
    assert_eq!(
        ext.call("0:raw:SELECT name, NULL, id FROM users WHERE id = 1"),
        r#"[1,[["alice",objNull,1]]]"#
    );
    assert_eq!(ext.call("0:raw:SELECT * FROM missing"), reply::QUERY_ERROR);
    Ok(())
}

#[test]
fn stored_calls_are_polled_by_handle() -> Result<(), ExtDbError> {
    let (_dir, ext) = setup(10_240)?;
    let stored = ext.call("2:game:getUser:1");
    assert!(stored.starts_with("[2,\""), "{stored}");
    let handle = handle_of(&stored);
    assert_eq!(poll_until_ready(&ext, &handle), r#"[1,[["alice",[2001,2,3]]]]"#);
    assert_eq!(ext.call(&format!("4:{handle}")), "");
    Ok(())
}

#[test]
fn fire_and_forget_calls_run_on_workers() -> Result<(), ExtDbError> {
    let (_dir, ext) = setup(10_240)?;
    assert_eq!(ext.call("1:game:addUser:carol"), "");
    for _ in 0..500 {
        if ext.call("0:game:userCount:nobody") == "[1,[[2]]]" {
            return Ok(());
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("fire-and-forget insert never landed");
}

#[test]
fn oversized_sync_replies_are_stored_for_multi_part_polling() -> Result<(), ExtDbError> {
    let (_dir, ext) = setup(40)?;
    for i in 0..20 {
        let reply = ext.call(&format!("0:game:addUser:user{i}"));
        assert!(reply.starts_with("[1,["), "{reply}");
    }
    let expected_prefix = r#"[1,[["alice"],["user0"],"#;
    let stored = ext.call("0:raw:SELECT name FROM users ORDER BY id");
    assert!(stored.starts_with("[2,\""), "{stored}");
    let handle = handle_of(&stored);
    assert_eq!(ext.call(&format!("4:{handle}")), reply::TOO_LARGE);

    let mut message = String::new();
    loop {
        let chunk = ext.call(&format!("5:{handle}"));
        if chunk.is_empty() {
            break;
        }
        assert!(chunk.len() <= 40);
        message.push_str(&chunk);
    }
    assert!(message.starts_with(expected_prefix), "{message}");
    assert!(message.ends_with(r#"["user19"]]]"#), "{message}");
    Ok(())
}
