mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{FakeConnector, Script, column, text};
use extdb::backend::LoginParams;
use extdb::pool::{ConnectionPool, PoolSettings};
use extdb::reply;
use extdb::template::QueryTemplateEngine;
use extdb::types::{ColumnInfo, ColumnKind, RowValues};
use extdb::ExtDbError;

const DEFINITIONS: &str = r#"
[Default]
Version = 1
"Strip Chars" = ";"
"Strip Chars Mode" = 2
"Number of Retrys" = 2

[getUser]
SQL1_1 = "SELECT name FROM users WHERE id = ?"
SQL1_INPUTS = "1"
OUTPUT = "1-string"

[setSeen]
SQL1_1 = "UPDATE users SET seen = ?, note = ? WHERE id = ?"
SQL1_INPUTS = "2-time,3-null,1"

[findByName]
"Prepared Statement" = false
SQL1_1 = "SELECT id FROM users WHERE name = '$CUSTOM_1$' AND tag = $CUSTOM_2$"
SQL1_INPUTS = "1-mysql_escape,2-string"

[addUser]
"Return InsertID" = true
SQL1_1 = "INSERT INTO users (name) VALUES (?)"
SQL1_INPUTS = "1-strip"

[tagUsers]
"Input SQF Parser" = true
"Return InsertID String" = true
SQL1_1 = "UPDATE users SET tag = ? WHERE id = ?"
SQL1_INPUTS = "1,2"

[getDates]
SQL1_1 = "SELECT born, gone FROM users"
OUTPUT = "1,2-null"
"#;

fn pool(script: &Arc<Script>) -> Result<Arc<ConnectionPool>, ExtDbError> {
    ConnectionPool::connect(
        "Database",
        LoginParams::for_database("game"),
        FakeConnector::new(Arc::clone(script)),
        PoolSettings::default(),
    )
}

fn engine(script: &Arc<Script>) -> Result<QueryTemplateEngine, ExtDbError> {
    let (engine, report) = QueryTemplateEngine::from_source(pool(script)?, DEFINITIONS);
    assert!(report.ok, "{:?}", report.diagnostics);
    Ok(engine)
}

#[test]
fn unknown_calls_are_reported() -> Result<(), ExtDbError> {
    let script = Script::new();
    let engine = engine(&script)?;
    assert_eq!(engine.execute("getNobody:1"), reply::CALL_NOT_FOUND);
    assert_eq!(Script::count(&script.executions), 0);
    Ok(())
}

#[test]
fn arity_mismatch_issues_no_statement() -> Result<(), ExtDbError> {
    let script = Script::new();
    let engine = engine(&script)?;
    assert_eq!(engine.execute("getUser"), reply::arity_mismatch(0, 1));
    assert_eq!(engine.execute("getUser:1:2"), reply::arity_mismatch(2, 1));
    assert_eq!(Script::count(&script.executions), 0);
    assert_eq!(Script::count(&script.prepares), 0);
    Ok(())
}

#[test]
fn prepared_calls_bind_and_format_rows() -> Result<(), ExtDbError> {
    let script = Script::new();
    script.set_rows(vec![column("name")], vec![vec![text("alice")]]);
    let engine = engine(&script)?;
    assert_eq!(engine.execute("getUser:42"), r#"[1,[["alice"]]]"#);
    assert_eq!(engine.execute("getUser:43"), r#"[1,[["alice"]]]"#);
    assert_eq!(
        script.executed(),
        vec![
            "SELECT name FROM users WHERE id = ? | 42",
            "SELECT name FROM users WHERE id = ? | 43",
        ]
    );
    assert_eq!(Script::count(&script.prepares), 1, "statement is cached per session");
    Ok(())
}

#[test]
fn time_and_null_inputs_bind_with_their_types() -> Result<(), ExtDbError> {
    let script = Script::new();
    let engine = engine(&script)?;
    assert_eq!(engine.execute("setSeen:7:[2024,1,2,3,4,5]:"), "[1,[]]");
    assert_eq!(
        script.executed(),
        vec!["UPDATE users SET seen = ?, note = ? WHERE id = ? | 2024-01-02 03:04:05, NULL, 7"]
    );
    Ok(())
}

#[test]
fn raw_calls_substitute_placeholders() -> Result<(), ExtDbError> {
    let script = Script::new();
    let engine = engine(&script)?;
    assert_eq!(engine.execute("findByName:o'neil:red"), "[1,[]]");
    assert_eq!(
        script.executed(),
        vec![r#"SELECT id FROM users WHERE name = 'o''neil' AND tag = "red""#]
    );
    assert_eq!(Script::count(&script.prepares), 0);
    Ok(())
}

#[test]
fn retry_budget_is_retries_plus_one() -> Result<(), ExtDbError> {
    let script = Script::new();
    let engine = engine(&script)?;
    script.fail_next_queries(100, true);
    assert_eq!(engine.execute("getUser:1"), reply::MAX_RETRIES);
    assert_eq!(Script::count(&script.executions), 3);
    assert_eq!(Script::count(&script.resets), 3);
    Ok(())
}

#[test]
fn transient_failures_are_retried() -> Result<(), ExtDbError> {
    let script = Script::new();
    script.set_rows(vec![column("name")], vec![vec![text("bob")]]);
    let engine = engine(&script)?;
    script.fail_next_queries(1, true);
    assert_eq!(engine.execute("getUser:1"), r#"[1,[["bob"]]]"#);
    assert_eq!(Script::count(&script.executions), 2);
    assert_eq!(Script::count(&script.prepares), 2, "reset drops the cached statement");
    Ok(())
}

#[test]
fn non_retryable_failures_stop_immediately() -> Result<(), ExtDbError> {
    let script = Script::new();
    let engine = engine(&script)?;
    script.fail_next_queries(1, false);
    assert_eq!(engine.execute("getUser:1"), reply::UNSUPPORTED_FIELD_TYPE);
    assert_eq!(Script::count(&script.executions), 1);
    Ok(())
}

#[test]
fn strip_rejections_fail_before_execution() -> Result<(), ExtDbError> {
    let script = Script::new();
    let engine = engine(&script)?;
    assert_eq!(engine.execute("addUser:bob;drop"), reply::STRIP_CHAR_FOUND);
    assert_eq!(Script::count(&script.executions), 0);
    Ok(())
}

#[test]
fn insert_ids_wrap_the_rows() -> Result<(), ExtDbError> {
    let script = Script::new();
    script.set_insert_id(7);
    let engine = engine(&script)?;
    assert_eq!(engine.execute("addUser:bob"), "[1,[7,[]]]");
    Ok(())
}

#[test]
fn literal_inputs_use_the_nested_tokenizer() -> Result<(), ExtDbError> {
    let script = Script::new();
    script.set_insert_id(9);
    let engine = engine(&script)?;
    assert_eq!(engine.execute(r#"tagUsers:["a:b",5]"#), r#"[1,["9",[]]]"#);
    assert_eq!(
        script.executed(),
        vec!["UPDATE users SET tag = ? WHERE id = ? | a:b, 5"]
    );
    assert_eq!(engine.execute(r#"tagUsers:["a",5"#), reply::INVALID_INPUT_FORMAT);
    assert_eq!(engine.execute(r#"tagUsers:["a"]"#), reply::arity_mismatch(1, 2));
    Ok(())
}

#[test]
fn temporal_and_null_outputs_are_converted() -> Result<(), ExtDbError> {
    let script = Script::new();
    script.set_rows(
        vec![
            ColumnInfo::new("born", ColumnKind::Date),
            ColumnInfo::new("gone", ColumnKind::DateTime),
        ],
        vec![
            vec![text("2001-02-03"), RowValues::Null],
            vec![text("not a date"), text("2020-01-02 03:04:05")],
        ],
    );
    let engine = engine(&script)?;
    assert_eq!(
        engine.execute("getDates"),
        "[1,[[[2001,2,3],objNull],[[],[2020,1,2,3,4,5]]]]"
    );
    Ok(())
}

#[test]
fn connect_failures_surface_as_connection_errors() -> Result<(), ExtDbError> {
    let script = Script::new();
    let pool = pool(&script)?;
    let (engine, _) = QueryTemplateEngine::from_source(Arc::clone(&pool), DEFINITIONS);

    // The only idle session is checked out, so the call has to open a new one.
    let held = pool.acquire()?;
    script.connect_failures.store(1, Ordering::SeqCst);
    assert_eq!(engine.execute("getUser:1"), reply::SESSION_CONNECTION_ERROR);
    assert_eq!(Script::count(&script.executions), 0);

    drop(held);
    assert!(engine.execute("getUser:1").starts_with("[1,"));
    assert_eq!(pool.idle_count(), 1);
    Ok(())
}
