//! Repository behavior against a scripted connection double.
//!
//! The double records every executed statement and replays canned results,
//! so routing, count verification, and write-back are all observable
//! without a database.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use pgmap::{
    AttributeType, Connection, Lifecycle, MapError, MapResult, PgRepository, QueryResult, Record,
    RecordType, Repository, TabularRow, Value,
};

// ── Scripted connection double ──────────────────────────────────────────────

#[derive(Default)]
struct ScriptedConnection {
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    responses: Mutex<VecDeque<QueryResult>>,
}

impl ScriptedConnection {
    fn new() -> Self {
        Self::default()
    }

    fn respond(&self, rows: Vec<TabularRow>) {
        self.responses.lock().unwrap().push_back(QueryResult {
            rows_affected: rows.len() as u64,
            rows,
        });
    }

    fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    fn executed_sql(&self) -> Vec<String> {
        self.calls().into_iter().map(|(sql, _)| sql).collect()
    }
}

impl Connection for ScriptedConnection {
    async fn execute(&self, sql: &str, params: &[Value]) -> MapResult<QueryResult> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }
}

// ── Fixtures ────────────────────────────────────────────────────────────────

fn person_type() -> Arc<RecordType> {
    Arc::new(
        RecordType::new()
            .attribute("id", AttributeType::integer())
            .attribute("name", AttributeType::text())
            .attribute("age", AttributeType::integer())
            .attribute("created_at", AttributeType::timestamp())
            .attribute("updated_at", AttributeType::timestamp()),
    )
}

fn person_repo() -> PgRepository {
    PgRepository::new("people", person_type()).unwrap()
}

fn new_person(name: &str, age: i32) -> Record {
    Record::new(
        person_type(),
        [("name", Value::from(name)), ("age", Value::Int4(age))],
    )
    .unwrap()
}

fn ts(secs: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 7, 10, 0, secs).unwrap()
}

fn person_row(id: i32, name: &str, age: i32, at: DateTime<Utc>) -> TabularRow {
    let columns: Vec<String> = ["id", "name", "age", "created_at", "updated_at"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    TabularRow::new(
        columns.into(),
        vec![
            Value::Int4(id),
            Value::from(name),
            Value::Int4(age),
            Value::TimestampTz(at),
            Value::TimestampTz(at),
        ],
    )
}

fn updated_at_of(record: &Record) -> DateTime<Utc> {
    match record.get("updated_at") {
        Some(Value::TimestampTz(dt)) => *dt,
        other => panic!("unexpected updated_at: {other:?}"),
    }
}

// ── Insert ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_emits_one_multi_row_statement() {
    let conn = ScriptedConnection::new();
    conn.respond(vec![
        person_row(1, "Ernie", 36, ts(0)),
        person_row(2, "Bert", 37, ts(0)),
    ]);

    let mut records = [new_person("Ernie", 36), new_person("Bert", 37)];
    person_repo().insert(&conn, &mut records).await.unwrap();

    let calls = conn.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].0,
        "INSERT INTO people (name, age) VALUES ($1, $2), ($3, $4) RETURNING *"
    );
    assert_eq!(
        calls[0].1,
        vec![
            Value::from("Ernie"),
            Value::Int4(36),
            Value::from("Bert"),
            Value::Int4(37)
        ]
    );
}

#[tokio::test]
async fn insert_applies_server_assigned_values_and_stores() {
    let conn = ScriptedConnection::new();
    conn.respond(vec![person_row(1, "Ernie", 36, ts(0))]);

    let mut ernie = new_person("Ernie", 36);
    person_repo()
        .insert(&conn, std::slice::from_mut(&mut ernie))
        .await
        .unwrap();

    assert!(ernie.is_stored());
    assert!(!ernie.is_dirty());
    assert_eq!(ernie.get("id"), Some(&Value::Int4(1)));
    assert_eq!(ernie.get("created_at"), Some(&Value::TimestampTz(ts(0))));
}

#[tokio::test]
async fn insert_row_count_mismatch_is_fatal_and_applies_nothing() {
    let conn = ScriptedConnection::new();
    conn.respond(vec![person_row(1, "Ernie", 36, ts(0))]);

    let mut records = [new_person("Ernie", 36), new_person("Bert", 37)];
    let err = person_repo().insert(&conn, &mut records).await.unwrap_err();

    assert!(matches!(
        err,
        MapError::ResultMismatch {
            expected: 2,
            got: 1
        }
    ));
    for record in &records {
        assert_eq!(record.lifecycle(), Lifecycle::New);
        assert_eq!(record.get("id"), None);
    }
}

#[tokio::test]
async fn insert_fills_uneven_batches_with_defaults() {
    let conn = ScriptedConnection::new();
    conn.respond(vec![
        person_row(1, "Ernie", 36, ts(0)),
        person_row(2, "Bert", 0, ts(0)),
    ]);

    let mut records = [
        new_person("Ernie", 36),
        Record::new(person_type(), [("name", Value::from("Bert"))]).unwrap(),
    ];
    person_repo().insert(&conn, &mut records).await.unwrap();

    assert_eq!(
        conn.executed_sql()[0],
        "INSERT INTO people (name, age) VALUES ($1, $2), ($3, DEFAULT) RETURNING *"
    );
}

#[tokio::test]
async fn insert_of_empty_batch_is_a_no_op() {
    let conn = ScriptedConnection::new();
    person_repo().insert(&conn, &mut []).await.unwrap();
    assert!(conn.calls().is_empty());
}

// ── Update ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn update_covers_only_dirty_attributes() {
    let conn = ScriptedConnection::new();
    conn.respond(vec![person_row(1, "Bert", 36, ts(1))]);

    let mut ernie = new_person("Ernie", 36);
    ernie.set("id", 1_i32).unwrap();
    ernie.mark_stored();
    ernie.set("name", "Bert").unwrap();

    person_repo()
        .update(&conn, std::slice::from_mut(&mut ernie))
        .await
        .unwrap();

    let calls = conn.calls();
    assert_eq!(
        calls[0].0,
        "UPDATE people SET name = $1 WHERE id = $2 RETURNING *"
    );
    assert_eq!(calls[0].1, vec![Value::from("Bert"), Value::Int4(1)]);
    assert!(!ernie.is_dirty());
    assert_eq!(ernie.get("updated_at"), Some(&Value::TimestampTz(ts(1))));
}

#[tokio::test]
async fn update_of_clean_record_issues_no_statement() {
    let conn = ScriptedConnection::new();
    let mut ernie = new_person("Ernie", 36);
    ernie.mark_stored();

    person_repo()
        .update(&conn, std::slice::from_mut(&mut ernie))
        .await
        .unwrap();

    assert!(conn.calls().is_empty());
}

#[tokio::test]
async fn update_matching_no_rows_is_a_mismatch() {
    let conn = ScriptedConnection::new();
    conn.respond(vec![]);

    let mut ernie = new_person("Ernie", 36);
    ernie.set("id", 42_i32).unwrap();
    ernie.mark_stored();
    ernie.set("name", "Bert").unwrap();

    let err = person_repo()
        .update(&conn, std::slice::from_mut(&mut ernie))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MapError::ResultMismatch {
            expected: 1,
            got: 0
        }
    ));
    // The failed update left the dirty mark in place.
    assert!(ernie.is_dirty());
}

// ── Delete ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_matches_keys_and_marks_deleted() {
    let conn = ScriptedConnection::new();
    conn.respond(vec![
        person_row(1, "Ernie", 36, ts(0)),
        person_row(2, "Bert", 37, ts(0)),
    ]);

    let mut ernie = new_person("Ernie", 36);
    ernie.set("id", 1_i32).unwrap();
    ernie.mark_stored();
    let mut bert = new_person("Bert", 37);
    bert.set("id", 2_i32).unwrap();
    bert.mark_stored();

    let mut records = [ernie, bert];
    person_repo().delete(&conn, &mut records).await.unwrap();

    assert_eq!(
        conn.executed_sql()[0],
        "DELETE FROM people WHERE (id = $1) OR (id = $2) RETURNING *"
    );
    assert!(records.iter().all(|r| r.is_deleted()));
}

#[tokio::test]
async fn delete_count_mismatch_is_fatal() {
    let conn = ScriptedConnection::new();
    conn.respond(vec![person_row(1, "Ernie", 36, ts(0))]);

    let mut ernie = new_person("Ernie", 36);
    ernie.set("id", 1_i32).unwrap();
    ernie.mark_stored();
    let mut bert = new_person("Bert", 37);
    bert.set("id", 2_i32).unwrap();
    bert.mark_stored();

    let mut records = [ernie, bert];
    let err = person_repo().delete(&conn, &mut records).await.unwrap_err();
    assert!(err.is_mismatch());
    assert!(records.iter().all(|r| r.is_stored()));
}

// ── Store routing ───────────────────────────────────────────────────────────

#[tokio::test]
async fn store_routes_new_to_insert_and_stored_to_update() {
    let conn = ScriptedConnection::new();
    conn.respond(vec![person_row(2, "Bert", 37, ts(0))]); // insert of the new record
    conn.respond(vec![person_row(1, "Ernie", 37, ts(1))]); // update of the stored one

    let mut ernie = new_person("Ernie", 36);
    ernie.set("id", 1_i32).unwrap();
    ernie.mark_stored();
    ernie.set("age", 37_i32).unwrap();
    let bert = new_person("Bert", 37);

    let mut records = [ernie, bert];
    person_repo().store(&conn, &mut records).await.unwrap();

    let sql = conn.executed_sql();
    assert_eq!(sql.len(), 2);
    assert!(sql[0].starts_with("INSERT INTO people"));
    assert!(sql[1].starts_with("UPDATE people"));
    assert!(records.iter().all(|r| r.is_stored()));
}

#[tokio::test]
async fn store_rejects_deleted_records() {
    let conn = ScriptedConnection::new();
    let mut ernie = new_person("Ernie", 36);
    ernie.mark_stored();
    ernie.mark_deleted();

    let err = person_repo()
        .store(&conn, std::slice::from_mut(&mut ernie))
        .await
        .unwrap_err();
    assert!(matches!(err, MapError::Validation(_)));
    assert!(conn.calls().is_empty());
}

// ── Fetch / all ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn fetch_builds_a_key_filtered_select() {
    let conn = ScriptedConnection::new();
    conn.respond(vec![person_row(1, "Ernie", 36, ts(0))]);

    let fetched = person_repo()
        .fetch(&conn, &[Value::Int4(1)])
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        conn.executed_sql()[0],
        "SELECT * FROM people WHERE id = $1"
    );
    assert!(fetched.is_stored());
    assert_eq!(fetched.get("name"), Some(&Value::from("Ernie")));
}

#[tokio::test]
async fn fetch_of_a_missing_row_is_none() {
    let conn = ScriptedConnection::new();
    conn.respond(vec![]);
    let fetched = person_repo().fetch(&conn, &[Value::Int4(9)]).await.unwrap();
    assert!(fetched.is_none());
}

#[tokio::test]
async fn fetch_of_multiple_rows_is_a_mismatch() {
    let conn = ScriptedConnection::new();
    conn.respond(vec![
        person_row(1, "Ernie", 36, ts(0)),
        person_row(1, "Ernie", 36, ts(0)),
    ]);
    let err = person_repo()
        .fetch(&conn, &[Value::Int4(1)])
        .await
        .unwrap_err();
    assert!(err.is_mismatch());
}

#[tokio::test]
async fn fetch_rejects_a_key_of_the_wrong_width() {
    let conn = ScriptedConnection::new();
    let err = person_repo()
        .fetch(&conn, &[Value::Int4(1), Value::Int4(2)])
        .await
        .unwrap_err();
    assert!(matches!(err, MapError::Validation(_)));
}

#[tokio::test]
async fn all_returns_hydrated_records_in_result_order() {
    let conn = ScriptedConnection::new();
    conn.respond(vec![
        person_row(2, "Bert", 37, ts(0)),
        person_row(1, "Ernie", 36, ts(0)),
    ]);

    let records = person_repo().all(&conn).await.unwrap();
    assert_eq!(conn.executed_sql()[0], "SELECT * FROM people");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get("name"), Some(&Value::from("Bert")));
    assert!(records.iter().all(|r| r.is_stored()));
}

// ── End to end ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_fetch_update_fetch_round_trip() {
    let repo = person_repo();
    let conn = ScriptedConnection::new();

    // insert Ernie; the server assigns id and timestamps
    conn.respond(vec![person_row(1, "Ernie", 36, ts(0))]);
    let mut ernie = new_person("Ernie", 36);
    repo.insert(&conn, std::slice::from_mut(&mut ernie))
        .await
        .unwrap();
    let id = ernie.get("id").cloned().unwrap();

    // fetch it back by primary key
    conn.respond(vec![person_row(1, "Ernie", 36, ts(0))]);
    let mut fetched = repo.fetch(&conn, &[id.clone()]).await.unwrap().unwrap();
    let before = updated_at_of(&fetched);

    // mutate and update; the server bumps updated_at
    fetched.set("name", "Bert").unwrap();
    conn.respond(vec![person_row(1, "Bert", 36, ts(5))]);
    repo.update(&conn, std::slice::from_mut(&mut fetched))
        .await
        .unwrap();

    // fetch again
    conn.respond(vec![person_row(1, "Bert", 36, ts(5))]);
    let last = repo.fetch(&conn, &[id]).await.unwrap().unwrap();

    assert_eq!(last.get("name"), Some(&Value::from("Bert")));
    assert_eq!(last.get("age"), Some(&Value::Int4(36)));
    assert!(updated_at_of(&last) > before);
}
