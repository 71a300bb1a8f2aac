//! Integration tests for pg-session
//!
//! These tests require a running Postgres instance, configured through the
//! `db_host`, `db_name`, `db_user`, `db_password` and `db_port` variables.

use futures::TryStreamExt;
use pg_session::{ConnectionState, Session, SessionConfig};

#[tokio::test]
#[ignore] // Requires Postgres running
async fn test_connect_and_query() {
    let mut session = Session::connect(SessionConfig::default())
        .await
        .expect("connect");
    assert_eq!(session.connection_state(), ConnectionState::Open);

    let rows = session.query("SELECT 1 AS one").await.expect("query");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_by_name("one"), Some("1"));

    session.close().await;
}

#[tokio::test]
#[ignore] // Requires Postgres running
async fn test_results_mode_rolls_back_writes() {
    let mut session = Session::connect(SessionConfig::default())
        .await
        .expect("connect");

    session
        .command("CREATE TABLE IF NOT EXISTS pg_session_it (id int)")
        .await
        .expect("create");
    session
        .command("TRUNCATE pg_session_it")
        .await
        .expect("truncate");

    // Rolled back: results were requested
    session
        .execute("INSERT INTO pg_session_it VALUES (1) RETURNING id", true)
        .await
        .expect("insert");
    let rows = session
        .query("SELECT id FROM pg_session_it")
        .await
        .expect("select");
    assert!(rows.is_empty());

    session
        .command("INSERT INTO pg_session_it VALUES (2)")
        .await
        .expect("insert");
    let rows = session
        .query("SELECT id FROM pg_session_it")
        .await
        .expect("select");
    assert_eq!(rows.len(), 1);

    session
        .command("DROP TABLE pg_session_it")
        .await
        .expect("drop");
}

#[tokio::test]
#[ignore] // Requires Postgres running
async fn test_streaming_query() {
    let config = SessionConfig::builder()
        .cursor_name("pg_session_it")
        .fetch_size(1000)
        .build();
    let mut session = Session::connect(config).await.expect("connect");

    let mut stream = session
        .iterate("SELECT n FROM generate_series(1, 25000) AS n")
        .await
        .expect("iterate");

    let mut expected = 0i64;
    while let Some(row) = stream.try_next().await.expect("row") {
        expected += 1;
        assert_eq!(row.parse::<i64>(0), Some(expected));
    }
    assert_eq!(expected, 25_000);
}

#[tokio::test]
#[ignore] // Requires Postgres running
async fn test_syntax_error_is_query_error() {
    let mut session = Session::connect(SessionConfig::default())
        .await
        .expect("connect");

    let err = session.query("SELEC 1").await.unwrap_err();
    assert!(err.is_query());

    // Still usable on the same connection
    let rows = session.query("SELECT 1").await.expect("query");
    assert_eq!(rows.len(), 1);
}
