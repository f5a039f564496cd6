//! SQLiteバックエンド固有の統合テスト

use std::sync::Arc;

use auditlog::db::{RelationalStore, SqliteStore};
use auditlog::{LogStore, StoreError};

use crate::support::{fields, sqlite_log_store};

#[tokio::test]
async fn creates_database_file_and_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("audit.db");
    let url = format!("sqlite:{}", path.display());

    let backend = SqliteStore::connect(&url, 2).await.unwrap();
    let store = LogStore::new(Arc::new(backend));
    store
        .append(&fields(&[("source", "svc1"), ("category", "INFO"), ("text", "x")]))
        .await
        .unwrap();

    assert!(path.exists());
}

#[tokio::test]
async fn records_survive_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("audit.db").display());

    {
        let backend = SqliteStore::connect(&url, 2).await.unwrap();
        let store = LogStore::new(Arc::new(backend.clone()));
        store
            .append(&fields(&[
                ("source", "svc1"),
                ("category", "ALERT"),
                ("text", "disk full"),
                ("severity", "high"),
            ]))
            .await
            .unwrap();
        backend.pool().close().await;
    }

    let backend = SqliteStore::connect(&url, 2).await.unwrap();
    let store = LogStore::new(Arc::new(backend));
    let record = store.get_by_id(1).await.unwrap();
    assert_eq!(record.core.text, "disk full");
    assert_eq!(record.attributes["severity"], "high");

    // 採番は永続化された最大値から続く
    let next = store
        .append(&fields(&[("source", "svc1"), ("category", "INFO"), ("text", "y")]))
        .await
        .unwrap();
    assert_eq!(next.identity(), 2);
}

#[tokio::test]
async fn category_schema_is_fixed_by_first_write() {
    let store = sqlite_log_store().await;
    store
        .append(&fields(&[
            ("source", "s"),
            ("category", "ALERT"),
            ("text", "t"),
            ("severity", "high"),
        ]))
        .await
        .unwrap();

    let err = store
        .append(&fields(&[
            ("source", "s"),
            ("category", "ALERT"),
            ("text", "t"),
            ("severity", "low"),
            ("host", "db1"),
        ]))
        .await
        .unwrap_err();
    match err {
        StoreError::SchemaMismatch {
            relation,
            expected,
            found,
        } => {
            assert_eq!(relation, "ALERT");
            assert_eq!(expected, vec!["IDENTITY", "SEVERITY"]);
            assert_eq!(found, vec!["HOST", "IDENTITY", "SEVERITY"]);
        }
        other => panic!("unexpected error: {other}"),
    }

    // コア行は残る（ロールバックしない）
    let rows = store.list_all().await.unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn category_names_need_quoting() {
    let store = sqlite_log_store().await;
    let record = store
        .append(&fields(&[
            ("source", "s"),
            ("category", "user login\"; DROP"),
            ("text", "t"),
            ("ip address", "10.0.0.1"),
        ]))
        .await
        .unwrap();

    let fetched = store.get_by_id(record.identity()).await.unwrap();
    assert_eq!(fetched.attributes["ip address"], "10.0.0.1");
    assert_eq!(fetched.core.category, "user login\"; DROP");
}

#[tokio::test]
async fn large_candidate_sets_are_merged_completely() {
    let store = sqlite_log_store().await;
    for i in 0..520 {
        let text = format!("event {i}");
        store
            .append(&fields(&[
                ("source", "bulk"),
                ("category", "ALERT"),
                ("text", text.as_str()),
                ("severity", if i % 2 == 0 { "high" } else { "low" }),
            ]))
            .await
            .unwrap();
    }

    let records = store.query(&fields(&[("source", "bulk")])).await.unwrap();
    assert_eq!(records.len(), 520);
    assert!(records.iter().all(|r| r.attributes.contains_key("severity")));

    let high = store
        .query(&fields(&[("source", "bulk"), ("severity", "high")]))
        .await
        .unwrap();
    assert_eq!(high.len(), 260);
}

#[tokio::test]
async fn session_reports_relations_and_columns() {
    let backend = SqliteStore::connect("sqlite::memory:", 1).await.unwrap();
    let store = LogStore::new(Arc::new(backend.clone()));
    store
        .append(&fields(&[
            ("source", "s"),
            ("category", "AUTH"),
            ("text", "t"),
            ("user", "alice"),
        ]))
        .await
        .unwrap();

    let mut session = backend.open().await.unwrap();
    assert_eq!(session.list_relations().await.unwrap(), vec!["AUTH", "LOGS"]);
    let columns = session.list_columns(Some("AUTH")).await.unwrap();
    assert_eq!(
        columns.into_iter().collect::<Vec<_>>(),
        vec!["IDENTITY", "USER"]
    );
}
