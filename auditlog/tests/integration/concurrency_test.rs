//! 並行書き込み

use std::collections::BTreeSet;
use std::sync::Arc;

use auditlog::db::{MemoryStore, Predicate, RelationalStore, SqliteStore};
use auditlog::LogStore;

use crate::support::{fields, memory_log_store};

async fn append_concurrently(store: &LogStore, writers: usize) -> Vec<i64> {
    let mut handles = Vec::with_capacity(writers);
    for i in 0..writers {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let text = format!("writer {i}");
            store
                .append(&fields(&[
                    ("source", "worker"),
                    ("category", "JOB"),
                    ("text", text.as_str()),
                    ("worker", "yes"),
                ]))
                .await
                .map(|record| record.identity())
        }));
    }
    let mut identities = Vec::with_capacity(writers);
    for handle in handles {
        identities.push(handle.await.unwrap().unwrap());
    }
    identities
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn serialized_writers_get_unique_identities() {
    let (_, store) = memory_log_store();
    assert!(store.serializes_writes());

    let identities: BTreeSet<i64> = append_concurrently(&store, 32).await.into_iter().collect();
    assert_eq!(identities, (1..=32).collect::<BTreeSet<i64>>());

    let records = store.query(&fields(&[("worker", "yes")])).await.unwrap();
    assert_eq!(records.len(), 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn serialized_writers_on_sqlite_pool() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("audit.db").display());
    let backend = SqliteStore::connect(&url, 4).await.unwrap();
    let store = LogStore::new(Arc::new(backend));

    let identities: BTreeSet<i64> = append_concurrently(&store, 12).await.into_iter().collect();
    assert_eq!(identities, (1..=12).collect::<BTreeSet<i64>>());
    assert_eq!(store.list_all().await.unwrap().len(), 12);
}

/// 直列化なしでは識別子が重複しうるが、読み取りは識別子ごとに1件へ畳み込む
async fn assert_unserialized_writers_merge(backend: Arc<dyn RelationalStore>, writers: usize) {
    let store = LogStore::with_serialized_writes(backend.clone(), false);
    assert!(!store.serializes_writes());

    let appended: BTreeSet<i64> = append_concurrently(&store, writers)
        .await
        .into_iter()
        .collect();
    assert_eq!(store.list_all().await.unwrap().len(), writers);

    let mut session = backend.open().await.unwrap();
    let job_rows = session.scan("JOB", &Predicate::all()).await.unwrap();
    assert_eq!(job_rows.len(), writers);
    drop(session);

    let records = store.query(&fields(&[("worker", "yes")])).await.unwrap();
    let returned: Vec<i64> = records.iter().map(|r| r.identity()).collect();
    let distinct: BTreeSet<i64> = returned.iter().copied().collect();
    assert_eq!(returned.len(), distinct.len());
    assert_eq!(distinct, appended);
    assert!(records.iter().all(|r| r.attributes["worker"] == "yes"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unserialized_writers_merge_to_one_record_per_identity() {
    assert_unserialized_writers_merge(Arc::new(MemoryStore::new()), 32).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unserialized_writers_on_sqlite_create_category_once() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("audit.db").display());
    let backend = SqliteStore::connect(&url, 4).await.unwrap();

    assert_unserialized_writers_merge(Arc::new(backend), 12).await;
}
