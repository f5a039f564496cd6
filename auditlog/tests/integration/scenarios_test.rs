//! 書き込み・読み取りシナリオ（インメモリ / SQLite 両バックエンド）

use std::sync::Arc;

use auditlog::db::{MemoryStore, Predicate, RelationalStore, Row, SqliteStore, Value};
use auditlog::{LogStore, StoreError};

use crate::support::fields;

async fn backends() -> Vec<(&'static str, Arc<dyn RelationalStore>)> {
    let sqlite = SqliteStore::connect("sqlite::memory:", 1)
        .await
        .expect("connect in-memory sqlite");
    let memory: Arc<dyn RelationalStore> = Arc::new(MemoryStore::new());
    let sqlite: Arc<dyn RelationalStore> = Arc::new(sqlite);
    vec![("memory", memory), ("sqlite", sqlite)]
}

async fn append_alert(store: &LogStore) -> auditlog::LogicalRecord {
    store
        .append(&fields(&[
            ("source", "svc1"),
            ("category", "ALERT"),
            ("text", "disk full"),
            ("severity", "high"),
        ]))
        .await
        .expect("append alert")
}

#[tokio::test]
async fn scenario_a_first_append_creates_category_relation() {
    for (name, backend) in backends().await {
        let store = LogStore::new(backend.clone());
        let record = append_alert(&store).await;
        assert_eq!(record.identity(), 1, "{name}");
        assert_eq!(record.core.source, "svc1", "{name}");
        assert_eq!(record.attributes["severity"], "high", "{name}");

        let mut session = backend.open().await.unwrap();
        let rows = session.scan("ALERT", &Predicate::all()).await.unwrap();
        let expected = Row::from([
            ("IDENTITY".to_string(), Value::Integer(1)),
            ("SEVERITY".to_string(), Value::from("high")),
        ]);
        assert_eq!(rows, vec![expected], "{name}");
    }
}

#[tokio::test]
async fn scenario_b_query_by_category_field_only() {
    for (name, backend) in backends().await {
        let store = LogStore::new(backend);
        let appended = append_alert(&store).await;

        let records = store.query(&fields(&[("severity", "high")])).await.unwrap();
        assert_eq!(records, vec![appended], "{name}");
    }
}

#[tokio::test]
async fn scenario_c_core_conditions_that_match_nothing() {
    for (name, backend) in backends().await {
        let store = LogStore::new(backend);
        append_alert(&store).await;

        let records = store
            .query(&fields(&[("source", "svc1"), ("category", "OTHER")]))
            .await
            .unwrap();
        assert!(records.is_empty(), "{name}");
    }
}

#[tokio::test]
async fn scenario_d_missing_text_is_rejected() {
    for (name, backend) in backends().await {
        let store = LogStore::new(backend.clone());
        let err = store
            .append(&fields(&[("source", "svc1"), ("category", "ALERT")]))
            .await
            .unwrap_err();
        assert!(
            matches!(err, StoreError::MissingRequiredField(ref f) if f == "text"),
            "{name}: {err}"
        );

        let mut session = backend.open().await.unwrap();
        assert!(!session.relation_exists("LOGS").await.unwrap(), "{name}");
    }
}

#[tokio::test]
async fn round_trip_returns_every_appended_field() {
    for (name, backend) in backends().await {
        let store = LogStore::new(backend);
        let input = fields(&[
            ("source", "gateway"),
            ("category", "AUTH"),
            ("text", "login"),
            ("user", "alice"),
            ("method", "password"),
        ]);
        let appended = store.append(&input).await.unwrap();
        let fetched = store.get_by_id(appended.identity()).await.unwrap();
        assert_eq!(fetched, appended, "{name}");

        let all = fetched.fields();
        for (key, value) in &input {
            assert_eq!(&all[key], value, "{name}: {key}");
        }
        for system in ["identity", "date", "time"] {
            assert!(all.contains_key(system), "{name}: {system}");
        }
    }
}

#[tokio::test]
async fn merge_yields_one_record_per_identity_with_shared_columns() {
    for (name, backend) in backends().await {
        let store = LogStore::new(backend);
        store
            .append(&fields(&[
                ("source", "svc1"),
                ("category", "ALERT"),
                ("text", "a"),
                ("host", "db1"),
            ]))
            .await
            .unwrap();
        store
            .append(&fields(&[
                ("source", "svc1"),
                ("category", "AUTH"),
                ("text", "b"),
                ("host", "db1"),
            ]))
            .await
            .unwrap();
        store
            .append(&fields(&[("source", "svc1"), ("category", "INFO"), ("text", "c")]))
            .await
            .unwrap();

        let records = store.query(&fields(&[("host", "db1")])).await.unwrap();
        let ids: Vec<i64> = records.iter().map(|r| r.identity()).collect();
        assert_eq!(ids, vec![1, 2], "{name}");

        let records = store.query(&fields(&[("source", "svc1")])).await.unwrap();
        assert_eq!(records.len(), 3, "{name}");
        assert_eq!(records[0].attributes["host"], "db1", "{name}");
        assert!(records[2].attributes.is_empty(), "{name}");
    }
}

#[tokio::test]
async fn unknown_and_empty_predicates_are_rejected() {
    for (name, backend) in backends().await {
        let store = LogStore::new(backend);
        append_alert(&store).await;

        let err = store
            .query(&fields(&[("colour", "red")]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownField(ref f) if f == "colour"), "{name}");

        let err = store.query(&fields(&[])).await.unwrap_err();
        assert!(matches!(err, StoreError::EmptyPredicate), "{name}");
    }
}

#[tokio::test]
async fn field_names_are_case_insensitive() {
    for (name, backend) in backends().await {
        let store = LogStore::new(backend);
        store
            .append(&fields(&[
                ("Source", "svc1"),
                ("CATEGORY", "ALERT"),
                ("text", "x"),
                ("Severity", "high"),
            ]))
            .await
            .unwrap();
        let records = store.query(&fields(&[("SEVERITY", "high")])).await.unwrap();
        assert_eq!(records.len(), 1, "{name}");
        assert_eq!(records[0].attributes["severity"], "high", "{name}");
    }
}

#[tokio::test]
async fn caller_supplied_identity_is_ignored() {
    for (name, backend) in backends().await {
        let store = LogStore::new(backend);
        let record = store
            .append(&fields(&[
                ("source", "svc1"),
                ("category", "INFO"),
                ("text", "x"),
                ("identity", "500"),
            ]))
            .await
            .unwrap();
        assert_eq!(record.identity(), 1, "{name}");
        assert!(matches!(
            store.get_by_id(500).await,
            Err(StoreError::NotFound(500))
        ));
    }
}

#[tokio::test]
async fn list_all_returns_core_fields_in_identity_order() {
    for (name, backend) in backends().await {
        let store = LogStore::new(backend);
        append_alert(&store).await;
        store
            .append(&fields(&[("source", "svc2"), ("category", "INFO"), ("text", "y")]))
            .await
            .unwrap();

        let rows = store.list_all().await.unwrap();
        let summary: Vec<(i64, &str)> = rows
            .iter()
            .map(|r| (r.identity, r.category.as_str()))
            .collect();
        assert_eq!(summary, vec![(1, "ALERT"), (2, "INFO")], "{name}");
    }
}

#[tokio::test]
async fn category_case_variants_map_to_one_relation() {
    for (name, backend) in backends().await {
        let store = LogStore::new(backend.clone());
        append_alert(&store).await;
        let lower = store
            .append(&fields(&[
                ("source", "svc2"),
                ("category", "alert"),
                ("text", "cpu hot"),
                ("severity", "high"),
            ]))
            .await
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        assert_eq!(lower.identity(), 2, "{name}");

        let mut session = backend.open().await.unwrap();
        let rows = session.scan("ALERT", &Predicate::all()).await.unwrap();
        assert_eq!(rows.len(), 2, "{name}");
        drop(session);

        let err = store
            .append(&fields(&[
                ("source", "svc3"),
                ("category", "Alert"),
                ("text", "x"),
                ("host", "db1"),
            ]))
            .await
            .unwrap_err();
        assert!(
            matches!(err, StoreError::SchemaMismatch { .. }),
            "{name}: {err:?}"
        );

        let records = store.query(&fields(&[("severity", "high")])).await.unwrap();
        let categories: Vec<&str> = records
            .iter()
            .filter(|r| r.identity() <= 2)
            .map(|r| r.core.category.as_str())
            .collect();
        assert_eq!(categories, vec!["ALERT", "alert"], "{name}");
    }
}
