//! SQLiteベースのリレーショナルストア
//!
//! カテゴリ名がそのままテーブル名になるため、識別子はすべてダブルクォートで囲む。

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, Sqlite, SqlitePool, TypeInfo, ValueRef};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

use super::row::{columns_of, Condition, Predicate, Row, Value};
use super::traits::{RelationalSession, RelationalStore};
use crate::common::error::{StoreError, StoreResult};

/// IN句1回あたりのバインド数上限
const IN_CHUNK_SIZE: usize = 500;

/// SQLiteストア
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// 既存プールから作成
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// データベースURLに接続（ファイルが無ければ作成）
    ///
    /// `sqlite::memory:` は接続ごとに別DBになるため、接続数を1に固定する。
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        ensure_parent_dir(database_url)?;

        let is_memory = database_url.contains(":memory:");
        let connect_options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::Config(format!("Invalid database URL: {}", e)))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let pool_options = if is_memory {
            // 接続が閉じるとDBごと消えるため、唯一の接続を保持し続ける
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };
        let pool = pool_options.connect_with(connect_options).await?;

        if !is_memory {
            // WALモード設定
            sqlx::query("PRAGMA journal_mode=WAL")
                .execute(&pool)
                .await?;
        }

        tracing::info!("Connected to log database: {}", database_url);
        Ok(Self { pool })
    }

    /// 接続プール
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RelationalStore for SqliteStore {
    async fn open(&self) -> StoreResult<Box<dyn RelationalSession>> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(SqliteSession { conn }))
    }
}

/// SQLiteセッション（dropでプールへ接続を返却）
pub struct SqliteSession {
    conn: PoolConnection<Sqlite>,
}

impl SqliteSession {
    /// テーブル作成・カラム照合・挿入（呼び出し側がトランザクションを管理する）
    async fn append_in_transaction(&mut self, relation: &str, rows: &[Row]) -> StoreResult<()> {
        let found = columns_of(rows);

        let column_defs: Vec<String> = found
            .iter()
            .map(|column| format!("{} {}", quote_ident(column), column_type(rows, column)))
            .collect();
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(relation),
            column_defs.join(", ")
        ))
        .execute(&mut *self.conn)
        .await?;

        let mut expected = self.table_columns(relation).await?;
        expected.sort();
        if expected != found {
            return Err(StoreError::SchemaMismatch {
                relation: relation.to_string(),
                expected,
                found,
            });
        }

        let placeholders = vec!["?"; found.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(relation),
            found
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
            placeholders
        );
        for row in rows {
            let mut query = sqlx::query(&sql);
            for column in &found {
                query = match row.get(column).unwrap_or(&Value::Null) {
                    Value::Null => query.bind(None::<String>),
                    Value::Integer(n) => query.bind(*n),
                    Value::Text(s) => query.bind(s.clone()),
                };
            }
            query.execute(&mut *self.conn).await?;
        }
        Ok(())
    }

    async fn table_columns(&mut self, relation: &str) -> StoreResult<Vec<String>> {
        let columns = sqlx::query_scalar::<_, String>(
            "SELECT name FROM pragma_table_info(?) ORDER BY cid",
        )
        .bind(relation)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(columns)
    }
}

#[async_trait]
impl RelationalSession for SqliteSession {
    async fn create_or_append(&mut self, relation: &str, rows: &[Row]) -> StoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        // 書き込みロックを先に取り、並行する作成・追記はbusy_timeoutまで待たせる
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *self.conn)
            .await?;
        match self.append_in_transaction(relation, rows).await {
            Ok(()) => {
                sqlx::query("COMMIT").execute(&mut *self.conn).await?;
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = sqlx::query("ROLLBACK").execute(&mut *self.conn).await {
                    tracing::warn!(
                        relation = relation,
                        error = %rollback_err,
                        "Failed to roll back append"
                    );
                }
                Err(err)
            }
        }
    }

    async fn scan(&mut self, relation: &str, predicate: &Predicate) -> StoreResult<Vec<Row>> {
        if !self.relation_exists(relation).await? {
            return Ok(Vec::new());
        }

        // IN句が大きい場合は分割して実行し、結果を連結する
        let chunked = split_in_conditions(predicate);
        let mut rows = Vec::new();
        for conditions in chunked {
            let (where_clause, binds) = build_where_clause(&conditions);
            // 空のIN句はどの行にもマッチしない
            let Some(where_clause) = where_clause else {
                continue;
            };
            let sql = format!("SELECT * FROM {} {}", quote_ident(relation), where_clause);
            let mut query = sqlx::query(&sql);
            for value in binds {
                query = match value {
                    Value::Null => query.bind(None::<String>),
                    Value::Integer(n) => query.bind(n),
                    Value::Text(s) => query.bind(s),
                };
            }
            let fetched = query.fetch_all(&mut *self.conn).await?;
            for sqlite_row in &fetched {
                rows.push(decode_row(sqlite_row)?);
            }
        }
        Ok(rows)
    }

    async fn relation_exists(&mut self, relation: &str) -> StoreResult<bool> {
        let found = sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ? COLLATE NOCASE",
        )
        .bind(relation)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(found.is_some())
    }

    async fn list_relations(&mut self) -> StoreResult<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(names)
    }

    async fn list_columns(&mut self, relation: Option<&str>) -> StoreResult<BTreeSet<String>> {
        match relation {
            Some(name) => Ok(self.table_columns(name).await?.into_iter().collect()),
            None => {
                let columns = sqlx::query_scalar::<_, String>(
                    "SELECT DISTINCT p.name FROM sqlite_master m \
                     JOIN pragma_table_info(m.name) p \
                     WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%'",
                )
                .fetch_all(&mut *self.conn)
                .await?;
                Ok(columns.into_iter().collect())
            }
        }
    }

    async fn max_of(&mut self, relation: &str, column: &str) -> StoreResult<Option<Value>> {
        if !self.relation_exists(relation).await? {
            return Ok(None);
        }
        let sql = format!(
            "SELECT MAX({}) AS max_value FROM {}",
            quote_ident(column),
            quote_ident(relation)
        );
        let row = sqlx::query(&sql).fetch_one(&mut *self.conn).await?;
        let value = decode_value(&row, 0)?;
        Ok(if value.is_null() { None } else { Some(value) })
    }
}

/// SQL識別子をクォート
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_type(rows: &[Row], column: &str) -> &'static str {
    let first = rows
        .iter()
        .filter_map(|row| row.get(column))
        .find(|v| !v.is_null());
    match first {
        Some(Value::Integer(_)) => "INTEGER",
        _ => "TEXT",
    }
}

/// IN句をチャンクに分割した条件リストの集合を作る
///
/// IN句は最大1つまで分割対象とし、2つ目以降はそのまま残す。
fn split_in_conditions(predicate: &Predicate) -> Vec<Vec<Condition>> {
    let conditions = predicate.conditions();
    let split_at = conditions
        .iter()
        .position(|c| matches!(c, Condition::In(_, values) if values.len() > IN_CHUNK_SIZE));
    let Some(index) = split_at else {
        return vec![conditions.to_vec()];
    };
    let Condition::In(column, values) = &conditions[index] else {
        return vec![conditions.to_vec()];
    };
    values
        .chunks(IN_CHUNK_SIZE)
        .map(|chunk| {
            let mut chunked = conditions.to_vec();
            chunked[index] = Condition::In(column.clone(), chunk.to_vec());
            chunked
        })
        .collect()
}

/// 条件リストからWHERE句とバインド値を作成
///
/// 空のIN句を含む場合は`None`（一致なし）を返す。
fn build_where_clause(conditions: &[Condition]) -> (Option<String>, Vec<Value>) {
    if conditions.is_empty() {
        return (Some(String::new()), Vec::new());
    }
    let mut clauses = Vec::with_capacity(conditions.len());
    let mut binds = Vec::new();
    for condition in conditions {
        match condition {
            Condition::Eq(column, Value::Null) => {
                // NULLは完全一致しない
                clauses.push(format!("{} = NULL", quote_ident(column)));
            }
            Condition::Eq(column, value) => {
                clauses.push(format!("{} = ?", quote_ident(column)));
                binds.push(value.clone());
            }
            Condition::In(_, values) if values.is_empty() => return (None, Vec::new()),
            Condition::In(column, values) => {
                clauses.push(format!(
                    "{} IN ({})",
                    quote_ident(column),
                    vec!["?"; values.len()].join(", ")
                ));
                binds.extend(values.iter().cloned());
            }
        }
    }
    (Some(format!("WHERE {}", clauses.join(" AND "))), binds)
}

fn decode_row(sqlite_row: &SqliteRow) -> StoreResult<Row> {
    let mut row = Row::new();
    for (index, column) in sqlite_row.columns().iter().enumerate() {
        row.insert(column.name().to_string(), decode_value(sqlite_row, index)?);
    }
    Ok(row)
}

fn decode_value(sqlite_row: &SqliteRow, index: usize) -> StoreResult<Value> {
    let raw = sqlite_row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_string();
    let value = match type_name.as_str() {
        "INTEGER" => Value::Integer(sqlite_row.try_get::<i64, _>(index)?),
        "REAL" => Value::Text(sqlite_row.try_get::<f64, _>(index)?.to_string()),
        "BLOB" => {
            let bytes = sqlite_row.try_get::<Vec<u8>, _>(index)?;
            Value::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => Value::Text(sqlite_row.try_get::<String, _>(index)?),
    };
    Ok(value)
}

fn ensure_parent_dir(database_url: &str) -> StoreResult<()> {
    // SQLiteファイルはディレクトリが存在しないと作成できないため、先に作成しておく
    let Some(path) = database_url.strip_prefix("sqlite:") else {
        return Ok(());
    };
    // `sqlite::memory:` のような特殊指定はスキップ
    if path.starts_with(':') {
        return Ok(());
    }
    let normalized = path.trim_start_matches("//");
    let path_without_params = normalized.split('?').next().unwrap_or(normalized);
    if let Some(parent) = std::path::Path::new(path_without_params).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Config(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }
    Ok(())
}
