//! identity単位の行マージ（first non-null wins）
//!
//! 複数のリレーションから取得した部分的な行を、identityごとに1行へ畳み込む。
//! 既に値があるカラムは後から来た行で上書きしない。欠損値は値として扱わない。

use std::collections::{BTreeMap, BTreeSet};

use super::types::{column_name, IDENTITY};
use crate::common::error::{StoreError, StoreResult};
use crate::db::{Row, Value};

/// identityをキーにしたマージ済み行の集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeFrame {
    rows: BTreeMap<i64, Row>,
}

impl MergeFrame {
    /// 空のフレーム
    pub fn new() -> Self {
        Self::default()
    }

    /// 行集合を畳み込んでフレームを作る（同一identityの行は1行になる）
    pub fn from_rows(rows: &[Row]) -> StoreResult<Self> {
        let mut frame = Self::new();
        for row in rows {
            frame.merge(row)?;
        }
        Ok(frame)
    }

    /// 行をマージする（未知のidentityなら追加）
    pub fn merge(&mut self, row: &Row) -> StoreResult<i64> {
        let identity = identity_of(row)?;
        let target = self.rows.entry(identity).or_default();
        reconcile(target, row);
        Ok(identity)
    }

    /// 既存identityにのみ行をマージする（left merge）
    ///
    /// マージした場合はそのidentityを返す。
    pub fn merge_existing(&mut self, row: &Row) -> StoreResult<Option<i64>> {
        let identity = identity_of(row)?;
        match self.rows.get_mut(&identity) {
            Some(target) => {
                reconcile(target, row);
                Ok(Some(identity))
            }
            None => Ok(None),
        }
    }

    /// 含まれるidentity
    pub fn identities(&self) -> BTreeSet<i64> {
        self.rows.keys().copied().collect()
    }

    /// 指定identityのみ残す
    pub fn retain(&mut self, keep: &BTreeSet<i64>) {
        self.rows.retain(|identity, _| keep.contains(identity));
    }

    /// 指定カラムの非NULL値（重複なし、ソート済み）
    pub fn distinct_text(&self, column: &str) -> Vec<String> {
        let values: BTreeSet<String> = self
            .rows
            .values()
            .filter_map(|row| row.get(column))
            .filter(|v| !v.is_null())
            .map(Value::to_string)
            .collect();
        values.into_iter().collect()
    }

    /// identityを取得
    pub fn get(&self, identity: i64) -> Option<&Row> {
        self.rows.get(&identity)
    }

    /// 行数
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 空かどうか
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// identity昇順の行
    pub fn into_rows(self) -> Vec<Row> {
        self.rows.into_values().collect()
    }
}

/// `incoming`の非NULL値のうち、`target`に値が無いカラムだけを取り込む
pub fn reconcile(target: &mut Row, incoming: &Row) {
    for (column, value) in incoming {
        if value.is_null() {
            continue;
        }
        match target.get_mut(column) {
            Some(current) if current.is_null() => *current = value.clone(),
            Some(_) => {}
            None => {
                target.insert(column.clone(), value.clone());
            }
        }
    }
}

/// 行のidentity（整数でなければエラー）
pub fn identity_of(row: &Row) -> StoreResult<i64> {
    row.get(&column_name(IDENTITY))
        .and_then(Value::as_i64)
        .ok_or_else(|| StoreError::Database("Row without integer identity".to_string()))
}
