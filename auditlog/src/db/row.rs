//! リレーションの行・値・述語の型定義

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// セル値
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// 欠損値
    Null,
    /// 整数
    Integer(i64),
    /// 文字列
    Text(String),
}

impl Value {
    /// 欠損値かどうか
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// 整数として取得
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// 文字列として取得
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// 1行分のデータ（カラム名 → 値）
///
/// カラム名は大文字で保持する。
pub type Row = BTreeMap<String, Value>;

/// 行の絞り込み条件（単一カラム）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `column = value`
    Eq(String, Value),
    /// `column IN (values)`
    In(String, Vec<Value>),
}

impl Condition {
    /// 対象カラム名
    pub fn column(&self) -> &str {
        match self {
            Self::Eq(column, _) | Self::In(column, _) => column,
        }
    }

    /// 行が条件を満たすか
    ///
    /// 欠損値はどの値とも一致しない。
    pub fn matches(&self, row: &Row) -> bool {
        let Some(cell) = row.get(self.column()).filter(|v| !v.is_null()) else {
            return false;
        };
        match self {
            Self::Eq(_, value) => cell == value,
            Self::In(_, values) => values.contains(cell),
        }
    }
}

/// 完全一致条件のAND
///
/// 条件が空の場合は全行にマッチする。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicate {
    conditions: Vec<Condition>,
}

impl Predicate {
    /// 全行にマッチする述語
    pub fn all() -> Self {
        Self::default()
    }

    /// 条件リストから述語を作成
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    /// `column = value` 条件を追加
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Eq(column.into(), value.into()));
        self
    }

    /// `column IN (values)` 条件を追加
    pub fn in_list(mut self, column: impl Into<String>, values: Vec<Value>) -> Self {
        self.conditions.push(Condition::In(column.into(), values));
        self
    }

    /// 条件一覧
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// 条件が空かどうか
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// 行が全条件を満たすか
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|c| c.matches(row))
    }
}

/// 行集合のカラム名一覧（全行のキーの和集合、ソート済み）
pub fn columns_of(rows: &[Row]) -> Vec<String> {
    let mut columns: Vec<String> = rows
        .iter()
        .flat_map(|row| row.keys().cloned())
        .collect();
    columns.sort();
    columns.dedup();
    columns
}
