//! ログストアの型定義

use chrono::{DateTime, NaiveDate, NaiveTime, SubsecRound, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use crate::common::error::{StoreError, StoreResult};
use crate::db::{Row, Value};

/// コアリレーション名
pub const CORE_RELATION: &str = "LOGS";

/// identityフィールド
pub const IDENTITY: &str = "identity";
/// dateフィールド
pub const DATE: &str = "date";
/// timeフィールド
pub const TIME: &str = "time";
/// sourceフィールド
pub const SOURCE: &str = "source";
/// categoryフィールド
pub const CATEGORY: &str = "category";
/// textフィールド
pub const TEXT: &str = "text";

/// 全レコード共通のコアフィールド
pub const CORE_FIELDS: [&str; 6] = [IDENTITY, DATE, TIME, SOURCE, CATEGORY, TEXT];

/// 呼び出し側が必ず指定するフィールド
pub const REQUIRED_FIELDS: [&str; 3] = [SOURCE, CATEGORY, TEXT];

/// システムが付与するフィールド
pub const SYSTEM_FIELDS: [&str; 3] = [IDENTITY, DATE, TIME];

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.6f";

/// フィールド名 → 値
pub type FieldMap = BTreeMap<String, String>;

/// コアフィールドかどうか（大文字小文字を区別しない）
pub fn is_core_field(name: &str) -> bool {
    CORE_FIELDS.iter().any(|f| f.eq_ignore_ascii_case(name))
}

/// フィールド名をカラム名に変換
pub fn column_name(field: &str) -> String {
    field.to_ascii_uppercase()
}

/// カラム名をフィールド名に変換
pub fn field_name(column: &str) -> String {
    column.to_ascii_lowercase()
}

/// カテゴリ値から格納先リレーション名を決める
///
/// SQLiteの識別子はASCIIの大文字小文字を区別しないため、カテゴリも区別しない。
pub fn relation_name(category: &str) -> String {
    category.to_ascii_uppercase()
}

/// 書き込み時にシステムが付与する値
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    /// 採番済みidentity
    pub identity: i64,
    /// UTC日付
    pub date: NaiveDate,
    /// UTC時刻（マイクロ秒精度）
    pub time: NaiveTime,
}

impl Stamp {
    /// 指定時刻からスタンプを作成
    ///
    /// 日付と時刻は別々の値として保持する（タイムゾーンの解釈揺れを避けるため）。
    pub fn at(identity: i64, now: DateTime<Utc>) -> Self {
        let now = now.trunc_subsecs(6);
        Self {
            identity,
            date: now.date_naive(),
            time: now.time(),
        }
    }
}

/// コアリレーションの行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoreRow {
    /// identity
    pub identity: i64,
    /// 日付（UTC）
    #[serde(serialize_with = "serialize_date")]
    pub date: NaiveDate,
    /// 時刻（UTC）
    #[serde(serialize_with = "serialize_time")]
    pub time: NaiveTime,
    /// イベント発生元
    pub source: String,
    /// カテゴリ（カテゴリリレーション名）
    pub category: String,
    /// ログ本文
    pub text: String,
}

impl CoreRow {
    /// リレーション行に変換
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert(column_name(IDENTITY), Value::Integer(self.identity));
        row.insert(
            column_name(DATE),
            Value::Text(self.date.format(DATE_FORMAT).to_string()),
        );
        row.insert(
            column_name(TIME),
            Value::Text(self.time.format(TIME_FORMAT).to_string()),
        );
        row.insert(column_name(SOURCE), Value::Text(self.source.clone()));
        row.insert(column_name(CATEGORY), Value::Text(self.category.clone()));
        row.insert(column_name(TEXT), Value::Text(self.text.clone()));
        row
    }

    /// リレーション行から復元
    pub fn from_row(row: &Row) -> StoreResult<Self> {
        let identity = row
            .get(&column_name(IDENTITY))
            .and_then(Value::as_i64)
            .ok_or_else(|| StoreError::Database("Stored log row has no identity".to_string()))?;
        let date = NaiveDate::parse_from_str(&text_cell(row, DATE, identity)?, DATE_FORMAT)
            .map_err(|e| StoreError::Database(format!("Failed to parse date: {}", e)))?;
        let time = text_cell(row, TIME, identity)?
            .parse::<NaiveTime>()
            .map_err(|e| StoreError::Database(format!("Failed to parse time: {}", e)))?;

        Ok(Self {
            identity,
            date,
            time,
            source: text_cell(row, SOURCE, identity)?,
            category: text_cell(row, CATEGORY, identity)?,
            text: text_cell(row, TEXT, identity)?,
        })
    }

    /// フィールドマップに変換
    pub fn fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert(IDENTITY.to_string(), self.identity.to_string());
        fields.insert(DATE.to_string(), self.date.format(DATE_FORMAT).to_string());
        fields.insert(TIME.to_string(), self.time.format(TIME_FORMAT).to_string());
        fields.insert(SOURCE.to_string(), self.source.clone());
        fields.insert(CATEGORY.to_string(), self.category.clone());
        fields.insert(TEXT.to_string(), self.text.clone());
        fields
    }
}

// 保存・照合に使う文字列と同じ形式で出力する
fn serialize_date<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&date.format(DATE_FORMAT))
}

fn serialize_time<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&time.format(TIME_FORMAT))
}

fn text_cell(row: &Row, field: &str, identity: i64) -> StoreResult<String> {
    match row.get(&column_name(field)) {
        Some(Value::Null) | None => Err(StoreError::Database(format!(
            "Stored log {} has no {}",
            identity, field
        ))),
        Some(value) => Ok(value.to_string()),
    }
}

/// カテゴリリレーションの行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRow {
    /// コア行と同じidentity
    pub identity: i64,
    /// カテゴリ値（呼び出し側の指定どおり）
    pub category: String,
    /// カテゴリ固有の属性（フィールド名は小文字）
    pub attributes: FieldMap,
}

impl CategoryRow {
    /// 格納先リレーション名
    pub fn relation(&self) -> String {
        relation_name(&self.category)
    }

    /// リレーション行に変換
    pub fn to_row(&self) -> Row {
        let mut row: Row = self
            .attributes
            .iter()
            .map(|(k, v)| (column_name(k), Value::Text(v.clone())))
            .collect();
        row.insert(column_name(IDENTITY), Value::Integer(self.identity));
        row
    }
}

/// コアフィールドとカテゴリ属性を再結合した論理レコード
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogicalRecord {
    /// コアフィールド
    #[serde(flatten)]
    pub core: CoreRow,
    /// カテゴリ属性
    #[serde(flatten)]
    pub attributes: FieldMap,
}

impl LogicalRecord {
    /// 分割済みの行から組み立てる
    pub fn from_parts(core: CoreRow, category: Option<CategoryRow>) -> Self {
        Self {
            core,
            attributes: category.map(|c| c.attributes).unwrap_or_default(),
        }
    }

    /// マージ済みの行から組み立てる
    ///
    /// コアカラム以外の非NULLカラムがカテゴリ属性になる。
    pub fn from_merged_row(row: &Row) -> StoreResult<Self> {
        let core = CoreRow::from_row(row)?;
        let attributes = row
            .iter()
            .filter(|(column, value)| !is_core_field(column) && !value.is_null())
            .map(|(column, value)| (field_name(column), value.to_string()))
            .collect();
        Ok(Self { core, attributes })
    }

    /// identity
    pub fn identity(&self) -> i64 {
        self.core.identity
    }

    /// 全フィールドを1つのマップにまとめる
    pub fn fields(&self) -> FieldMap {
        let mut fields = self.core.fields();
        fields.extend(self.attributes.clone());
        fields
    }
}
