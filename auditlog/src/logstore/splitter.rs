//! スキーマ分割
//!
//! 1レコード分のフィールドをコア行とカテゴリ行に振り分ける。
//! I/Oを伴わない純粋関数のみを置く。

use super::types::{
    is_core_field, CategoryRow, CoreRow, FieldMap, Stamp, CATEGORY, CORE_RELATION,
    REQUIRED_FIELDS, SOURCE, SYSTEM_FIELDS, TEXT,
};
use crate::common::error::{StoreError, StoreResult};

/// フィールド名を小文字に正規化する
///
/// 大文字小文字違いで同名になるキーがあれば`DuplicateField`。
pub fn normalize_fields(fields: &FieldMap) -> StoreResult<FieldMap> {
    let mut normalized = FieldMap::new();
    for (key, value) in fields {
        let name = key.to_ascii_lowercase();
        if normalized.insert(name.clone(), value.clone()).is_some() {
            return Err(StoreError::DuplicateField(name));
        }
    }
    Ok(normalized)
}

/// 必須フィールドとカテゴリ値を検証する（正規化済みの入力を前提）
pub fn validate(fields: &FieldMap) -> StoreResult<()> {
    for field in REQUIRED_FIELDS {
        if !fields.contains_key(field) {
            return Err(StoreError::MissingRequiredField(field.to_string()));
        }
    }
    let category = &fields[CATEGORY];
    if category.trim().is_empty() || category.eq_ignore_ascii_case(CORE_RELATION) {
        return Err(StoreError::InvalidCategory(category.clone()));
    }
    Ok(())
}

/// 呼び出し側が指定したシステム付与フィールド（無視される）
pub fn ignored_system_fields(fields: &FieldMap) -> Vec<&str> {
    SYSTEM_FIELDS
        .iter()
        .copied()
        .filter(|f| fields.keys().any(|k| k.eq_ignore_ascii_case(f)))
        .collect()
}

/// フィールドをコア行と（あれば）カテゴリ行に分割する
///
/// identity・date・timeは`stamp`の値が使われ、入力側の値は無視される。
/// コアフィールド以外が1つも無ければカテゴリ行は作らない。
pub fn split(fields: &FieldMap, stamp: &Stamp) -> StoreResult<(CoreRow, Option<CategoryRow>)> {
    let fields = normalize_fields(fields)?;
    validate(&fields)?;

    let core = CoreRow {
        identity: stamp.identity,
        date: stamp.date,
        time: stamp.time,
        source: fields[SOURCE].clone(),
        category: fields[CATEGORY].clone(),
        text: fields[TEXT].clone(),
    };

    let attributes: FieldMap = fields
        .into_iter()
        .filter(|(name, _)| !is_core_field(name))
        .collect();
    let category = if attributes.is_empty() {
        None
    } else {
        Some(CategoryRow {
            identity: stamp.identity,
            category: core.category.clone(),
            attributes,
        })
    };

    Ok((core, category))
}
