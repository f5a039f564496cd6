//! クエリプランナー / マージエンジン
//!
//! 述語をコア条件とカテゴリ条件に分け、2段階で論理レコードを再構成する。
//!
//! - Phase A: コアリレーションを絞り込み、結果に現れたカテゴリのリレーションから
//!   候補identityの行を取得して left merge する。
//! - Phase B: カテゴリ条件がある場合のみ。各カテゴリリレーションに存在するカラムの
//!   条件だけで絞り込み、一致したidentityを蓄積してから最後にコア側の候補と積を取る。

use std::collections::BTreeSet;
use tracing::debug;

use super::merge::{identity_of, MergeFrame};
use super::types::{
    column_name, is_core_field, relation_name, CoreRow, FieldMap, LogicalRecord, CATEGORY,
    CORE_RELATION, IDENTITY,
};
use crate::common::error::{StoreError, StoreResult};
use crate::db::{Condition, Predicate, RelationalSession, Value};

/// 単一フィールドの完全一致条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCondition {
    /// 呼び出し側が指定したフィールド名
    pub field: String,
    /// 照合用のカラム名（大文字）
    pub column: String,
    /// 比較値
    pub value: String,
}

impl FieldCondition {
    fn to_condition(&self) -> Condition {
        // identityは整数カラム。整数として解釈できない値はどの行にも一致しない
        let value = if self.column == column_name(IDENTITY) {
            match self.value.trim().parse::<i64>() {
                Ok(n) => Value::Integer(n),
                Err(_) => Value::Text(self.value.clone()),
            }
        } else {
            Value::Text(self.value.clone())
        };
        Condition::Eq(self.column.clone(), value)
    }
}

/// コア条件とカテゴリ条件に分割済みのクエリ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    /// コアフィールドに対する条件
    pub core_conditions: Vec<FieldCondition>,
    /// それ以外のフィールドに対する条件
    pub category_conditions: Vec<FieldCondition>,
}

impl QueryPlan {
    /// 述語を分割する
    ///
    /// 条件が1つも無ければ`EmptyPredicate`。
    pub fn new(predicate: &FieldMap) -> StoreResult<Self> {
        let mut core_conditions = Vec::new();
        let mut category_conditions: Vec<FieldCondition> = Vec::new();
        let mut seen = BTreeSet::new();

        for (field, value) in predicate {
            let column = column_name(field);
            if !seen.insert(column.clone()) {
                return Err(StoreError::DuplicateField(field.to_ascii_lowercase()));
            }
            let condition = FieldCondition {
                field: field.clone(),
                column,
                value: value.clone(),
            };
            if is_core_field(field) {
                core_conditions.push(condition);
            } else {
                category_conditions.push(condition);
            }
        }

        if core_conditions.is_empty() && category_conditions.is_empty() {
            return Err(StoreError::EmptyPredicate);
        }

        Ok(Self {
            core_conditions,
            category_conditions,
        })
    }

    /// コアリレーション用の述語
    pub fn core_predicate(&self) -> Predicate {
        Predicate::new(
            self.core_conditions
                .iter()
                .map(FieldCondition::to_condition)
                .collect(),
        )
    }

    /// 指定カラム集合に存在するカテゴリ条件だけの述語
    pub fn category_predicate(&self, columns: &BTreeSet<String>) -> Predicate {
        Predicate::new(
            self.category_conditions
                .iter()
                .filter(|c| columns.contains(&c.column))
                .map(FieldCondition::to_condition)
                .collect(),
        )
    }
}

/// 述語のフィールドがストア内のいずれかのカラムに存在するか検証する
///
/// コアフィールドはコアリレーションが未作成でも既知として扱う。
pub async fn validate_fields(
    session: &mut dyn RelationalSession,
    plan: &QueryPlan,
) -> StoreResult<()> {
    if plan.category_conditions.is_empty() {
        return Ok(());
    }
    let known = session.list_columns(None).await?;
    for condition in &plan.category_conditions {
        if !known.contains(&condition.column) {
            return Err(StoreError::UnknownField(condition.field.clone()));
        }
    }
    Ok(())
}

/// 述語に一致する論理レコードを取得する
pub async fn run_query(
    session: &mut dyn RelationalSession,
    predicate: &FieldMap,
) -> StoreResult<Vec<LogicalRecord>> {
    let plan = QueryPlan::new(predicate)?;
    validate_fields(session, &plan).await?;
    let frame = execute(session, &plan).await?;
    frame
        .into_rows()
        .iter()
        .map(LogicalRecord::from_merged_row)
        .collect()
}

/// 検証済みのプランを実行し、マージ済みフレームを返す
pub async fn execute(
    session: &mut dyn RelationalSession,
    plan: &QueryPlan,
) -> StoreResult<MergeFrame> {
    if !session.relation_exists(CORE_RELATION).await? {
        return Ok(MergeFrame::new());
    }

    // Phase A: コア条件で絞り込み、カテゴリ属性を left merge
    let core_rows = session.scan(CORE_RELATION, &plan.core_predicate()).await?;
    let mut frame = MergeFrame::from_rows(&core_rows)?;
    let categories = category_relations(session, &frame).await?;
    debug!(
        "Phase A: {} core row(s), {} identities, categories={:?}",
        core_rows.len(),
        frame.len(),
        categories
    );

    if !frame.is_empty() {
        let candidates: Vec<Value> = frame.identities().into_iter().map(Value::Integer).collect();
        let by_identity = Predicate::all().in_list(column_name(IDENTITY), candidates);
        for relation in &categories {
            let rows = session.scan(relation, &by_identity).await?;
            for row in &rows {
                frame.merge_existing(row)?;
            }
        }
    }

    if plan.category_conditions.is_empty() {
        return Ok(frame);
    }

    // Phase B: カテゴリ条件で絞り込み
    let core_selected = frame.identities();
    let mut category_selected = BTreeSet::new();
    for relation in &categories {
        let columns = session.list_columns(Some(relation)).await?;
        let predicate = plan.category_predicate(&columns);
        if predicate.is_empty() {
            continue;
        }
        let rows = session.scan(relation, &predicate).await?;
        for row in &rows {
            category_selected.insert(identity_of(row)?);
            frame.merge_existing(row)?;
        }
    }

    let selected: BTreeSet<i64> = category_selected
        .intersection(&core_selected)
        .copied()
        .collect();
    debug!(
        "Phase B: {} of {} identities matched category conditions",
        selected.len(),
        core_selected.len()
    );
    frame.retain(&selected);
    Ok(frame)
}

/// フレームに現れるカテゴリのリレーションのうち、存在するもの
///
/// 大文字小文字だけが異なるカテゴリは同じリレーションになる。
async fn category_relations(
    session: &mut dyn RelationalSession,
    frame: &MergeFrame,
) -> StoreResult<Vec<String>> {
    let candidates: BTreeSet<String> = frame
        .distinct_text(&column_name(CATEGORY))
        .iter()
        .map(|category| relation_name(category))
        .filter(|relation| relation != CORE_RELATION)
        .collect();
    let mut relations = Vec::new();
    for relation in candidates {
        if session.relation_exists(&relation).await? {
            relations.push(relation);
        }
    }
    Ok(relations)
}

/// コアリレーションの全行（カテゴリ属性は含まない、identity昇順）
pub async fn scan_core(session: &mut dyn RelationalSession) -> StoreResult<Vec<CoreRow>> {
    let rows = session.scan(CORE_RELATION, &Predicate::all()).await?;
    let mut core_rows = rows
        .iter()
        .map(CoreRow::from_row)
        .collect::<StoreResult<Vec<_>>>()?;
    core_rows.sort_by_key(|row| row.identity);
    Ok(core_rows)
}
