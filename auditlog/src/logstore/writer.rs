//! 書き込みパス
//!
//! 採番 → 分割 → コア行の追記 → カテゴリ行の追記（初回はリレーション作成）の順に実行する。
//! 途中で失敗してもロールバックしない（コア行だけが残ることがある）。

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::identity::next_identity;
use super::splitter::{ignored_system_fields, split};
use super::types::{FieldMap, LogicalRecord, Stamp, CORE_RELATION};
use crate::common::error::StoreResult;
use crate::db::RelationalSession;

/// 1レコードを書き込み、再結合した論理レコードを返す
pub async fn write_record(
    session: &mut dyn RelationalSession,
    fields: &FieldMap,
    now: DateTime<Utc>,
) -> StoreResult<LogicalRecord> {
    let ignored = ignored_system_fields(fields);
    if !ignored.is_empty() {
        warn!(
            "Ignoring caller-supplied system fields: {}",
            ignored.join(", ")
        );
    }

    let identity = next_identity(session).await?;
    let (core, category) = split(fields, &Stamp::at(identity, now))?;

    session
        .create_or_append(CORE_RELATION, &[core.to_row()])
        .await?;

    if let Some(ref category_row) = category {
        let relation = category_row.relation();
        let created = !session.relation_exists(&relation).await?;
        session
            .create_or_append(&relation, &[category_row.to_row()])
            .await?;
        if created {
            info!(
                "Created category relation {} with {} attribute column(s)",
                relation,
                category_row.attributes.len()
            );
        }
    }

    info!(
        identity = core.identity,
        category = %core.category,
        "Appended log record"
    );
    Ok(LogicalRecord::from_parts(core, category))
}
