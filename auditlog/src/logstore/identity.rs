//! identity採番
//!
//! コアリレーションの現在の最大identity + 1 を返す。
//! 予約やロックは行わないため、並行する書き込み同士で同じ値を得ることがある
//! （直列化は`LogStore`の書き込みロックで行う）。

use super::types::{column_name, CORE_RELATION, IDENTITY};
use crate::common::error::{StoreError, StoreResult};
use crate::db::{RelationalSession, Value};

/// 次のidentityを計算する（コアリレーションが空・未作成なら1）
pub async fn next_identity(session: &mut dyn RelationalSession) -> StoreResult<i64> {
    let max = session
        .max_of(CORE_RELATION, &column_name(IDENTITY))
        .await?;
    match max {
        None => Ok(1),
        Some(Value::Integer(n)) => n
            .checked_add(1)
            .ok_or_else(|| StoreError::Database("identity overflow".to_string())),
        Some(other) => Err(StoreError::Database(format!(
            "Non-integer identity in {}: {}",
            CORE_RELATION, other
        ))),
    }
}
