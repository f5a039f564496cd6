//! データベースアクセス層
//!
//! ログストアが利用するリレーショナル操作の抽象と、その実装

/// 行・値・述語
pub mod row;

/// Repository traitパターン（テスタビリティ向上）
pub mod traits;

/// インメモリ実装
pub mod memory;

/// SQLite実装
pub mod sqlite;

pub use memory::MemoryStore;
pub use row::{Condition, Predicate, Row, Value};
pub use sqlite::SqliteStore;
pub use traits::{RelationalSession, RelationalStore};
