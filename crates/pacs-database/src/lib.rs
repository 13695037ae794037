//! # PACS数据库模块
//!
//! 影像检查与分诊结论的PostgreSQL存储，实现 `pacs_core::StudyStore`。

pub mod connection;
pub mod models;
pub mod queries;

// 重新导出主要类型
pub use connection::{DatabaseConfig, DatabasePool};
pub use models::*;
pub use queries::DatabaseQueries;
