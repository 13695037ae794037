//! # PACS Core
//!
//! 影像分诊系统的核心模块，提供基础数据结构、错误定义和存储接口。

pub mod error;
pub mod models;
pub mod store;

pub use error::{PacsError, Result};
pub use models::*;
pub use store::{InMemoryStudyStore, StudyStore};
