//! # PACS Web模块
//!
//! 分诊服务的HTTP接口：检查列表、检查详情（含相似病例）与分诊。

pub mod error;
pub mod handlers;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{create_app, WebServer};
