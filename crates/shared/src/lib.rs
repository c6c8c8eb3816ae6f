//! 共享库
//!
//! 包含通知系统各组件共用的配置、错误处理、数据库连接和 Kafka 基础设施代码。

pub mod config;
pub mod database;
pub mod error;
pub mod kafka;
pub mod observability;
