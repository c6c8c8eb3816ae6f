//! 通知工作者服务
//!
//! 消费 Kafka 中的订单、用户和博客领域事件，将每个事件转换为
//! 面向用户的通知：先持久化一条通知记录，再按请求的渠道列表
//! 逐个投递（邮件、推送、站内信）。各渠道独立发送，单个渠道
//! 失败不影响其他渠道的投递。

pub mod consumer;
pub mod error;
pub mod events;
pub mod models;
pub mod repository;
pub mod sender;
pub mod service;
pub mod templates;
