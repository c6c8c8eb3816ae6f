//! 领域事件模型
//!
//! 定义各事件族（订单、用户、博客）的消息结构。所有事件共享一个
//! 最小信封 `EventEnvelope`，消费者先解析信封中的 type 判别字段，
//! 再将完整消息体二次解析为具体事件类型。
//!
//! 字段全部带默认值，与上游生产者的宽松 JSON 约定保持一致：
//! 缺失字段取零值，未知字段忽略；只有格式损坏才算解码失败。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 事件信封，仅包含路由用的判别字段
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
}

// ---------------------------------------------------------------------------
// 订单事件
// ---------------------------------------------------------------------------

/// 订单创建事件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderCreatedEvent {
    pub order_id: String,
    pub user_id: String,
    pub total_amount: f64,
    pub item_count: i64,
    pub payment_method: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// 订单状态变更事件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderStatusChangedEvent {
    pub order_id: String,
    pub user_id: String,
    pub status: String,
    pub total_amount: f64,
    pub item_count: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

/// 订单发货事件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderShippedEvent {
    pub order_id: String,
    pub user_id: String,
    pub tracking_number: String,
    pub courier: String,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// 用户事件
// ---------------------------------------------------------------------------

/// 用户注册事件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserRegisteredEvent {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub registered_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// 博客事件
// ---------------------------------------------------------------------------

/// 博客发布事件，用于通知作者的关注者
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogPublishedEvent {
    pub blog_id: String,
    pub author_id: String,
    pub author_name: String,
    pub title: String,
    pub excerpt: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// 评论新增事件，用于通知博客作者
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentAddedEvent {
    pub comment_id: String,
    pub blog_id: String,
    pub blog_title: String,
    pub commenter_id: String,
    pub commenter_name: String,
    pub comment: String,
    pub blog_owner_id: String,
    pub created_at: Option<DateTime<Utc>>,
}
