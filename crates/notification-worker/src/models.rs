//! 通知领域模型
//!
//! 定义通知记录、投递渠道、生命周期状态和创建请求。
//! 枚举与数据库中的文本表示互转时采用宽松策略：读到未知值
//! 记录告警并跳过，不让单条脏数据拖垮整个查询。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 通知的自由元数据，以 JSON 对象承载各事件的业务字段
pub type Metadata = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Channel — 投递渠道
// ---------------------------------------------------------------------------

/// 投递渠道
///
/// in_app 渠道没有外部调用，通知记录入库即视为送达。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Push,
    InApp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Push => "push",
            Self::InApp => "in_app",
        }
    }

    /// 从文本解析渠道，未知值返回 None
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(Self::Email),
            "push" => Some(Self::Push),
            "in_app" => Some(Self::InApp),
            _ => None,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// NotificationStatus — 生命周期状态
// ---------------------------------------------------------------------------

/// 通知生命周期状态
///
/// 创建时为 Processing；派发结束后，任一渠道发送失败则为 Failed
/// （粘性，后续渠道成功也不会清除），否则为 Sent。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Processing,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(Self::Processing),
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// NotificationKind — 通知大类
// ---------------------------------------------------------------------------

/// 通知大类，对应事件的业务域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Order,
    Account,
    Blog,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::Account => "account",
            Self::Blog => "blog",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "order" => Some(Self::Order),
            "account" => Some(Self::Account),
            "blog" => Some(Self::Blog),
            _ => None,
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Notification — 通知记录
// ---------------------------------------------------------------------------

/// 通知记录
///
/// retry_count、last_error 和 expires_at 当前没有代码路径读写，
/// 保留为数据模型的一部分，等待重试/过期策略定型后启用。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub category: String,
    pub title: String,
    pub message: String,
    pub metadata: Metadata,
    pub channels: Vec<Channel>,
    pub status: NotificationStatus,

    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,

    pub email_sent_at: Option<DateTime<Utc>>,
    pub push_sent_at: Option<DateTime<Utc>>,

    pub retry_count: i32,
    pub last_error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// 根据创建请求构造一条处于 Processing 状态的新通知
    pub fn from_request(req: &CreateNotificationRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id: req.user_id,
            kind: req.kind,
            category: req.category.clone(),
            title: req.title.clone(),
            message: req.message.clone(),
            metadata: req.metadata.clone(),
            channels: req.channels.clone(),
            status: NotificationStatus::Processing,
            is_read: false,
            read_at: None,
            email_sent_at: None,
            push_sent_at: None,
            retry_count: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
            expires_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// CreateNotificationRequest — 创建请求
// ---------------------------------------------------------------------------

/// 通知创建请求，由各事件处理器构造并提交给派发服务
#[derive(Debug, Clone)]
pub struct CreateNotificationRequest {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub category: String,
    pub title: String,
    pub message: String,
    pub channels: Vec<Channel>,
    pub metadata: Metadata,
}

// ---------------------------------------------------------------------------
// NotificationPreference — 用户偏好（声明未用）
// ---------------------------------------------------------------------------

/// 用户通知偏好
///
/// 当前没有任何操作读写此结构，仅作为数据模型表面保留；
/// 接入偏好过滤时派发服务需在渠道循环前检查对应开关。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPreference {
    pub id: Uuid,
    pub user_id: Uuid,

    pub email_enabled: bool,
    pub push_enabled: bool,
    pub in_app_enabled: bool,

    pub order_notifications: std::collections::HashMap<String, bool>,
    pub account_notifications: std::collections::HashMap<String, bool>,
    pub blog_notifications: std::collections::HashMap<String, bool>,

    pub quiet_hours_enabled: bool,
    pub quiet_hours_start: Option<DateTime<Utc>>,
    pub quiet_hours_end: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_round_trip() {
        for channel in [Channel::Email, Channel::Push, Channel::InApp] {
            assert_eq!(Channel::parse(channel.as_str()), Some(channel));
        }
        assert_eq!(Channel::parse("sms"), None);
    }

    #[test]
    fn test_channel_serde_names() {
        assert_eq!(serde_json::to_string(&Channel::InApp).unwrap(), r#""in_app""#);
        let parsed: Channel = serde_json::from_str(r#""push""#).unwrap();
        assert_eq!(parsed, Channel::Push);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            NotificationStatus::Processing,
            NotificationStatus::Sent,
            NotificationStatus::Failed,
        ] {
            assert_eq!(NotificationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(NotificationStatus::parse("queued"), None);
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            NotificationKind::Order,
            NotificationKind::Account,
            NotificationKind::Blog,
        ] {
            assert_eq!(NotificationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(NotificationKind::parse("product"), None);
    }

    #[test]
    fn test_preference_serde_round_trip() {
        let now = Utc::now();
        let pref = NotificationPreference {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            email_enabled: true,
            push_enabled: false,
            in_app_enabled: true,
            order_notifications: std::collections::HashMap::from([(
                "created".to_string(),
                true,
            )]),
            account_notifications: std::collections::HashMap::new(),
            blog_notifications: std::collections::HashMap::new(),
            quiet_hours_enabled: false,
            quiet_hours_start: None,
            quiet_hours_end: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_string(&pref).unwrap();
        let back: NotificationPreference = serde_json::from_str(&json).unwrap();

        assert_eq!(back.user_id, pref.user_id);
        assert!(!back.push_enabled);
        assert!(back.order_notifications["created"]);
        assert!(back.quiet_hours_start.is_none());
    }

    #[test]
    fn test_from_request_initial_state() {
        let req = CreateNotificationRequest {
            user_id: Uuid::now_v7(),
            kind: NotificationKind::Order,
            category: "created".to_string(),
            title: "Pesanan Dikonfirmasi".to_string(),
            message: "Pesanan #ord-1 telah dikonfirmasi dengan total Rp 150000".to_string(),
            channels: vec![Channel::Email, Channel::Push, Channel::InApp],
            metadata: Metadata::new(),
        };

        let notification = Notification::from_request(&req);
        assert_eq!(notification.status, NotificationStatus::Processing);
        assert_eq!(notification.user_id, req.user_id);
        assert_eq!(notification.channels.len(), 3);
        assert!(!notification.is_read);
        assert!(notification.email_sent_at.is_none());
        assert!(notification.push_sent_at.is_none());
        assert_eq!(notification.retry_count, 0);
        assert!(notification.expires_at.is_none());
    }
}
