//! 用户事件消费者
//!
//! 处理 user.registered 事件，为新注册用户生成欢迎通知
//! （邮件 + 站内信，不推送）。

use std::sync::Arc;

use notify_shared::config::AppConfig;
use notify_shared::kafka::{KafkaConsumer, topics};
use tokio::sync::watch;
use tracing::{info, warn};

use super::parse_user_id;
use crate::error::NotificationError;
use crate::events::{EventEnvelope, UserRegisteredEvent};
use crate::models::{Channel, CreateNotificationRequest, Metadata, NotificationKind};
use crate::service::NotificationService;

/// 用户事件量远小于订单，3 个槽位足够
const WORKER_COUNT: usize = 3;

/// 用户事件消费者
pub struct UserEventConsumer {
    consumer: KafkaConsumer,
    service: Arc<NotificationService>,
}

impl UserEventConsumer {
    pub fn new(
        config: &AppConfig,
        service: Arc<NotificationService>,
    ) -> Result<Self, NotificationError> {
        let consumer = KafkaConsumer::new(&config.kafka, Some("user"))?;
        Ok(Self { consumer, service })
    }

    /// 启动消费循环，直到收到 shutdown 信号
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), NotificationError> {
        let Self { consumer, service } = self;

        consumer.subscribe(&[topics::USER_EVENTS])?;
        info!(topic = topics::USER_EVENTS, "用户事件消费者已启动");

        consumer
            .start(WORKER_COUNT, shutdown, |msg| {
                let service = &service;
                async move { handle_message(service, &msg.payload).await }
            })
            .await;

        info!("用户事件消费者已停止");
        Ok(())
    }
}

/// 处理单条用户事件消息
pub async fn handle_message(
    service: &NotificationService,
    payload: &[u8],
) -> Result<(), NotificationError> {
    let envelope: EventEnvelope = serde_json::from_slice(payload)
        .map_err(|e| NotificationError::Decode(format!("事件信封解析失败: {e}")))?;

    match envelope.event_type.as_str() {
        "user.registered" => handle_user_registered(service, payload).await,
        other => {
            warn!(event_type = other, "未知的用户事件类型，跳过");
            Ok(())
        }
    }
}

async fn handle_user_registered(
    service: &NotificationService,
    payload: &[u8],
) -> Result<(), NotificationError> {
    let event: UserRegisteredEvent = serde_json::from_slice(payload)
        .map_err(|e| NotificationError::Decode(format!("UserRegisteredEvent 解析失败: {e}")))?;

    info!(
        user_id = %event.user_id,
        username = %event.username,
        email = %event.email,
        "处理用户注册事件"
    );

    let req = user_registered_request(&event)?;
    service.create_and_send(&req).await
}

/// 用户注册事件 -> 欢迎通知创建请求
pub fn user_registered_request(
    event: &UserRegisteredEvent,
) -> Result<CreateNotificationRequest, NotificationError> {
    let user_id = parse_user_id(&event.user_id)?;

    let mut metadata = Metadata::new();
    metadata.insert("username".to_string(), serde_json::json!(event.username));
    metadata.insert("full_name".to_string(), serde_json::json!(event.full_name));
    metadata.insert("email".to_string(), serde_json::json!(event.email));

    Ok(CreateNotificationRequest {
        user_id,
        kind: NotificationKind::Account,
        category: "registered".to_string(),
        title: "Selamat Datang di TokoHobby!".to_string(),
        message: format!(
            "Hai {}, terima kasih telah bergabung dengan TokoHobby. \
             Akun Anda telah aktif dan siap digunakan!",
            event.username
        ),
        channels: vec![Channel::Email, Channel::InApp],
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_ID: &str = "5f9c2f4a-7c2b-4a1e-8a43-0d2f5b8e9c11";

    #[test]
    fn test_user_registered_request_mapping() {
        let event = UserRegisteredEvent {
            user_id: USER_ID.to_string(),
            username: "budi_hobby".to_string(),
            email: "budi@example.com".to_string(),
            full_name: "Budi Santoso".to_string(),
            ..Default::default()
        };

        let req = user_registered_request(&event).unwrap();
        assert_eq!(req.kind, NotificationKind::Account);
        assert_eq!(req.category, "registered");
        assert_eq!(req.title, "Selamat Datang di TokoHobby!");
        assert_eq!(
            req.message,
            "Hai budi_hobby, terima kasih telah bergabung dengan TokoHobby. \
             Akun Anda telah aktif dan siap digunakan!"
        );
        // 欢迎通知不走推送渠道
        assert_eq!(req.channels, vec![Channel::Email, Channel::InApp]);
        assert_eq!(req.metadata["username"], "budi_hobby");
        assert_eq!(req.metadata["full_name"], "Budi Santoso");
        assert_eq!(req.metadata["email"], "budi@example.com");
    }

    #[test]
    fn test_invalid_user_id_rejected() {
        let event = UserRegisteredEvent {
            user_id: "bogus".to_string(),
            username: "x".to_string(),
            ..Default::default()
        };

        assert!(user_registered_request(&event).is_err());
    }
}
