//! 博客事件消费者
//!
//! 处理 comment.added 事件，通知博客作者有新评论。
//! blog.published 事件会被解析但不产生通知：关注者体系尚未上线，
//! 当前仅记录日志，属于有意保留的未完成功能而非缺陷。

use std::sync::Arc;

use notify_shared::config::AppConfig;
use notify_shared::kafka::{KafkaConsumer, topics};
use tokio::sync::watch;
use tracing::{info, warn};

use super::parse_user_id;
use crate::error::NotificationError;
use crate::events::{BlogPublishedEvent, CommentAddedEvent, EventEnvelope};
use crate::models::{Channel, CreateNotificationRequest, Metadata, NotificationKind};
use crate::service::NotificationService;

/// 博客事件的并发处理槽位数
const WORKER_COUNT: usize = 5;

/// 博客事件消费者
pub struct BlogEventConsumer {
    consumer: KafkaConsumer,
    service: Arc<NotificationService>,
}

impl BlogEventConsumer {
    pub fn new(
        config: &AppConfig,
        service: Arc<NotificationService>,
    ) -> Result<Self, NotificationError> {
        let consumer = KafkaConsumer::new(&config.kafka, Some("blog"))?;
        Ok(Self { consumer, service })
    }

    /// 启动消费循环，直到收到 shutdown 信号
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), NotificationError> {
        let Self { consumer, service } = self;

        consumer.subscribe(&[topics::BLOG_EVENTS])?;
        info!(topic = topics::BLOG_EVENTS, "博客事件消费者已启动");

        consumer
            .start(WORKER_COUNT, shutdown, |msg| {
                let service = &service;
                async move { handle_message(service, &msg.payload).await }
            })
            .await;

        info!("博客事件消费者已停止");
        Ok(())
    }
}

/// 处理单条博客事件消息
pub async fn handle_message(
    service: &NotificationService,
    payload: &[u8],
) -> Result<(), NotificationError> {
    let envelope: EventEnvelope = serde_json::from_slice(payload)
        .map_err(|e| NotificationError::Decode(format!("事件信封解析失败: {e}")))?;

    match envelope.event_type.as_str() {
        "blog.published" => handle_blog_published(payload).await,
        "comment.added" => handle_comment_added(service, payload).await,
        other => {
            warn!(event_type = other, "未知的博客事件类型，跳过");
            Ok(())
        }
    }
}

/// 博客发布：解析并记录，不产生通知
///
/// TODO: 关注者体系上线后，查出作者的关注者列表并逐一派发通知
async fn handle_blog_published(payload: &[u8]) -> Result<(), NotificationError> {
    let event: BlogPublishedEvent = serde_json::from_slice(payload)
        .map_err(|e| NotificationError::Decode(format!("BlogPublishedEvent 解析失败: {e}")))?;

    info!(
        blog_id = %event.blog_id,
        author = %event.author_name,
        title = %event.title,
        "博客发布事件，暂不派发关注者通知"
    );

    Ok(())
}

async fn handle_comment_added(
    service: &NotificationService,
    payload: &[u8],
) -> Result<(), NotificationError> {
    let event: CommentAddedEvent = serde_json::from_slice(payload)
        .map_err(|e| NotificationError::Decode(format!("CommentAddedEvent 解析失败: {e}")))?;

    info!(
        comment_id = %event.comment_id,
        blog_title = %event.blog_title,
        commenter = %event.commenter_name,
        blog_owner = %event.blog_owner_id,
        "处理评论新增事件"
    );

    let req = comment_added_request(&event)?;
    service.create_and_send(&req).await
}

/// 评论新增事件 -> 博客作者的通知创建请求
pub fn comment_added_request(
    event: &CommentAddedEvent,
) -> Result<CreateNotificationRequest, NotificationError> {
    let user_id = parse_user_id(&event.blog_owner_id)?;

    let mut metadata = Metadata::new();
    metadata.insert("blog_id".to_string(), serde_json::json!(event.blog_id));
    metadata.insert("comment_id".to_string(), serde_json::json!(event.comment_id));
    metadata.insert(
        "commenter".to_string(),
        serde_json::json!(event.commenter_name),
    );

    Ok(CreateNotificationRequest {
        user_id,
        kind: NotificationKind::Blog,
        category: "comment".to_string(),
        title: "New Comment".to_string(),
        message: format!(
            "{} commented on your blog '{}': {}",
            event.commenter_name, event.blog_title, event.comment
        ),
        channels: vec![Channel::Email, Channel::Push, Channel::InApp],
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER_ID: &str = "5f9c2f4a-7c2b-4a1e-8a43-0d2f5b8e9c11";

    #[test]
    fn test_comment_added_request_mapping() {
        let event = CommentAddedEvent {
            comment_id: "c-9".to_string(),
            blog_id: "b-3".to_string(),
            blog_title: "Merakit Gundam".to_string(),
            commenter_id: "u-2".to_string(),
            commenter_name: "Budi".to_string(),
            comment: "Keren!".to_string(),
            blog_owner_id: OWNER_ID.to_string(),
            ..Default::default()
        };

        let req = comment_added_request(&event).unwrap();
        assert_eq!(req.kind, NotificationKind::Blog);
        assert_eq!(req.category, "comment");
        assert_eq!(req.title, "New Comment");
        assert_eq!(
            req.message,
            "Budi commented on your blog 'Merakit Gundam': Keren!"
        );
        assert_eq!(
            req.channels,
            vec![Channel::Email, Channel::Push, Channel::InApp]
        );
        assert_eq!(req.metadata["blog_id"], "b-3");
        assert_eq!(req.metadata["comment_id"], "c-9");
        assert_eq!(req.metadata["commenter"], "Budi");
    }

    #[test]
    fn test_invalid_owner_id_rejected() {
        let event = CommentAddedEvent {
            blog_owner_id: "oops".to_string(),
            ..Default::default()
        };

        assert!(comment_added_request(&event).is_err());
    }
}
