//! 多渠道通知发送器
//!
//! 通过 `Sender` trait 抽象发送行为，邮件和推送两个渠道提供独立实现。
//! 当前版本为模拟发送（人为延迟 + 记录日志，无条件成功），便于在无
//! 外部依赖的情况下验证派发管道的完整性。接入真实 SMTP / 推送网关时
//! 只需实现同一 trait，派发服务不受影响。

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::error::NotificationError;
use crate::models::{Channel, Metadata};

/// 待发送的通知负载
///
/// `to` 当前填用户 ID 占位，真实收件地址（邮箱 / 设备 token）
/// 需要接入用户档案查询后替换。
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub data: Metadata,
}

/// 通知发送器 trait，各渠道实现具体的投递逻辑
#[async_trait]
pub trait Sender: Send + Sync {
    /// 发送通知到该渠道
    async fn send(&self, payload: &NotificationPayload) -> Result<(), NotificationError>;

    /// 该发送器对应的渠道
    fn channel(&self) -> Channel;
}

// ---------------------------------------------------------------------------
// 模拟邮件发送器
// ---------------------------------------------------------------------------

/// 模拟邮件发送器
///
/// 生产环境中替换为 SMTP 或邮件服务商的 API 调用
pub struct MockEmailSender;

#[async_trait]
impl Sender for MockEmailSender {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), NotificationError> {
        // 模拟网络延迟
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!(
            channel = "EMAIL",
            to = %payload.to,
            subject = %payload.subject,
            "[MOCK] 邮件发送成功"
        );

        Ok(())
    }

    fn channel(&self) -> Channel {
        Channel::Email
    }
}

// ---------------------------------------------------------------------------
// 模拟推送发送器
// ---------------------------------------------------------------------------

/// 模拟推送发送器
///
/// 生产环境中替换为 FCM / APNs 等推送服务的 SDK 调用
pub struct MockPushSender;

#[async_trait]
impl Sender for MockPushSender {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), NotificationError> {
        tokio::time::sleep(Duration::from_millis(50)).await;

        info!(
            channel = "PUSH",
            to = %payload.to,
            title = %payload.subject,
            body = %payload.body,
            "[MOCK] 推送发送成功"
        );

        Ok(())
    }

    fn channel(&self) -> Channel {
        Channel::Push
    }
}
