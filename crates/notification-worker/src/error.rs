//! 通知服务错误类型
//!
//! 区分消息解码、发送和基础设施三类错误：解码失败会向消费循环
//! 传播并触发 broker 重投，发送失败只影响单个渠道的状态标记。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("事件解码失败: {0}")]
    Decode(String),

    #[error("无效的用户标识: {0}")]
    InvalidUserId(String),

    #[error("通知发送失败: 渠道={channel}, 原因={reason}")]
    SendFailed { channel: String, reason: String },

    #[error(transparent)]
    Shared(#[from] notify_shared::error::NotifyError),
}
