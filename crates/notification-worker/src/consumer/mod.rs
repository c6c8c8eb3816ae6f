//! 事件消费者
//!
//! 每个事件族（订单、用户、博客）一个消费者，各自绑定独立的
//! topic 和消费组，以固定的并发槽位数处理消息。消费者只负责
//! 解码信封、按 type 判别字段路由到具体处理器；处理器把事件
//! 字段映射为通知创建请求并同步调用派发服务。
//!
//! 路由策略：未知的 type 值记录告警后按成功确认（前向兼容），
//! 信封或消息体解码失败则向消费循环传播，位点不提交。

pub mod blog;
pub mod order;
pub mod user;

pub use blog::BlogEventConsumer;
pub use order::OrderEventConsumer;
pub use user::UserEventConsumer;

use uuid::Uuid;

use crate::error::NotificationError;

/// 解析事件中的用户 ID
///
/// 格式非法视为消息体损坏，向上传播触发重投。
pub(crate) fn parse_user_id(raw: &str) -> Result<Uuid, NotificationError> {
    Uuid::parse_str(raw).map_err(|e| NotificationError::InvalidUserId(format!("{raw}: {e}")))
}
