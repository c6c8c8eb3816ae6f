//! 订单事件消费者
//!
//! 处理 order.created、order.status.changed 和 order.shipped 三类事件，
//! 为下单用户生成订单状态通知（邮件 + 推送 + 站内信）。

use std::sync::Arc;

use notify_shared::config::AppConfig;
use notify_shared::kafka::{KafkaConsumer, topics};
use tokio::sync::watch;
use tracing::{info, warn};

use super::parse_user_id;
use crate::error::NotificationError;
use crate::events::{
    EventEnvelope, OrderCreatedEvent, OrderShippedEvent, OrderStatusChangedEvent,
};
use crate::models::{Channel, CreateNotificationRequest, Metadata, NotificationKind};
use crate::service::NotificationService;

/// 订单事件的并发处理槽位数
const WORKER_COUNT: usize = 5;

/// 订单事件消费者
pub struct OrderEventConsumer {
    consumer: KafkaConsumer,
    service: Arc<NotificationService>,
}

impl OrderEventConsumer {
    pub fn new(
        config: &AppConfig,
        service: Arc<NotificationService>,
    ) -> Result<Self, NotificationError> {
        let consumer = KafkaConsumer::new(&config.kafka, Some("order"))?;
        Ok(Self { consumer, service })
    }

    /// 启动消费循环，直到收到 shutdown 信号
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), NotificationError> {
        let Self { consumer, service } = self;

        consumer.subscribe(&[topics::ORDER_EVENTS])?;
        info!(topic = topics::ORDER_EVENTS, "订单事件消费者已启动");

        consumer
            .start(WORKER_COUNT, shutdown, |msg| {
                let service = &service;
                async move { handle_message(service, &msg.payload).await }
            })
            .await;

        info!("订单事件消费者已停止");
        Ok(())
    }
}

/// 处理单条订单事件消息
///
/// 拆分为独立函数而非方法，便于在测试中直接调用而无需构造完整的 Consumer。
pub async fn handle_message(
    service: &NotificationService,
    payload: &[u8],
) -> Result<(), NotificationError> {
    let envelope: EventEnvelope = serde_json::from_slice(payload)
        .map_err(|e| NotificationError::Decode(format!("事件信封解析失败: {e}")))?;

    match envelope.event_type.as_str() {
        "order.created" => handle_order_created(service, payload).await,
        "order.status.changed" => handle_order_status_changed(service, payload).await,
        "order.shipped" => handle_order_shipped(service, payload).await,
        other => {
            warn!(event_type = other, "未知的订单事件类型，跳过");
            Ok(())
        }
    }
}

async fn handle_order_created(
    service: &NotificationService,
    payload: &[u8],
) -> Result<(), NotificationError> {
    let event: OrderCreatedEvent = serde_json::from_slice(payload)
        .map_err(|e| NotificationError::Decode(format!("OrderCreatedEvent 解析失败: {e}")))?;

    info!(
        order_id = %event.order_id,
        user_id = %event.user_id,
        amount = event.total_amount,
        "处理订单创建事件"
    );

    let req = order_created_request(&event)?;
    service.create_and_send(&req).await
}

async fn handle_order_status_changed(
    service: &NotificationService,
    payload: &[u8],
) -> Result<(), NotificationError> {
    let event: OrderStatusChangedEvent = serde_json::from_slice(payload).map_err(|e| {
        NotificationError::Decode(format!("OrderStatusChangedEvent 解析失败: {e}"))
    })?;

    info!(
        order_id = %event.order_id,
        user_id = %event.user_id,
        status = %event.status,
        "处理订单状态变更事件"
    );

    let req = order_status_changed_request(&event)?;
    service.create_and_send(&req).await
}

async fn handle_order_shipped(
    service: &NotificationService,
    payload: &[u8],
) -> Result<(), NotificationError> {
    let event: OrderShippedEvent = serde_json::from_slice(payload)
        .map_err(|e| NotificationError::Decode(format!("OrderShippedEvent 解析失败: {e}")))?;

    info!(
        order_id = %event.order_id,
        user_id = %event.user_id,
        tracking_number = %event.tracking_number,
        "处理订单发货事件"
    );

    let req = order_shipped_request(&event)?;
    service.create_and_send(&req).await
}

/// 订单创建事件 -> 通知创建请求
pub fn order_created_request(
    event: &OrderCreatedEvent,
) -> Result<CreateNotificationRequest, NotificationError> {
    let user_id = parse_user_id(&event.user_id)?;

    let mut metadata = Metadata::new();
    metadata.insert("order_id".to_string(), serde_json::json!(event.order_id));
    metadata.insert(
        "total_amount".to_string(),
        serde_json::json!(event.total_amount),
    );
    metadata.insert("item_count".to_string(), serde_json::json!(event.item_count));

    Ok(CreateNotificationRequest {
        user_id,
        kind: NotificationKind::Order,
        category: "created".to_string(),
        title: "Pesanan Dikonfirmasi".to_string(),
        message: format!(
            "Pesanan #{} telah dikonfirmasi dengan total Rp {:.0}",
            event.order_id, event.total_amount
        ),
        channels: vec![Channel::Email, Channel::Push, Channel::InApp],
        metadata,
    })
}

/// 订单状态变更事件 -> 通知创建请求
pub fn order_status_changed_request(
    event: &OrderStatusChangedEvent,
) -> Result<CreateNotificationRequest, NotificationError> {
    let user_id = parse_user_id(&event.user_id)?;
    let (title, message) = status_message(&event.status, &event.order_id);

    let mut metadata = Metadata::new();
    metadata.insert("order_id".to_string(), serde_json::json!(event.order_id));
    metadata.insert("status".to_string(), serde_json::json!(event.status));

    Ok(CreateNotificationRequest {
        user_id,
        kind: NotificationKind::Order,
        category: "status_changed".to_string(),
        title,
        message,
        channels: vec![Channel::Email, Channel::Push, Channel::InApp],
        metadata,
    })
}

/// 订单发货事件 -> 通知创建请求
pub fn order_shipped_request(
    event: &OrderShippedEvent,
) -> Result<CreateNotificationRequest, NotificationError> {
    let user_id = parse_user_id(&event.user_id)?;

    let mut metadata = Metadata::new();
    metadata.insert("order_id".to_string(), serde_json::json!(event.order_id));
    metadata.insert(
        "tracking_number".to_string(),
        serde_json::json!(event.tracking_number),
    );
    metadata.insert("courier".to_string(), serde_json::json!(event.courier));
    metadata.insert(
        "estimated_arrival".to_string(),
        serde_json::json!(event.estimated_arrival),
    );

    Ok(CreateNotificationRequest {
        user_id,
        kind: NotificationKind::Order,
        category: "shipped".to_string(),
        title: "Pesanan Dikirim".to_string(),
        message: format!(
            "Pesanan #{} telah dikirim via {}. Nomor resi: {}",
            event.order_id, event.courier, event.tracking_number
        ),
        channels: vec![Channel::Email, Channel::Push, Channel::InApp],
        metadata,
    })
}

/// 按订单状态生成（标题, 正文）对，未知状态使用通用回退文案
pub fn status_message(status: &str, order_id: &str) -> (String, String) {
    match status {
        "pending" => (
            "Menunggu Pembayaran".to_string(),
            format!("Pesanan #{order_id} menunggu pembayaran"),
        ),
        "paid" => (
            "Pembayaran Diterima".to_string(),
            format!("Pembayaran pesanan #{order_id} telah diterima"),
        ),
        "processing" => (
            "Pesanan Diproses".to_string(),
            format!("Pesanan #{order_id} sedang diproses"),
        ),
        "shipped" => (
            "Pesanan Dikirim".to_string(),
            format!("Pesanan #{order_id} sedang dalam pengiriman"),
        ),
        "delivered" => (
            "Pesanan Sampai".to_string(),
            format!("Pesanan #{order_id} telah sampai"),
        ),
        "cancelled" => (
            "Pesanan Dibatalkan".to_string(),
            format!("Pesanan #{order_id} telah dibatalkan"),
        ),
        _ => (
            "Status Pesanan Diubah".to_string(),
            format!("Status pesanan #{order_id}: {status}"),
        ),
    }
}
