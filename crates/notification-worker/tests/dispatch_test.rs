//! 派发服务编排行为测试
//!
//! 覆盖状态机的关键路径：全渠道成功、部分渠道失败、入库失败
//! 不阻断发送、in_app 渠道无外部调用、邮件正文占位符替换。

mod common;

use std::sync::Arc;

use common::{RecordingStore, StubSender};
use notification_worker::models::{
    Channel, CreateNotificationRequest, Metadata, NotificationKind, NotificationStatus,
};
use notification_worker::service::NotificationService;
use uuid::Uuid;

fn make_request(channels: Vec<Channel>) -> CreateNotificationRequest {
    let mut metadata = Metadata::new();
    metadata.insert("order_id".to_string(), serde_json::json!("ord-001"));

    CreateNotificationRequest {
        user_id: Uuid::now_v7(),
        kind: NotificationKind::Order,
        category: "created".to_string(),
        title: "Pesanan Dikonfirmasi".to_string(),
        message: "Pesanan #{{order_id}} telah dikonfirmasi".to_string(),
        channels,
        metadata,
    }
}

#[tokio::test]
async fn test_all_channels_success_marks_sent() {
    let store = Arc::new(RecordingStore::new());
    let email = Arc::new(StubSender::ok(Channel::Email));
    let push = Arc::new(StubSender::ok(Channel::Push));

    let service = NotificationService::new(store.clone(), email.clone(), push.clone());
    let req = make_request(vec![Channel::Email, Channel::Push, Channel::InApp]);

    service.create_and_send(&req).await.unwrap();

    let inserted = store.inserted.lock().unwrap();
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0].status, NotificationStatus::Processing);
    let id = inserted[0].id;
    drop(inserted);

    // 两个外部渠道都成功，最终状态为 sent，两个发送时间都有记录
    assert_eq!(store.last_status(), Some(NotificationStatus::Sent));
    assert_eq!(store.email_sent.lock().unwrap().as_slice(), &[id]);
    assert_eq!(store.push_sent.lock().unwrap().as_slice(), &[id]);
    assert_eq!(email.call_count(), 1);
    assert_eq!(push.call_count(), 1);
}

#[tokio::test]
async fn test_email_failure_does_not_block_push() {
    let store = Arc::new(RecordingStore::new());
    let email = Arc::new(StubSender::failing(Channel::Email));
    let push = Arc::new(StubSender::ok(Channel::Push));

    let service = NotificationService::new(store.clone(), email.clone(), push.clone());
    let req = make_request(vec![Channel::Email, Channel::Push]);

    // 渠道失败不向调用方传播
    service.create_and_send(&req).await.unwrap();

    // 最终状态为 failed（粘性），但 push 渠道仍独立完成
    assert_eq!(store.last_status(), Some(NotificationStatus::Failed));
    assert!(store.email_sent.lock().unwrap().is_empty());
    assert_eq!(store.push_sent.lock().unwrap().len(), 1);
    assert_eq!(push.call_count(), 1);
}

#[tokio::test]
async fn test_all_sends_failing_marks_failed() {
    let store = Arc::new(RecordingStore::new());
    let email = Arc::new(StubSender::failing(Channel::Email));
    let push = Arc::new(StubSender::failing(Channel::Push));

    let service = NotificationService::new(store.clone(), email, push);
    let req = make_request(vec![Channel::Email, Channel::Push, Channel::InApp]);

    service.create_and_send(&req).await.unwrap();

    assert_eq!(store.last_status(), Some(NotificationStatus::Failed));
    assert!(store.email_sent.lock().unwrap().is_empty());
    assert!(store.push_sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_insert_failure_does_not_prevent_sends() {
    let store = Arc::new(RecordingStore::failing_insert());
    let email = Arc::new(StubSender::ok(Channel::Email));
    let push = Arc::new(StubSender::ok(Channel::Push));

    let service = NotificationService::new(store.clone(), email.clone(), push.clone());
    let req = make_request(vec![Channel::Email, Channel::Push]);

    // 入库失败不向调用方传播，发送照常进行
    service.create_and_send(&req).await.unwrap();

    assert_eq!(email.call_count(), 1);
    assert_eq!(push.call_count(), 1);
    assert_eq!(store.last_status(), Some(NotificationStatus::Sent));
}

#[tokio::test]
async fn test_in_app_only_needs_no_external_call() {
    let store = Arc::new(RecordingStore::new());
    let email = Arc::new(StubSender::ok(Channel::Email));
    let push = Arc::new(StubSender::ok(Channel::Push));

    let service = NotificationService::new(store.clone(), email.clone(), push.clone());
    let req = make_request(vec![Channel::InApp]);

    service.create_and_send(&req).await.unwrap();

    assert_eq!(email.call_count(), 0);
    assert_eq!(push.call_count(), 0);
    // in_app 入库即送达
    assert_eq!(store.last_status(), Some(NotificationStatus::Sent));
}

#[tokio::test]
async fn test_email_body_interpolated_push_body_raw() {
    let store = Arc::new(RecordingStore::new());
    let email = Arc::new(StubSender::ok(Channel::Email));
    let push = Arc::new(StubSender::ok(Channel::Push));

    let service = NotificationService::new(store.clone(), email.clone(), push.clone());
    let req = make_request(vec![Channel::Email, Channel::Push]);

    service.create_and_send(&req).await.unwrap();

    // 邮件正文替换占位符
    let email_payload = email.last_payload.lock().unwrap();
    let email_payload = email_payload.as_ref().unwrap();
    assert_eq!(email_payload.body, "Pesanan #ord-001 telah dikonfirmasi");
    assert_eq!(email_payload.subject, "Pesanan Dikonfirmasi");

    // 推送正文保持原文
    let push_payload = push.last_payload.lock().unwrap();
    let push_payload = push_payload.as_ref().unwrap();
    assert_eq!(push_payload.body, "Pesanan #{{order_id}} telah dikonfirmasi");
}
