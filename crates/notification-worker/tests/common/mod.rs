//! 测试替身
//!
//! RecordingStore 记录所有持久化调用，StubSender 可配置成功/失败
//! 并捕获最后一次发送的负载，用于验证派发服务的编排行为。

use std::sync::Mutex;

use async_trait::async_trait;
use notification_worker::error::NotificationError;
use notification_worker::models::{Channel, Notification, NotificationStatus};
use notification_worker::repository::NotificationStore;
use notification_worker::sender::{NotificationPayload, Sender};
use notify_shared::error::{NotifyError, Result};
use uuid::Uuid;

/// 记录型持久化替身
#[derive(Default)]
pub struct RecordingStore {
    pub fail_insert: bool,
    pub inserted: Mutex<Vec<Notification>>,
    pub statuses: Mutex<Vec<(Uuid, NotificationStatus)>>,
    pub email_sent: Mutex<Vec<Uuid>>,
    pub push_sent: Mutex<Vec<Uuid>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入调用总是失败的替身，用于验证"投递优先于记账"
    pub fn failing_insert() -> Self {
        Self {
            fail_insert: true,
            ..Self::default()
        }
    }

    pub fn last_status(&self) -> Option<NotificationStatus> {
        self.statuses.lock().unwrap().last().map(|(_, s)| *s)
    }
}

#[async_trait]
impl NotificationStore for RecordingStore {
    async fn insert(&self, notification: &Notification) -> Result<()> {
        if self.fail_insert {
            return Err(NotifyError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inserted.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn list_for_user(
        &self,
        _user_id: Uuid,
        _unread_only: bool,
        _limit: i64,
    ) -> Result<Vec<Notification>> {
        Ok(self.inserted.lock().unwrap().clone())
    }

    async fn mark_read(&self, _id: Uuid, _user_id: Uuid) -> Result<()> {
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: NotificationStatus) -> Result<()> {
        self.statuses.lock().unwrap().push((id, status));
        Ok(())
    }

    async fn set_email_sent_at(&self, id: Uuid) -> Result<()> {
        self.email_sent.lock().unwrap().push(id);
        Ok(())
    }

    async fn set_push_sent_at(&self, id: Uuid) -> Result<()> {
        self.push_sent.lock().unwrap().push(id);
        Ok(())
    }

    async fn count_unread(&self, _user_id: Uuid) -> Result<i64> {
        Ok(self.inserted.lock().unwrap().len() as i64)
    }
}

/// 可配置的发送器替身
pub struct StubSender {
    channel: Channel,
    fail: bool,
    pub calls: Mutex<usize>,
    pub last_payload: Mutex<Option<NotificationPayload>>,
}

impl StubSender {
    pub fn ok(channel: Channel) -> Self {
        Self {
            channel,
            fail: false,
            calls: Mutex::new(0),
            last_payload: Mutex::new(None),
        }
    }

    pub fn failing(channel: Channel) -> Self {
        Self {
            fail: true,
            ..Self::ok(channel)
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Sender for StubSender {
    async fn send(&self, payload: &NotificationPayload) -> std::result::Result<(), NotificationError> {
        *self.calls.lock().unwrap() += 1;
        *self.last_payload.lock().unwrap() = Some(payload.clone());

        if self.fail {
            return Err(NotificationError::SendFailed {
                channel: self.channel.as_str().to_string(),
                reason: "stub failure".to_string(),
            });
        }
        Ok(())
    }

    fn channel(&self) -> Channel {
        self.channel
    }
}
