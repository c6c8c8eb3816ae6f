//! 通知仓储
//!
//! 提供 notifications 表的持久化访问。元数据以序列化 JSON 文本
//! 存储，读取时采用宽松策略：损坏的 JSON 解析为空映射并告警，
//! 不让单条脏数据导致整个查询失败。
//!
//! `NotificationStore` trait 是派发服务与持久化之间的接缝，
//! 测试中用记录型替身替换真实数据库。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notify_shared::error::{NotifyError, Result};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Channel, Metadata, Notification, NotificationKind, NotificationStatus};

/// 通知持久化操作的抽象
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// 插入一条新通知
    async fn insert(&self, notification: &Notification) -> Result<()>;

    /// 按用户查询通知，新创建的在前，可选只看未读
    async fn list_for_user(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>>;

    /// 标记已读；没有匹配行时返回 NotFound
    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<()>;

    /// 更新生命周期状态
    async fn set_status(&self, id: Uuid, status: NotificationStatus) -> Result<()>;

    /// 记录邮件发送时间为当前时刻
    async fn set_email_sent_at(&self, id: Uuid) -> Result<()>;

    /// 记录推送发送时间为当前时刻
    async fn set_push_sent_at(&self, id: Uuid) -> Result<()>;

    /// 统计未读数量
    async fn count_unread(&self, user_id: Uuid) -> Result<i64>;
}

/// 基于 PostgreSQL 的通知仓储
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn insert(&self, notification: &Notification) -> Result<()> {
        let metadata_json = serde_json::to_string(&notification.metadata)
            .map_err(|e| NotifyError::Internal(format!("元数据序列化失败: {e}")))?;

        let channels: Vec<String> = notification
            .channels
            .iter()
            .map(|c| c.as_str().to_string())
            .collect();

        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, user_id, type, category, title, message, metadata,
                channels, status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(notification.kind.as_str())
        .bind(&notification.category)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&metadata_json)
        .bind(&channels)
        .bind(notification.status.as_str())
        .bind(notification.created_at)
        .bind(notification.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(notification_id = %notification.id, "通知已入库");
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, type, category, title, message, metadata, channels,
                   status, is_read, read_at, email_sent_at, push_sent_at,
                   retry_count, last_error, created_at, updated_at, expires_at
            FROM notifications
            WHERE user_id = $1
            AND ($2::boolean IS FALSE OR is_read = FALSE)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_notification).collect()
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE, read_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(NotifyError::NotFound {
                entity: "Notification".to_string(),
                id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: NotificationStatus) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE notifications
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_email_sent_at(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE notifications
            SET email_sent_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_push_sent_at(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE notifications
            SET push_sent_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count_unread(&self, user_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE user_id = $1 AND is_read = FALSE
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

/// 将数据库行映射为通知记录
///
/// 元数据、状态和渠道列表都按宽松策略解析，脏数据退回默认值。
fn row_to_notification(row: &PgRow) -> Result<Notification> {
    let metadata_raw: String = row.try_get("metadata")?;
    let status_raw: String = row.try_get("status")?;
    let kind_raw: String = row.try_get("type")?;
    let channels_raw: Vec<String> = row.try_get("channels")?;

    Ok(Notification {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        kind: parse_kind(&kind_raw),
        category: row.try_get("category")?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        metadata: parse_metadata(&metadata_raw),
        channels: parse_channels(&channels_raw),
        status: parse_status(&status_raw),
        is_read: row.try_get("is_read")?,
        read_at: row.try_get::<Option<DateTime<Utc>>, _>("read_at")?,
        email_sent_at: row.try_get::<Option<DateTime<Utc>>, _>("email_sent_at")?,
        push_sent_at: row.try_get::<Option<DateTime<Utc>>, _>("push_sent_at")?,
        retry_count: row.try_get("retry_count")?,
        last_error: row.try_get::<Option<String>, _>("last_error")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        expires_at: row.try_get::<Option<DateTime<Utc>>, _>("expires_at")?,
    })
}

/// 解析元数据 JSON 文本，损坏时退回空映射
fn parse_metadata(raw: &str) -> Metadata {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => {
            warn!("元数据解析失败，退回空映射");
            Metadata::new()
        }
    }
}

/// 解析渠道列表，未知渠道名跳过
fn parse_channels(raw: &[String]) -> Vec<Channel> {
    raw.iter()
        .filter_map(|s| {
            let channel = Channel::parse(s);
            if channel.is_none() {
                warn!(channel = %s, "未知渠道名，跳过");
            }
            channel
        })
        .collect()
}

/// 解析状态文本，未知值退回 Processing
fn parse_status(raw: &str) -> NotificationStatus {
    NotificationStatus::parse(raw).unwrap_or_else(|| {
        warn!(status = %raw, "未知状态值，退回 processing");
        NotificationStatus::Processing
    })
}

/// 解析通知大类，未知值退回 Order
fn parse_kind(raw: &str) -> NotificationKind {
    NotificationKind::parse(raw).unwrap_or_else(|| {
        warn!(kind = %raw, "未知通知大类，退回 order");
        NotificationKind::Order
    })
}
