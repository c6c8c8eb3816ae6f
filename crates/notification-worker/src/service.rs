//! 通知派发服务
//!
//! 编排"创建 -> 入库 -> 按渠道发送 -> 状态回写"的完整流程。
//! 每一步都独立容错：入库失败不阻止发送（投递优先于记账），
//! 单个渠道失败不阻止其余渠道，最终状态粘性标记 failed。
//! 对调用方始终返回 Ok，渠道级失败不触发消息重投。

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::NotificationError;
use crate::models::{
    Channel, CreateNotificationRequest, Notification, NotificationStatus,
};
use crate::repository::NotificationStore;
use crate::sender::{NotificationPayload, Sender};
use crate::templates;

/// 通知派发服务
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    email_sender: Arc<dyn Sender>,
    push_sender: Arc<dyn Sender>,
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        email_sender: Arc<dyn Sender>,
        push_sender: Arc<dyn Sender>,
    ) -> Self {
        Self {
            store,
            email_sender,
            push_sender,
        }
    }

    /// 创建通知并按请求的渠道列表依次投递
    ///
    /// 渠道按列表顺序处理；in_app 渠道没有外部调用，入库即视为送达。
    /// 返回值恒为 Ok：渠道失败只反映在通知的 failed 状态上。
    pub async fn create_and_send(
        &self,
        req: &CreateNotificationRequest,
    ) -> Result<(), NotificationError> {
        info!(
            user_id = %req.user_id,
            kind = %req.kind,
            category = %req.category,
            title = %req.title,
            "创建通知"
        );

        let mut notification = Notification::from_request(req);

        // 尽力入库；失败只记录日志，发送照常进行
        if let Err(e) = self.store.insert(&notification).await {
            error!(
                notification_id = %notification.id,
                error = %e,
                "通知入库失败，继续发送"
            );
        }

        for channel in &req.channels {
            match channel {
                Channel::Email => {
                    if let Err(e) = self.send_email(req, &notification).await {
                        error!(
                            notification_id = %notification.id,
                            error = %e,
                            "邮件发送失败"
                        );
                        notification.status = NotificationStatus::Failed;
                    }
                }
                Channel::Push => {
                    if let Err(e) = self.send_push(req, &notification).await {
                        error!(
                            notification_id = %notification.id,
                            error = %e,
                            "推送发送失败"
                        );
                        notification.status = NotificationStatus::Failed;
                    }
                }
                Channel::InApp => {
                    // 站内信已随通知记录入库
                    debug!(notification_id = %notification.id, "站内信已入库");
                }
            }
        }

        if notification.status != NotificationStatus::Failed {
            notification.status = NotificationStatus::Sent;
        }

        // 尽力回写最终状态
        if let Err(e) = self
            .store
            .set_status(notification.id, notification.status)
            .await
        {
            warn!(
                notification_id = %notification.id,
                error = %e,
                "通知状态回写失败"
            );
        }

        Ok(())
    }

    /// 邮件渠道：正文做占位符替换，成功后尽力记录发送时间
    async fn send_email(
        &self,
        req: &CreateNotificationRequest,
        notification: &Notification,
    ) -> Result<(), NotificationError> {
        let payload = NotificationPayload {
            // 占位：真实收件邮箱需要接入用户档案查询
            to: req.user_id.to_string(),
            subject: req.title.clone(),
            body: templates::interpolate(&req.message, &req.metadata),
            data: req.metadata.clone(),
        };

        self.email_sender.send(&payload).await?;

        if let Err(e) = self.store.set_email_sent_at(notification.id).await {
            warn!(
                notification_id = %notification.id,
                error = %e,
                "邮件发送时间回写失败"
            );
        }

        Ok(())
    }

    /// 推送渠道：正文保持原文，成功后尽力记录发送时间
    async fn send_push(
        &self,
        req: &CreateNotificationRequest,
        notification: &Notification,
    ) -> Result<(), NotificationError> {
        let payload = NotificationPayload {
            // 占位：真实设备 token 需要接入用户档案查询
            to: req.user_id.to_string(),
            subject: req.title.clone(),
            body: req.message.clone(),
            data: req.metadata.clone(),
        };

        self.push_sender.send(&payload).await?;

        if let Err(e) = self.store.set_push_sent_at(notification.id).await {
            warn!(
                notification_id = %notification.id,
                error = %e,
                "推送发送时间回写失败"
            );
        }

        Ok(())
    }
}
