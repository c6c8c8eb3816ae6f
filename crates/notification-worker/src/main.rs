//! 通知工作者入口
//!
//! 启动流程：加载配置 -> 初始化日志 -> 连接数据库 -> 构造发送器与
//! 派发服务 -> 为每个事件族启动一个消费任务 -> 等待退出信号。
//! 启动阶段的任何失败都是致命的；运行期错误只影响单条消息。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use notify_shared::{config::AppConfig, database::Database, observability};
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use notification_worker::{
    consumer::{BlogEventConsumer, OrderEventConsumer, UserEventConsumer},
    repository::NotificationRepository,
    sender::{MockEmailSender, MockPushSender, Sender},
    service::NotificationService,
};

/// 优雅关闭时给在途消息的处理宽限期
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load("notification-worker").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {e}");
        AppConfig::default()
    });

    observability::init(&config.observability);

    info!("Starting notification-worker...");
    info!(environment = %config.environment, "Configuration loaded");

    // 数据库连接或迁移失败直接退出
    let db = Database::connect(&config.database).await?;
    db.run_migrations().await?;
    info!("Database connection established");

    // 发送器：演示模式用模拟实现，真实传输尚未接入
    let (email_sender, push_sender): (Arc<dyn Sender>, Arc<dyn Sender>) =
        if config.sender.mock_mode {
            info!("使用模拟发送器（演示模式）");
            (Arc::new(MockEmailSender), Arc::new(MockPushSender))
        } else {
            anyhow::bail!(
                "真实发送器尚未实现，请设置 NOTIFY_SENDER__MOCK_MODE=true 使用模拟发送器"
            );
        };

    let repo = Arc::new(NotificationRepository::new(db.pool().clone()));
    let service = Arc::new(NotificationService::new(repo, email_sender, push_sender));
    info!("Notification service initialized");

    // 每个事件族一个独立的消费任务，共享同一个关闭信号
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = JoinSet::new();

    let order_consumer = OrderEventConsumer::new(&config, service.clone())?;
    let rx = shutdown_rx.clone();
    tasks.spawn(async move {
        if let Err(e) = order_consumer.run(rx).await {
            error!(error = %e, "订单事件消费者异常退出");
        }
    });

    let user_consumer = UserEventConsumer::new(&config, service.clone())?;
    let rx = shutdown_rx.clone();
    tasks.spawn(async move {
        if let Err(e) = user_consumer.run(rx).await {
            error!(error = %e, "用户事件消费者异常退出");
        }
    });

    let blog_consumer = BlogEventConsumer::new(&config, service.clone())?;
    let rx = shutdown_rx;
    tasks.spawn(async move {
        if let Err(e) = blog_consumer.run(rx).await {
            error!(error = %e, "博客事件消费者异常退出");
        }
    });

    info!("Notification worker is running. Waiting for events...");

    shutdown_signal().await;

    info!("收到退出信号，开始优雅关闭...");
    let _ = shutdown_tx.send(true);

    // 停止拉取新消息后，在宽限期内等待在途消息处理完成
    let drain = async {
        while tasks.join_next().await.is_some() {}
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        warn!("等待消费者退出超时，强制结束");
    }

    db.close().await;
    info!("Notification worker stopped gracefully");
    Ok(())
}

/// 优雅关闭信号处理
///
/// 监听 Ctrl+C 和 SIGTERM 信号，用于容器环境优雅关闭
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
