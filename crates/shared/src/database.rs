//! PostgreSQL 连接池
//!
//! 按配置构造连接池，并在启动路径上提供迁移和健康检查。
//! 迁移内嵌在二进制里（sqlx::migrate!），worker 启动时自动补齐 schema，
//! 无需单独的迁移步骤。

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{NotifyError, Result};

/// 数据库句柄，持有连接池并负责其生命周期
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 按配置建立连接池
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await?;

        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "数据库连接池已建立"
        );

        Ok(Self { pool })
    }

    /// 应用 migrations/ 目录中尚未执行的迁移
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| NotifyError::Internal(format!("数据库迁移失败: {e}")))?;

        info!("数据库迁移已完成");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 探测连接池是否可用
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    /// 等待在借连接归还后关闭连接池
    pub async fn close(&self) {
        self.pool.close().await;
        info!("数据库连接池已关闭");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // 需要本地 PostgreSQL 实例
    async fn test_connect_and_health_check() {
        let config = DatabaseConfig::default();
        let db = Database::connect(&config).await.unwrap();
        db.run_migrations().await.unwrap();
        db.health_check().await.unwrap();
        db.close().await;
    }
}
