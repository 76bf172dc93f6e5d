//! 订单库连接池
//!
//! 服务启动时建立连接池并做一次就绪检查，关闭时等待连接归还后释放。

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument, warn};

use crate::config::DatabaseConfig;
use crate::error::Result;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    #[instrument(skip(config), fields(max_connections = config.max_connections))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await?;

        info!("订单库连接池已建立");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 就绪检查，失败时服务不应开始消费
    pub async fn health_check(&self) -> Result<()> {
        if let Err(e) = sqlx::query("SELECT 1").execute(&self.pool).await {
            warn!(error = %e, "订单库就绪检查失败");
            return Err(e.into());
        }

        info!(idle = self.pool.num_idle(), "订单库已就绪");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("订单库连接池已关闭");
    }
}
