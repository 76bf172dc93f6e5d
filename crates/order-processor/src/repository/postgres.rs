//! PostgreSQL 订单仓储

use async_trait::async_trait;
use order_shared::error::Result;
use sqlx::PgPool;
use tracing::{debug, info};

use super::traits::OrderRepository;
use crate::entity::Order;

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 启动时建表，已存在则跳过
    ///
    /// orders 是只追加的日志，id 不设唯一约束：重复投递的消息会再写一行。
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id          TEXT NOT NULL,
                price       DOUBLE PRECISION NOT NULL,
                tax         DOUBLE PRECISION NOT NULL,
                final_price DOUBLE PRECISION NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("orders 表已就绪");
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn save(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, price, tax, final_price)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&order.id)
        .bind(order.price)
        .bind(order.tax)
        .bind(order.final_price)
        .execute(&self.pool)
        .await?;

        debug!(order_id = %order.id, final_price = order.final_price, "订单已写入");
        Ok(())
    }

    async fn count_all(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
