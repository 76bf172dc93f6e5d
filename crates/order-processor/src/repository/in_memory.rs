//! 内存订单仓储
//!
//! 只追加、不去重，与 PostgreSQL 实现不同，重复 id 不会被拒绝。

use async_trait::async_trait;
use order_shared::error::Result;
use tokio::sync::RwLock;

use super::traits::OrderRepository;
use crate::entity::Order;

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<Vec<Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按写入顺序返回全部订单的快照
    pub async fn orders(&self) -> Vec<Order> {
        self.orders.read().await.clone()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, order: &Order) -> Result<()> {
        self.orders.write().await.push(order.clone());
        Ok(())
    }

    async fn count_all(&self) -> Result<i64> {
        Ok(self.orders.read().await.len() as i64)
    }
}
