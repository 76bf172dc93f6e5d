//! 仓储 Trait 定义

use async_trait::async_trait;
use order_shared::error::Result;

use crate::entity::Order;

/// 订单仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// 追加一条订单记录
    async fn save(&self, order: &Order) -> Result<()>;

    /// 已持久化的订单总数
    async fn count_all(&self) -> Result<i64>;
}
