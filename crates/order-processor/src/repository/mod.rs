//! 订单持久化层
//!
//! 仓储只追加写入，不提供更新和删除。用例层依赖 [`OrderRepository`] 抽象，
//! 生产环境使用 PostgreSQL 实现，测试与本地运行可使用内存实现。

mod in_memory;
mod postgres;
mod traits;

pub use in_memory::InMemoryOrderRepository;
pub use postgres::PgOrderRepository;
pub use traits::*;
