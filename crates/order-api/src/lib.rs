//! 订单 HTTP 服务
//!
//! 提供一个演示端点：返回固定的示例订单及其在请求时计算出的最终价格，不做持久化。

pub mod error;
pub mod handlers;
pub mod routes;
