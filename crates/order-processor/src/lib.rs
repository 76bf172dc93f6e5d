//! 订单处理服务
//!
//! 从 Kafka 消费订单消息，经交接通道交给单个 worker 顺序处理：
//! 解码、校验、计算最终价格、持久化，最后显式确认消息。
//! 无法处理的消息进入死信队列，不会被确认。

pub mod consumer;
pub mod entity;
pub mod error;
pub mod repository;
pub mod usecase;
pub mod worker;
