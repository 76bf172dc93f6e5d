//! 订单处理服务专用错误类型
//!
//! 在共享库 OrderError 基础上区分解码、校验、持久化与确认失败，
//! worker 依据变体决定死信类型。

use order_shared::error::OrderError;

use crate::entity::ValidationError;

/// 订单处理错误
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("订单校验失败: {0}")]
    Validation(#[from] ValidationError),

    /// 负载不是合法的订单 JSON
    #[error("消息解码失败: {0}")]
    Decode(String),

    #[error("订单持久化失败: {0}")]
    Persistence(OrderError),

    #[error("消息确认失败: {0}")]
    Acknowledge(String),

    #[error(transparent)]
    Shared(#[from] OrderError),
}

impl ProcessorError {
    /// 只有瞬时的持久化故障值得重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(e) if e.is_retryable())
    }

    /// 指标与日志中使用的失败类别
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Decode(_) => "decode",
            Self::Persistence(_) => "persistence",
            Self::Acknowledge(_) => "acknowledge",
            Self::Shared(_) => "internal",
        }
    }
}
