//! HTTP 层错误类型

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use order_processor::entity::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// 以纯文本返回错误信息
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "请求处理失败");
        (self.status_code(), self.to_string()).into_response()
    }
}
