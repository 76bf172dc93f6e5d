//! 请求处理器

use axum::Json;
use order_processor::entity::Order;
use tracing::debug;

use crate::error::ApiError;

/// 示例订单
pub const SAMPLE_ORDER_ID: &str = "1";
pub const SAMPLE_PRICE: f64 = 10.0;
pub const SAMPLE_TAX: f64 = 1.0;

/// GET /order
///
/// 每次请求重新构造示例订单并计算最终价格。
pub async fn get_order() -> Result<Json<Order>, ApiError> {
    Ok(Json(sample_order(SAMPLE_ORDER_ID, SAMPLE_PRICE, SAMPLE_TAX)?))
}

pub(crate) fn sample_order(id: &str, price: f64, tax: f64) -> Result<Order, ApiError> {
    let mut order = Order::new(id, price, tax)?;
    order.calculate_final_price()?;
    debug!(order_id = %order.id, final_price = order.final_price, "示例订单已计算");
    Ok(order)
}

/// GET /health
pub async fn health() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use order_processor::entity::ValidationError;

    #[test]
    fn test_sample_order() {
        let order = sample_order("1", 10.0, 1.0).unwrap();
        assert_eq!(order.final_price, 11.0);
    }

    #[test]
    fn test_sample_order_invalid() {
        let err = sample_order("1", 10.0, 0.0).unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::NonPositiveTax)
        ));
    }
}
