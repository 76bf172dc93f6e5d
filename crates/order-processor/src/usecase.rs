//! 最终价格计算用例
//!
//! 构造订单、计算最终价格、持久化，任一步失败立即返回，校验失败时不会写入。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::entity::Order;
use crate::error::ProcessorError;
use crate::repository::OrderRepository;

/// 订单消息负载，未知字段会被忽略
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderInput {
    pub id: String,
    pub price: f64,
    pub tax: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderOutput {
    pub id: String,
    pub final_price: f64,
}

/// 最终价格计算用例
#[derive(Clone)]
pub struct CalculateFinalPrice {
    repository: Arc<dyn OrderRepository>,
}

impl CalculateFinalPrice {
    pub fn new(repository: Arc<dyn OrderRepository>) -> Self {
        Self { repository }
    }

    #[instrument(skip(self, input), fields(order_id = %input.id))]
    pub async fn execute(&self, input: OrderInput) -> Result<OrderOutput, ProcessorError> {
        let mut order = Order::new(input.id, input.price, input.tax)?;
        order.calculate_final_price()?;

        self.repository
            .save(&order)
            .await
            .map_err(ProcessorError::Persistence)?;

        debug!(final_price = order.final_price, "订单最终价格已计算并保存");

        Ok(OrderOutput {
            id: order.id,
            final_price: order.final_price,
        })
    }

    /// 已持久化订单总数
    pub async fn total_orders(&self) -> Result<i64, ProcessorError> {
        self.repository
            .count_all()
            .await
            .map_err(ProcessorError::Persistence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ValidationError;
    use crate::repository::MockOrderRepository;
    use mockall::predicate::*;
    use order_shared::error::OrderError;

    fn input(id: &str, price: f64, tax: f64) -> OrderInput {
        OrderInput {
            id: id.to_string(),
            price,
            tax,
        }
    }

    #[tokio::test]
    async fn test_execute_saves_priced_order() {
        let mut repo = MockOrderRepository::new();
        repo.expect_save()
            .with(eq(Order {
                id: "123".to_string(),
                price: 10.0,
                tax: 1.0,
                final_price: 11.0,
            }))
            .times(1)
            .returning(|_| Ok(()));

        let usecase = CalculateFinalPrice::new(Arc::new(repo));
        let output = usecase.execute(input("123", 10.0, 1.0)).await.unwrap();

        assert_eq!(
            output,
            OrderOutput {
                id: "123".to_string(),
                final_price: 11.0,
            }
        );
    }

    #[tokio::test]
    async fn test_execute_validation_failure_skips_save() {
        let mut repo = MockOrderRepository::new();
        repo.expect_save().never();

        let usecase = CalculateFinalPrice::new(Arc::new(repo));
        let err = usecase.execute(input("", 10.0, 1.0)).await.unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::Validation(ValidationError::EmptyId)
        ));

        let err = usecase.execute(input("1", 10.0, 0.0)).await.unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::Validation(ValidationError::NonPositiveTax)
        ));
    }

    #[tokio::test]
    async fn test_execute_propagates_persistence_error() {
        let mut repo = MockOrderRepository::new();
        repo.expect_save()
            .times(1)
            .returning(|_| Err(OrderError::Database(sqlx::Error::PoolTimedOut)));

        let usecase = CalculateFinalPrice::new(Arc::new(repo));
        let err = usecase.execute(input("1", 10.0, 1.0)).await.unwrap_err();

        assert!(matches!(err, ProcessorError::Persistence(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_total_orders() {
        let mut repo = MockOrderRepository::new();
        repo.expect_count_all().returning(|| Ok(7));

        let usecase = CalculateFinalPrice::new(Arc::new(repo));
        assert_eq!(usecase.total_orders().await.unwrap(), 7);
    }

    #[test]
    fn test_input_ignores_unknown_fields() {
        let parsed: OrderInput =
            serde_json::from_str(r#"{"id":"1234","price":10.0,"tax":1.0,"currency":"EUR"}"#)
                .unwrap();
        assert_eq!(parsed, input("1234", 10.0, 1.0));

        assert!(serde_json::from_str::<OrderInput>(r#"{"id":"1","price":"10","tax":1.0}"#).is_err());
        assert!(serde_json::from_str::<OrderInput>(r#"{"id":"1","price":10.0}"#).is_err());
    }
}
