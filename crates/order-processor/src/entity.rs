//! 订单实体
//!
//! 最终价格只能由 [`Order::calculate_final_price`] 推导，计算前为 0.0。

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 订单校验错误
///
/// 校验按 id、price、tax 的固定顺序进行，返回第一个失败项。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("订单 id 不能为空")]
    EmptyId,

    #[error("价格必须大于 0")]
    NonPositivePrice,

    #[error("税费必须大于 0")]
    NonPositiveTax,
}

/// 订单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub price: f64,
    pub tax: f64,
    pub final_price: f64,
}

impl Order {
    /// 创建订单并立即校验
    pub fn new(id: impl Into<String>, price: f64, tax: f64) -> Result<Self, ValidationError> {
        let order = Self {
            id: id.into(),
            price,
            tax,
            final_price: 0.0,
        };
        order.validate()?;
        Ok(order)
    }

    /// 校验订单字段
    ///
    /// NaN 不满足 `> 0`，按非正数处理。
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if !(self.price > 0.0) {
            return Err(ValidationError::NonPositivePrice);
        }
        if !(self.tax > 0.0) {
            return Err(ValidationError::NonPositiveTax);
        }
        Ok(())
    }

    /// 计算最终价格 `price + tax`，校验失败时不修改 final_price
    pub fn calculate_final_price(&mut self) -> Result<(), ValidationError> {
        self.validate()?;
        self.final_price = self.price + self.tax;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unchecked(id: &str, price: f64, tax: f64) -> Order {
        Order {
            id: id.to_string(),
            price,
            tax,
            final_price: 0.0,
        }
    }

    #[test]
    fn test_empty_id() {
        assert_eq!(
            unchecked("", 10.0, 1.0).validate(),
            Err(ValidationError::EmptyId)
        );
        // id 检查优先于其他字段
        assert_eq!(
            unchecked("", -1.0, -1.0).validate(),
            Err(ValidationError::EmptyId)
        );
    }

    #[test]
    fn test_non_positive_price() {
        assert_eq!(
            unchecked("1", 0.0, 1.0).validate(),
            Err(ValidationError::NonPositivePrice)
        );
        assert_eq!(
            unchecked("1", -5.0, -1.0).validate(),
            Err(ValidationError::NonPositivePrice)
        );
        assert_eq!(
            unchecked("1", f64::NAN, 1.0).validate(),
            Err(ValidationError::NonPositivePrice)
        );
    }

    #[test]
    fn test_non_positive_tax() {
        assert_eq!(
            unchecked("1", 10.0, 0.0).validate(),
            Err(ValidationError::NonPositiveTax)
        );
        assert_eq!(
            unchecked("1", 10.0, f64::NAN).validate(),
            Err(ValidationError::NonPositiveTax)
        );
    }

    #[test]
    fn test_new_order_validates() {
        let order = Order::new("123", 10.0, 1.0).unwrap();
        assert_eq!(order.final_price, 0.0);
        assert_eq!(
            Order::new("123", 10.0, -1.0),
            Err(ValidationError::NonPositiveTax)
        );
    }

    #[test]
    fn test_calculate_final_price() {
        let mut order = Order::new("123", 10.0, 1.0).unwrap();
        order.calculate_final_price().unwrap();
        assert_eq!(order.final_price, 11.0);

        let mut order = Order::new("x", 0.1, 0.2).unwrap();
        order.calculate_final_price().unwrap();
        assert_eq!(order.final_price, 0.1 + 0.2);
    }

    #[test]
    fn test_calculate_final_price_leaves_invalid_order_untouched() {
        let mut order = unchecked("1", 10.0, 1.0);
        order.final_price = 42.0;
        order.tax = 0.0;

        assert_eq!(
            order.calculate_final_price(),
            Err(ValidationError::NonPositiveTax)
        );
        assert_eq!(order.final_price, 42.0);
    }

    #[test]
    fn test_validate_is_repeatable() {
        let valid = unchecked("123", 10.0, 1.0);
        let invalid = unchecked("123", 10.0, 0.0);
        for _ in 0..3 {
            assert_eq!(valid.validate(), Ok(()));
            assert_eq!(invalid.validate(), Err(ValidationError::NonPositiveTax));
        }
    }
}
