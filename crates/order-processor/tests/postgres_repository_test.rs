//! PostgreSQL 仓储集成测试
//!
//! 需要可用的数据库，通过 `DATABASE_URL` 指定，默认忽略：
//! `cargo test -p order-processor -- --ignored`

use order_processor::entity::Order;
use order_processor::repository::{OrderRepository, PgOrderRepository};
use order_shared::config::DatabaseConfig;
use order_shared::database::Database;

async fn repository() -> (Database, PgOrderRepository) {
    let config = DatabaseConfig {
        url: std::env::var("DATABASE_URL").unwrap_or_else(|_| DatabaseConfig::default().url),
        ..DatabaseConfig::default()
    };
    let db = Database::connect(&config).await.unwrap();
    let repo = PgOrderRepository::new(db.pool().clone());
    repo.ensure_schema().await.unwrap();
    (db, repo)
}

fn unique_id(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{prefix}-{nanos}")
}

#[tokio::test]
#[ignore] // 需要数据库连接
async fn test_save_appends_row() {
    let (db, repo) = repository().await;
    let before = repo.count_all().await.unwrap();

    let mut order = Order::new(unique_id("pg-save"), 10.0, 1.0).unwrap();
    order.calculate_final_price().unwrap();
    repo.save(&order).await.unwrap();

    assert_eq!(repo.count_all().await.unwrap(), before + 1);

    let final_price: f64 = sqlx::query_scalar("SELECT final_price FROM orders WHERE id = $1")
        .bind(&order.id)
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(final_price, 11.0);

    db.close().await;
}

#[tokio::test]
#[ignore] // 需要数据库连接
async fn test_redelivered_order_is_appended_again() {
    let (db, repo) = repository().await;

    let mut order = Order::new(unique_id("pg-dup"), 5.0, 0.5).unwrap();
    order.calculate_final_price().unwrap();
    repo.save(&order).await.unwrap();
    repo.save(&order).await.unwrap();

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE id = $1")
        .bind(&order.id)
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(rows, 2);

    db.close().await;
}

#[tokio::test]
#[ignore] // 需要数据库连接
async fn test_ensure_schema_is_repeatable() {
    let (db, repo) = repository().await;
    repo.ensure_schema().await.unwrap();
    db.close().await;
}
