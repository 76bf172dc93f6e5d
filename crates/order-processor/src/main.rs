//! 订单处理服务
//!
//! 启动顺序：配置 -> 可观测性 -> 仓储 -> Kafka 消费者与 DLQ 生产者 -> worker。
//! 关闭时先停止消费者，worker 处理完手上的消息后退出，最后关闭连接池。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use order_shared::{
    config::AppConfig,
    database::Database,
    dlq::{DlqConsumer, DlqProducer},
    kafka::KafkaProducer,
    observability,
    retry::RetryPolicy,
};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use order_processor::{
    consumer::{QueueConsumer, handoff_channel},
    repository::{InMemoryOrderRepository, OrderRepository, PgOrderRepository},
    usecase::CalculateFinalPrice,
    worker::{OrderWorker, report_persisted_orders},
};

const SERVICE_NAME: &str = "order-processor";

/// 已持久化订单数的刷新周期
const PERSISTED_ORDERS_REPORT_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Parser, Debug)]
#[command(name = "order-processor", about = "订单处理服务")]
struct Cli {
    /// 使用内存仓储，不连接数据库
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. 加载配置
    let config = AppConfig::load(SERVICE_NAME)?;

    // 2. 初始化可观测性
    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!(
        environment = %config.environment,
        topic = %config.kafka.topic,
        in_memory = cli.in_memory,
        "正在启动订单处理服务..."
    );

    // 3. 仓储
    let (repository, database) = if cli.in_memory {
        let repo: Arc<dyn OrderRepository> = Arc::new(InMemoryOrderRepository::new());
        (repo, None)
    } else {
        let db = Database::connect(&config.database).await?;
        db.health_check().await?;
        let repo = PgOrderRepository::new(db.pool().clone());
        repo.ensure_schema().await?;
        let repo: Arc<dyn OrderRepository> = Arc::new(repo);
        (repo, Some(db))
    };
    let usecase = CalculateFinalPrice::new(repository);

    // 4. Kafka
    let retry_policy = RetryPolicy::from(&config.retry);
    let producer = KafkaProducer::new(&config.kafka)?;
    let dead_letters = Arc::new(DlqProducer::new(
        producer.clone(),
        &config.kafka,
        &config.service_name,
        retry_policy.clone(),
    ));
    let consumer = QueueConsumer::new(&config.kafka)?;
    let acknowledger = Arc::new(consumer.acknowledger());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (handoff_tx, handoff_rx) = handoff_channel();

    // 5. 启动任务
    let consumer_task = tokio::spawn(consumer.run(handoff_tx, shutdown_rx.clone()));
    let reporter_task = tokio::spawn(report_persisted_orders(
        usecase.clone(),
        PERSISTED_ORDERS_REPORT_INTERVAL,
        shutdown_rx.clone(),
    ));

    let dlq_task = if config.dlq.enabled {
        let dlq_consumer = DlqConsumer::new(&config.kafka, producer)?;
        Some(tokio::spawn(dlq_consumer.run(shutdown_rx)))
    } else {
        None
    };

    let worker = OrderWorker::new(usecase, acknowledger, dead_letters, retry_policy);
    let worker_task = tokio::spawn(worker.run(handoff_rx));

    info!("订单处理服务已启动");

    // 6. 优雅关闭
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    consumer_task.await?;
    worker_task.await?;
    reporter_task.await?;
    if let Some(task) = dlq_task {
        task.await?;
    }

    if let Some(db) = database {
        db.close().await;
    }

    info!("订单处理服务已关闭");
    Ok(())
}

/// 监听 Ctrl+C 和 SIGTERM 信号
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "无法监听 Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "无法监听 SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到 Ctrl+C，开始优雅关闭...");
        }
        _ = terminate => {
            info!("收到 SIGTERM，开始优雅关闭...");
        }
    }
}
