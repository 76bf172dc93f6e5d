//! 死信队列处理
//!
//! 订单消息解码失败、校验失败或持久化重试耗尽后，会被写入死信队列（DLQ）。
//! 永久性失败（`maxRetries = 0`）只做归档；瞬时失败由 DLQ 消费者在
//! `nextRetryAt` 之后发回原始 topic，并通过 header 携带已重试次数。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::KafkaConfig;
use crate::error::OrderError;
use crate::kafka::{Acknowledger, ConsumerMessage, KafkaConsumer, KafkaProducer, headers};
use crate::observability::tracing as otel;
use crate::retry::RetryPolicy;

// ---------------------------------------------------------------------------
// DeadLetterMessage 死信消息信封
// ---------------------------------------------------------------------------

/// 死信消息信封
///
/// 包装原始消息，附加失败原因、重试次数等元数据，
/// 便于在死信队列消费时决定是重新投递还是永久归档。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterMessage {
    /// 原始消息 ID（消息 key 或 topic/partition/offset 坐标）
    pub message_id: String,
    /// 原始 topic
    pub source_topic: String,
    /// 原始消息内容，非 UTF-8 字节按有损方式转换
    pub payload: String,
    /// 失败原因
    pub error: String,
    /// 已重试次数
    pub retry_count: u32,
    /// 最大重试次数，0 表示永久失败
    pub max_retries: u32,
    pub first_failed_at: DateTime<Utc>,
    pub last_failed_at: DateTime<Utc>,
    /// 下次重试时间（None 表示不再重试）
    pub next_retry_at: Option<DateTime<Utc>>,
    /// 来源服务
    pub source_service: String,
}

impl DeadLetterMessage {
    /// 为永久性失败构造死信，不会被重新投递
    pub fn permanent(
        msg: &ConsumerMessage,
        error: impl Into<String>,
        source_service: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            message_id: msg.message_id(),
            source_topic: msg.topic.clone(),
            payload: String::from_utf8_lossy(&msg.payload).into_owned(),
            error: error.into(),
            retry_count: msg.retry_count(),
            max_retries: 0,
            first_failed_at: now,
            last_failed_at: now,
            next_retry_at: None,
            source_service: source_service.into(),
        }
    }

    /// 为瞬时失败构造死信
    ///
    /// 已重试次数取自消息 header；尚未耗尽时按退避策略计算下次重试时间。
    pub fn retryable(
        msg: &ConsumerMessage,
        error: impl Into<String>,
        source_service: impl Into<String>,
        retry_policy: &RetryPolicy,
    ) -> Self {
        let mut letter = Self::permanent(msg, error, source_service);
        letter.max_retries = retry_policy.max_retries;

        if letter.should_retry() {
            let delay = retry_policy.delay_for_attempt(letter.retry_count);
            letter.next_retry_at =
                Some(letter.last_failed_at + chrono::Duration::from_std(delay).unwrap_or_default());
        }
        letter
    }

    /// 只要已重试次数尚未达到上限，就允许继续尝试
    pub fn should_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// 距离下次重试还需等待的时间，已到期返回 None
    pub fn wait_time(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        self.next_retry_at
            .filter(|at| *at > now)
            .and_then(|at| (at - now).to_std().ok())
    }
}

// ---------------------------------------------------------------------------
// DeadLetterSink 死信出口
// ---------------------------------------------------------------------------

/// 死信出口
///
/// worker 只依赖这个接口，测试中可以替换为内存实现。
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// 将处理失败的消息写入死信队列
    ///
    /// `retryable` 为 false 时消息被永久归档。
    async fn dead_letter(
        &self,
        msg: &ConsumerMessage,
        error: &str,
        retryable: bool,
    ) -> Result<(), OrderError>;
}

// ---------------------------------------------------------------------------
// DlqProducer 将失败消息发送到死信队列
// ---------------------------------------------------------------------------

/// DLQ 生产者
pub struct DlqProducer {
    producer: KafkaProducer,
    topic: String,
    source_service: String,
    retry_policy: RetryPolicy,
}

impl DlqProducer {
    pub fn new(
        producer: KafkaProducer,
        config: &KafkaConfig,
        source_service: &str,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            producer,
            topic: config.dead_letter_topic.clone(),
            source_service: source_service.to_string(),
            retry_policy,
        }
    }

    /// 发送已构造好的死信信封
    pub async fn send_to_dlq(&self, letter: &DeadLetterMessage) -> Result<(), OrderError> {
        self.producer
            .send_json(&self.topic, &letter.message_id, letter)
            .await?;

        warn!(
            message_id = %letter.message_id,
            source_topic = %letter.source_topic,
            retry_count = letter.retry_count,
            max_retries = letter.max_retries,
            error = %letter.error,
            "消息已发送到死信队列"
        );
        Ok(())
    }
}

#[async_trait]
impl DeadLetterSink for DlqProducer {
    async fn dead_letter(
        &self,
        msg: &ConsumerMessage,
        error: &str,
        retryable: bool,
    ) -> Result<(), OrderError> {
        let letter = if retryable {
            DeadLetterMessage::retryable(msg, error, &self.source_service, &self.retry_policy)
        } else {
            DeadLetterMessage::permanent(msg, error, &self.source_service)
        };
        self.send_to_dlq(&letter).await
    }
}

// ---------------------------------------------------------------------------
// DlqConsumer 处理死信队列消息
// ---------------------------------------------------------------------------

/// DLQ 消费者
///
/// 持续消费死信队列，对尚有重试机会的消息等到 `nextRetryAt` 后重新投递到原始 topic。
/// 超过重试上限的消息记录日志以便人工介入。
pub struct DlqConsumer {
    consumer: KafkaConsumer,
    retry_producer: KafkaProducer,
}

impl DlqConsumer {
    /// 创建 DLQ 消费者
    ///
    /// 使用 `.dlq` 后缀作为独立消费组，与业务消费者互不干扰
    pub fn new(config: &KafkaConfig, retry_producer: KafkaProducer) -> Result<Self, OrderError> {
        let consumer = KafkaConsumer::new(config, Some("dlq"))?;
        consumer.subscribe(&[config.dead_letter_topic.as_str()])?;

        info!(topic = %config.dead_letter_topic, "DLQ 消费者已创建");

        Ok(Self {
            consumer,
            retry_producer,
        })
    }

    /// 启动 DLQ 消费循环
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let acknowledger: Arc<dyn Acknowledger> = Arc::new(self.consumer.acknowledger());
        let retry_producer = self.retry_producer;
        let handler_shutdown = shutdown.clone();

        self.consumer
            .start(shutdown, move |msg| {
                let producer = retry_producer.clone();
                let acknowledger = Arc::clone(&acknowledger);
                let shutdown = handler_shutdown.clone();
                async move {
                    if handle_dlq_message(&msg, &producer, shutdown).await? {
                        acknowledger.ack(&msg).await?;
                    }
                    Ok(())
                }
            })
            .await;

        info!("DLQ 消费循环已退出");
    }
}

/// 处理单条死信消息，返回该消息是否可以确认
///
/// - 仍可重试：等到重试时间后将原始 payload 发回 source_topic，header 中的重试次数加一
/// - 已耗尽或永久失败：记录错误日志，需要人工介入
/// - 等待期间收到关闭信号：不确认，重启后重新处理
async fn handle_dlq_message(
    msg: &ConsumerMessage,
    retry_producer: &KafkaProducer,
    mut shutdown: watch::Receiver<bool>,
) -> Result<bool, OrderError> {
    let letter: DeadLetterMessage = match msg.deserialize_payload() {
        Ok(letter) => letter,
        Err(e) => {
            error!(error = %e, offset = msg.offset, "无法解析死信信封，跳过");
            return Ok(true);
        }
    };

    if !letter.should_retry() {
        error!(
            message_id = %letter.message_id,
            source_topic = %letter.source_topic,
            source_service = %letter.source_service,
            retry_count = letter.retry_count,
            max_retries = letter.max_retries,
            first_failed_at = %letter.first_failed_at,
            last_failed_at = %letter.last_failed_at,
            error = %letter.error,
            "死信消息不再重试，需人工介入"
        );
        return Ok(true);
    }

    if let Some(wait) = letter.wait_time(Utc::now()) {
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.wait_for(|stop| *stop) => {
                info!(message_id = %letter.message_id, "等待重试期间收到关闭信号");
                return Ok(false);
            }
        }
    }

    let mut retry_headers = HashMap::new();
    retry_headers.insert(
        headers::DLQ_RETRY_COUNT.to_string(),
        (letter.retry_count + 1).to_string(),
    );
    otel::inject_to_headers(&mut retry_headers);

    retry_producer
        .send_with_headers(
            &letter.source_topic,
            &letter.message_id,
            letter.payload.as_bytes(),
            &retry_headers,
        )
        .await?;

    info!(
        message_id = %letter.message_id,
        source_topic = %letter.source_topic,
        retry_count = letter.retry_count + 1,
        max_retries = letter.max_retries,
        "死信消息已发回原始 topic"
    );
    Ok(true)
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------
