//! Kafka 基础设施封装
//!
//! 将 rdkafka 的底层 API 封装为业务友好的 Producer/Consumer 抽象，
//! 统一消息序列化、错误映射、显式确认和优雅关闭语义。
//!
//! 消费者关闭了 `enable.auto.offset.store`：只有被 [`Acknowledger::ack`]
//! 确认过的消息位点才会进入自动提交，未确认的消息在进程重启后会被重新投递。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Header, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::KafkaConfig;
use crate::error::OrderError;

// ---------------------------------------------------------------------------
// Header 常量
// ---------------------------------------------------------------------------

pub mod headers {
    /// DLQ 重新投递时携带的已重试次数
    pub const DLQ_RETRY_COUNT: &str = "x-dlq-retry-count";
}

// ---------------------------------------------------------------------------
// ConsumerMessage
// ---------------------------------------------------------------------------

/// 消费到的 Kafka 消息的统一表示
///
/// 将 rdkafka 的 `BorrowedMessage`（带生命周期约束）转换为拥有所有权的结构体，
/// 使消息可以安全地跨 await 点和 channel 传递。
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub timestamp: Option<i64>,
    pub headers: HashMap<String, String>,
}

impl ConsumerMessage {
    /// 从 rdkafka 的借用消息构造，提取并拥有所有字段
    fn from_borrowed(msg: &BorrowedMessage<'_>) -> Self {
        let key = msg
            .key()
            .and_then(|k| std::str::from_utf8(k).ok())
            .map(String::from);

        let payload = msg.payload().map(|p| p.to_vec()).unwrap_or_default();

        let timestamp = msg.timestamp().to_millis();

        let mut headers = HashMap::new();
        if let Some(h) = msg.headers() {
            for idx in 0..h.count() {
                let header = h.get(idx);
                if let Some(raw) = header.value
                    && let Ok(value) = std::str::from_utf8(raw)
                {
                    headers.insert(header.key.to_string(), value.to_string());
                }
            }
        }

        Self {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key,
            payload,
            timestamp,
            headers,
        }
    }

    /// 消息标识：优先使用消息 key，没有 key 时用 topic/partition/offset 坐标
    pub fn message_id(&self) -> String {
        match &self.key {
            Some(key) if !key.is_empty() => key.clone(),
            _ => format!("{}-{}-{}", self.topic, self.partition, self.offset),
        }
    }

    /// DLQ 重新投递的次数，首次投递的消息为 0
    pub fn retry_count(&self) -> u32 {
        self.headers
            .get(headers::DLQ_RETRY_COUNT)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// 将 JSON 格式负载反序列化为目标类型
    pub fn deserialize_payload<T: DeserializeOwned>(&self) -> Result<T, OrderError> {
        serde_json::from_slice(&self.payload).map_err(OrderError::from)
    }
}

// ---------------------------------------------------------------------------
// Acknowledger
// ---------------------------------------------------------------------------

/// 消息确认接口
///
/// 确认是唯一的提交点：调用方必须在消息的全部副作用持久化之后才能确认。
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self, msg: &ConsumerMessage) -> Result<(), OrderError>;
}

/// 基于 offset store 的 Kafka 确认器
///
/// 与消费循环共享同一个 `StreamConsumer`，确认后由 librdkafka 在下一次
/// 自动提交时提交 `offset + 1`。
#[derive(Clone)]
pub struct KafkaAcknowledger {
    consumer: Arc<StreamConsumer>,
}

#[async_trait]
impl Acknowledger for KafkaAcknowledger {
    async fn ack(&self, msg: &ConsumerMessage) -> Result<(), OrderError> {
        self.consumer
            .store_offset(&msg.topic, msg.partition, msg.offset)
            .map_err(|e| OrderError::Kafka(format!("确认消息失败: {e}")))?;

        debug!(
            topic = %msg.topic,
            partition = msg.partition,
            offset = msg.offset,
            "消息已确认"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// KafkaProducer
// ---------------------------------------------------------------------------

/// 面向业务的 Kafka 生产者
///
/// 封装 `FutureProducer` 并提供类型安全的 JSON 发送方法，
/// 内部已派生 Clone（`FutureProducer` 本身是 Arc 包装的）。
#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
}

impl KafkaProducer {
    /// 根据配置创建生产者
    ///
    /// `message.timeout.ms` 为 5 秒，超时后由上层决定重试或放弃。
    pub fn new(config: &KafkaConfig) -> Result<Self, OrderError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| OrderError::Kafka(format!("创建生产者失败: {e}")))?;

        info!(brokers = %config.brokers, "Kafka 生产者已初始化");
        Ok(Self { producer })
    }

    /// 发送原始字节消息
    pub async fn send(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
    ) -> Result<(i32, i64), OrderError> {
        self.send_with_headers(topic, key, payload, &HashMap::new())
            .await
    }

    /// 携带 header 发送原始字节消息
    pub async fn send_with_headers(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
        headers: &HashMap<String, String>,
    ) -> Result<(i32, i64), OrderError> {
        let mut owned_headers = OwnedHeaders::new_with_capacity(headers.len());
        for (name, value) in headers {
            owned_headers = owned_headers.insert(Header {
                key: name.as_str(),
                value: Some(value.as_bytes()),
            });
        }

        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload)
            .headers(owned_headers);

        let delivery = self
            .producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| OrderError::Kafka(format!("发送消息失败: {e}")))?;

        debug!(
            topic,
            key,
            partition = delivery.partition,
            offset = delivery.offset,
            "消息已发送"
        );
        Ok((delivery.partition, delivery.offset))
    }

    /// 将值序列化为 JSON 后发送
    pub async fn send_json<T: Serialize>(
        &self,
        topic: &str,
        key: &str,
        value: &T,
    ) -> Result<(i32, i64), OrderError> {
        let payload = serde_json::to_vec(value)?;

        self.send(topic, key, &payload).await
    }
}

// ---------------------------------------------------------------------------
// KafkaConsumer
// ---------------------------------------------------------------------------

/// 面向业务的 Kafka 消费者
///
/// 封装 `StreamConsumer` 并提供基于 `watch` channel 的优雅关闭语义。
pub struct KafkaConsumer {
    consumer: Arc<StreamConsumer>,
}

impl KafkaConsumer {
    /// 创建消费者
    ///
    /// `group_id_suffix` 允许同一进程内不同消费逻辑使用独立的消费组，
    /// 例如 "order-processor" 和 "order-processor.dlq"。
    pub fn new(config: &KafkaConfig, group_id_suffix: Option<&str>) -> Result<Self, OrderError> {
        let group_id = match group_id_suffix {
            Some(suffix) => format!("{}.{}", config.consumer_group, suffix),
            None => config.consumer_group.clone(),
        };

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &group_id)
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .create()
            .map_err(|e| OrderError::Kafka(format!("创建消费者失败: {e}")))?;

        info!(brokers = %config.brokers, group_id, "Kafka 消费者已初始化");
        Ok(Self {
            consumer: Arc::new(consumer),
        })
    }

    /// 订阅指定的 topic 列表
    pub fn subscribe(&self, topics: &[&str]) -> Result<(), OrderError> {
        self.consumer
            .subscribe(topics)
            .map_err(|e| OrderError::Kafka(format!("订阅 topic 失败: {e}")))?;

        info!(?topics, "已订阅 Kafka topics");
        Ok(())
    }

    /// 获取与本消费者绑定的确认器
    pub fn acknowledger(&self) -> KafkaAcknowledger {
        KafkaAcknowledger {
            consumer: Arc::clone(&self.consumer),
        }
    }

    /// 启动消费循环
    ///
    /// 使用 `tokio::select!` 同时监听消息流和关闭信号：
    /// - 收到消息时调用 handler 处理；handler 返回错误只记录日志而不中断循环，
    ///   `OrderError::HandoffClosed` 除外，它表示下游已经不再接收消息。
    /// - 关闭信号变为 `true` 时退出循环，正在执行的 handler 会先自然完成。
    pub async fn start<F, Fut>(self, mut shutdown: watch::Receiver<bool>, handler: F)
    where
        F: Fn(ConsumerMessage) -> Fut,
        Fut: std::future::Future<Output = Result<(), OrderError>>,
    {
        use futures::StreamExt;

        let stream = self.consumer.stream();
        futures::pin_mut!(stream);

        info!("Kafka 消费循环已启动");

        loop {
            tokio::select! {
                // 偏向关闭信号，保证收到关闭时能尽快退出
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("收到关闭信号，Kafka 消费循环退出");
                        break;
                    }
                }

                msg_result = stream.next() => {
                    let Some(msg_result) = msg_result else {
                        warn!("Kafka 消息流意外结束");
                        break;
                    };

                    match msg_result {
                        Ok(borrowed_msg) => {
                            let msg = ConsumerMessage::from_borrowed(&borrowed_msg);
                            debug!(
                                topic = %msg.topic,
                                partition = msg.partition,
                                offset = msg.offset,
                                "收到 Kafka 消息"
                            );

                            match handler(msg).await {
                                Ok(()) => {}
                                Err(OrderError::HandoffClosed) => {
                                    warn!("下游交接通道已关闭，Kafka 消费循环退出");
                                    break;
                                }
                                Err(e) => error!(error = %e, "处理 Kafka 消息失败"),
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "接收 Kafka 消息出错");
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------
