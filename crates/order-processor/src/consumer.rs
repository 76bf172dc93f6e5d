//! 队列消费者
//!
//! 只负责把 Kafka 消息原样转交给 worker，不做解码和业务处理。
//! 每次转交都要等 worker 处理完这条消息才返回，消费循环在此期间不会拉取下一条，
//! 任意时刻在途的消息最多一条。

use order_shared::config::KafkaConfig;
use order_shared::error::OrderError;
use order_shared::kafka::{ConsumerMessage, KafkaAcknowledger, KafkaConsumer};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use crate::error::ProcessorError;

/// 转交给 worker 的一条消息
///
/// worker 处理完成（确认或进入死信）后通过 `done` 通知消费者。
#[derive(Debug)]
pub struct Handoff {
    pub msg: ConsumerMessage,
    pub done: oneshot::Sender<()>,
}

impl Handoff {
    /// 通知消费者本条消息已处理完毕
    pub fn complete(self) {
        // 消费者已退出时无需通知
        let _ = self.done.send(());
    }
}

/// 创建消费者与 worker 之间的交接通道
///
/// `forward` 会等待完成信号，所以通道里最多只有一条消息。
pub fn handoff_channel() -> (mpsc::Sender<Handoff>, mpsc::Receiver<Handoff>) {
    mpsc::channel(1)
}

/// 订单队列消费者
pub struct QueueConsumer {
    consumer: KafkaConsumer,
    topic: String,
}

impl QueueConsumer {
    /// 创建消费者并订阅订单 topic
    pub fn new(config: &KafkaConfig) -> Result<Self, ProcessorError> {
        let consumer = KafkaConsumer::new(config, None)?;
        consumer.subscribe(&[config.topic.as_str()])?;

        Ok(Self {
            consumer,
            topic: config.topic.clone(),
        })
    }

    /// 与本消费者共享底层连接的确认器，worker 用它确认已处理的消息
    pub fn acknowledger(&self) -> KafkaAcknowledger {
        self.consumer.acknowledger()
    }

    /// 启动消费循环，直到收到关闭信号或 worker 端关闭通道
    ///
    /// 返回时 `handoff` 被 drop，worker 处理完手上的消息后随之退出。
    pub async fn run(self, handoff: mpsc::Sender<Handoff>, shutdown: watch::Receiver<bool>) {
        info!(topic = %self.topic, "订单队列消费者已启动");

        self.consumer
            .start(shutdown, |msg| forward(&handoff, msg))
            .await;

        info!("订单队列消费者已停止");
    }
}

/// 把消息交给 worker，并等待 worker 处理完成
///
/// worker 已退出或未发出完成信号就丢弃了消息时返回 `HandoffClosed`。
pub async fn forward(handoff: &mpsc::Sender<Handoff>, msg: ConsumerMessage) -> Result<(), OrderError> {
    debug!(
        topic = %msg.topic,
        partition = msg.partition,
        offset = msg.offset,
        "转交消息"
    );

    let (done, finished) = oneshot::channel();
    handoff
        .send(Handoff { msg, done })
        .await
        .map_err(|_| OrderError::HandoffClosed)?;

    finished.await.map_err(|_| OrderError::HandoffClosed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_test::{assert_pending, assert_ready, task};

    fn message(offset: i64) -> ConsumerMessage {
        ConsumerMessage {
            topic: "orders".to_string(),
            partition: 0,
            offset,
            key: None,
            payload: br#"{"id":"1","price":10.0,"tax":1.0}"#.to_vec(),
            timestamp: None,
            headers: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_forward_passes_message_unmodified() {
        let (tx, mut rx) = handoff_channel();
        let worker = tokio::spawn(async move {
            let handoff = rx.recv().await.unwrap();
            let msg = handoff.msg.clone();
            handoff.complete();
            msg
        });

        forward(&tx, message(5)).await.unwrap();
        assert_eq!(worker.await.unwrap(), message(5));
    }

    #[tokio::test]
    async fn test_forward_blocks_while_worker_holds_message() {
        let (tx, mut rx) = handoff_channel();

        let mut first = task::spawn(forward(&tx, message(1)));
        assert_pending!(first.poll());

        // worker 已取走消息但尚未处理完，转交仍未返回
        let handoff = rx.recv().await.unwrap();
        assert_eq!(handoff.msg.offset, 1);
        assert_pending!(first.poll());

        handoff.complete();
        assert!(first.is_woken());
        assert_ready!(first.poll()).unwrap();
    }

    #[tokio::test]
    async fn test_forward_after_worker_gone() {
        let (tx, rx) = handoff_channel();
        drop(rx);

        let result = forward(&tx, message(1)).await;
        assert!(matches!(result, Err(OrderError::HandoffClosed)));
    }

    #[tokio::test]
    async fn test_forward_when_worker_drops_message() {
        let (tx, mut rx) = handoff_channel();
        let worker = tokio::spawn(async move {
            drop(rx.recv().await);
        });

        let result = forward(&tx, message(1)).await;
        assert!(matches!(result, Err(OrderError::HandoffClosed)));
        worker.await.unwrap();
    }
}
