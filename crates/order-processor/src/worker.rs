//! 订单 worker
//!
//! 从交接通道逐条取出消息并顺序处理，一条消息完成持久化与确认后才取下一条：
//!
//! ```text
//! Idle -> Decoding -> Processing -> Acknowledging -> Idle
//!            |             |
//!            +---------> Failed (死信，不确认)
//! ```
//!
//! 单条消息的失败只会让该消息进入死信队列，worker 本身继续运行。

use std::sync::Arc;
use std::time::{Duration, Instant};

use order_shared::dlq::DeadLetterSink;
use order_shared::kafka::{Acknowledger, ConsumerMessage};
use order_shared::observability::{metrics, tracing as otel};
use order_shared::retry::{RetryPolicy, retry_with_policy};
use tokio::sync::{mpsc, watch};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::consumer::Handoff;
use crate::error::ProcessorError;
use crate::usecase::{CalculateFinalPrice, OrderInput, OrderOutput};

/// 单条消息的最终状态
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    /// 已持久化并确认
    Acknowledged(OrderOutput),
    /// 已持久化，但确认失败，消息可能被重复投递
    AcknowledgeFailed(OrderOutput),
    /// 已发往死信队列，未确认
    DeadLettered {
        reason: &'static str,
        retryable: bool,
    },
}

/// 订单 worker
pub struct OrderWorker {
    usecase: CalculateFinalPrice,
    acknowledger: Arc<dyn Acknowledger>,
    dead_letters: Arc<dyn DeadLetterSink>,
    retry_policy: RetryPolicy,
}

impl OrderWorker {
    pub fn new(
        usecase: CalculateFinalPrice,
        acknowledger: Arc<dyn Acknowledger>,
        dead_letters: Arc<dyn DeadLetterSink>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            usecase,
            acknowledger,
            dead_letters,
            retry_policy,
        }
    }

    /// 处理循环，交接通道关闭后退出
    pub async fn run(self, mut inbox: mpsc::Receiver<Handoff>) {
        info!("订单 worker 已启动");

        while let Some(handoff) = inbox.recv().await {
            let msg = &handoff.msg;
            let span = info_span!(
                "process_order_message",
                topic = %msg.topic,
                partition = msg.partition,
                offset = msg.offset,
            );
            otel::set_parent_from_headers(&span, &msg.headers);

            self.process_message(msg).instrument(span).await;
            handoff.complete();
        }

        info!("交接通道已关闭，订单 worker 退出");
    }

    /// 处理单条消息：解码、计算并持久化、确认
    pub async fn process_message(&self, msg: &ConsumerMessage) -> MessageOutcome {
        let started = Instant::now();
        debug!(
            topic = %msg.topic,
            partition = msg.partition,
            offset = msg.offset,
            "Idle -> Decoding"
        );

        let input: OrderInput = match msg.deserialize_payload() {
            Ok(input) => input,
            Err(e) => {
                let err = ProcessorError::Decode(e.to_string());
                return self.dead_letter(msg, &err, started).await;
            }
        };

        debug!(order_id = %input.id, offset = msg.offset, "Decoding -> Processing");

        let result = retry_with_policy(
            &self.retry_policy,
            "calculate_final_price",
            ProcessorError::is_retryable,
            || self.usecase.execute(input.clone()),
        )
        .await;

        let output = match result {
            Ok(output) => output,
            Err(err) => return self.dead_letter(msg, &err, started).await,
        };

        debug!(order_id = %output.id, offset = msg.offset, "Processing -> Acknowledging");

        let outcome = match self.acknowledger.ack(msg).await {
            Ok(()) => {
                info!(
                    order_id = %output.id,
                    final_price = output.final_price,
                    "订单处理完成"
                );
                metrics::record_order_processed("acknowledged", started.elapsed().as_secs_f64());
                MessageOutcome::Acknowledged(output)
            }
            Err(e) => {
                let err = ProcessorError::Acknowledge(e.to_string());
                warn!(
                    order_id = %output.id,
                    offset = msg.offset,
                    error = %err,
                    "订单已保存但确认失败，消息可能被重复投递"
                );
                metrics::record_order_processed(
                    "acknowledge_failed",
                    started.elapsed().as_secs_f64(),
                );
                MessageOutcome::AcknowledgeFailed(output)
            }
        };

        debug!(offset = msg.offset, "Acknowledging -> Idle");

        outcome
    }

    /// 发往死信队列，不确认原消息
    async fn dead_letter(
        &self,
        msg: &ConsumerMessage,
        err: &ProcessorError,
        started: Instant,
    ) -> MessageOutcome {
        let reason = err.reason();
        let retryable = err.is_retryable();

        warn!(
            topic = %msg.topic,
            partition = msg.partition,
            offset = msg.offset,
            reason,
            retryable,
            error = %err,
            "订单消息处理失败 -> Failed"
        );

        if let Err(e) = self
            .dead_letters
            .dead_letter(msg, &err.to_string(), retryable)
            .await
        {
            error!(
                offset = msg.offset,
                error = %e,
                "发送到死信队列失败，消息可能丢失"
            );
        }

        metrics::record_dead_letter(reason);
        metrics::record_order_processed("dead_lettered", started.elapsed().as_secs_f64());

        MessageOutcome::DeadLettered { reason, retryable }
    }
}

/// 定期刷新已持久化订单数，收到关闭信号后退出
///
/// 计数查询放在独立任务里，不占用 worker 的处理路径。
pub async fn report_persisted_orders(
    usecase: CalculateFinalPrice,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => match usecase.total_orders().await {
                Ok(count) => {
                    metrics::set_persisted_orders(count);
                    debug!(persisted_orders = count, "已持久化订单数");
                }
                Err(e) => warn!(error = %e, "统计已持久化订单数失败"),
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    debug!("已持久化订单数统计任务退出");
}
