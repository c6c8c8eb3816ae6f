//! Kafka 基础设施封装
//!
//! 将 rdkafka 的底层 API 封装为业务友好的 Consumer 抽象，
//! 统一消息解码、错误映射和优雅关闭语义，避免各消费者重复编写样板代码。
//!
//! 确认语义为手动提交。提交 offset N+1 在 Kafka 中等于确认所有 <= N
//! 的消息，并发处理下不能按单条消息提交，否则后到消息的成功提交会
//! 把先前失败消息的位点一并带过去。因此每个分区跟踪在途位点，只在
//! 连续完成段推进时提交低水位；失败的消息阻塞其后位点的提交，由
//! broker 在重平衡或重启后重新投递（至少一次语义）。

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use futures::StreamExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Headers, Message};
use rdkafka::{Offset, TopicPartitionList};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::KafkaConfig;
use crate::error::NotifyError;

// ---------------------------------------------------------------------------
// Topic 常量
// ---------------------------------------------------------------------------

/// 集中管理所有 Kafka topic 名称，防止字符串散落在各消费者中导致拼写不一致
pub mod topics {
    pub const ORDER_EVENTS: &str = "order.events";
    pub const USER_EVENTS: &str = "user.events";
    pub const BLOG_EVENTS: &str = "blog.events";
}

// ---------------------------------------------------------------------------
// ConsumerMessage
// ---------------------------------------------------------------------------

/// 消费到的 Kafka 消息的统一表示
///
/// 将 rdkafka 的 `BorrowedMessage`（带生命周期约束）转换为拥有所有权的结构体，
/// 使消息可以安全地跨 await 点传递给异步处理函数。
#[derive(Debug, Clone)]
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

}

// ---------------------------------------------------------------------------
// OffsetTracker
// ---------------------------------------------------------------------------

/// 分区位点的低水位跟踪
///
/// 登记每条在途消息，处理成功后只在该分区的连续完成段推进时
/// 才产生一次提交。失败的消息留在登记表中，永久阻塞其后位点，
/// 进程重启或重平衡后 broker 从低水位重投这段消息。
#[derive(Default)]
struct OffsetTracker {
    partitions: Mutex<HashMap<(String, i32), BTreeMap<i64, bool>>>,
}

impl OffsetTracker {
    /// 登记一条在途消息，必须在进入并发槽位前按到达顺序调用
    fn register(&self, topic: &str, partition: i32, offset: i64) {
        self.lock()
            .entry((topic.to_string(), partition))
            .or_default()
            .insert(offset, false);
    }

    /// 标记一条消息处理成功
    ///
    /// 若该分区的连续完成段因此推进，返回应提交的位点
    /// （最后一个连续完成的 offset + 1），否则返回 None。
    fn complete(&self, topic: &str, partition: i32, offset: i64) -> Option<i64> {
        let mut partitions = self.lock();
        let pending = partitions.get_mut(&(topic.to_string(), partition))?;

        if let Some(done) = pending.get_mut(&offset) {
            *done = true;
        }

        let mut next_commit = None;
        while let Some((&head, &done)) = pending.first_key_value() {
            if !done {
                break;
            }
            pending.remove(&head);
            next_commit = Some(head + 1);
        }
        next_commit
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(String, i32), BTreeMap<i64, bool>>> {
        self.partitions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---------------------------------------------------------------------------
// KafkaConsumer
// ---------------------------------------------------------------------------

/// 面向业务的 Kafka 消费者
///
/// 封装 `StreamConsumer` 并提供基于 `watch` channel 的优雅关闭语义。
/// 关闭信号只停止拉取新消息，正在执行的 handler 会自然完成。
pub struct KafkaConsumer {
    consumer: StreamConsumer,
}

impl KafkaConsumer {
    /// 创建消费者
    ///
    /// `group_id_suffix` 让同一服务内不同事件族使用独立的消费组，
    /// 例如 "notification-worker.order" 和 "notification-worker.blog"。
    pub fn new(config: &KafkaConfig, group_id_suffix: Option<&str>) -> Result<Self, NotifyError> {
        let group_id = match group_id_suffix {
            Some(suffix) => format!("{}.{}", config.consumer_group, suffix),
            None => config.consumer_group.clone(),
        };

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &group_id)
            .set("auto.offset.reset", &config.auto_offset_reset)
            // 手动提交：处理成功才确认，失败的消息留给 broker 重投
            .set("enable.auto.commit", "false")
            .create()
            .map_err(|e| NotifyError::Kafka(format!("创建消费者失败: {e}")))?;

        info!(brokers = %config.brokers, group_id, "Kafka 消费者已初始化");
        Ok(Self { consumer })
    }

    /// 订阅指定的 topic 列表
    pub fn subscribe(&self, topics: &[&str]) -> Result<(), NotifyError> {
        self.consumer
            .subscribe(topics)
            .map_err(|e| NotifyError::Kafka(format!("订阅 topic 失败: {e}")))?;

        info!(?topics, "已订阅 Kafka topics");
        Ok(())
    }

    /// 启动消费循环
    ///
    /// 消息在 `worker_count` 个并发槽位内独立处理，互不阻塞；
    /// 单条消息之间不提供顺序保证。handler 的返回值决定确认结果：
    /// - `Ok` 时该位点标记完成，连续完成段推进时异步提交低水位；
    /// - `Err` 时只记录日志，该位点阻塞其后的提交，消息等待 broker 重投。
    ///
    /// 关闭信号（watch 值变为 true）停止拉取新消息，已经进入槽位的
    /// 消息会处理完毕后才返回。
    pub async fn start<F, Fut, E>(
        self,
        worker_count: usize,
        mut shutdown: watch::Receiver<bool>,
        handler: F,
    ) where
        F: Fn(ConsumerMessage) -> Fut,
        Fut: std::future::Future<Output = Result<(), E>>,
        E: std::fmt::Display,
    {
        let consumer = &self.consumer;
        let handler = &handler;
        let tracker = OffsetTracker::default();
        let tracker = &tracker;

        let stream = consumer.stream();

        info!(worker_count, "Kafka 消费循环已启动");

        stream
            .take_until(Box::pin(async move {
                // watch 值变为 true 时停止拉取新消息
                let _ = shutdown.wait_for(|stop| *stop).await;
            }))
            .for_each_concurrent(worker_count, |msg_result| {
                // 登记发生在进入并发槽位之前，保证按到达顺序
                if let Ok(borrowed) = &msg_result {
                    tracker.register(borrowed.topic(), borrowed.partition(), borrowed.offset());
                }

                async move {
                    match msg_result {
                        Ok(borrowed) => {
                            let msg = ConsumerMessage::from_borrowed(&borrowed);
                            let (topic, partition, offset) =
                                (msg.topic.clone(), msg.partition, msg.offset);
                            debug!(topic = %topic, partition, offset, "收到 Kafka 消息");

                            match handler(msg).await {
                                Ok(()) => {
                                    if let Some(next) =
                                        tracker.complete(&topic, partition, offset)
                                    {
                                        commit_low_watermark(consumer, &topic, partition, next);
                                    }
                                }
                                Err(e) => {
                                    // 该位点留在登记表中阻塞提交，等待 broker 重投
                                    error!(
                                        error = %e,
                                        topic = %topic,
                                        partition,
                                        offset,
                                        "处理 Kafka 消息失败"
                                    );
                                }
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "接收 Kafka 消息出错");
                        }
                    }
                }
            })
            .await;

        info!("Kafka 消费循环已退出");
    }
}

/// 将分区位点异步提交到 `next`（下一条待消费消息的 offset）
fn commit_low_watermark(consumer: &StreamConsumer, topic: &str, partition: i32, next: i64) {
    let mut tpl = TopicPartitionList::new();
    if let Err(e) = tpl.add_partition_offset(topic, partition, Offset::Offset(next)) {
        warn!(error = %e, topic, partition, next, "构造提交位点失败");
        return;
    }

    if let Err(e) = consumer.commit(&tpl, CommitMode::Async) {
        warn!(error = %e, topic, partition, next, "提交位点失败");
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------
