//! Agent 事件：状态变化、生成进度、积分与铸造通知
//!
//! 每个 Agent 一个 broadcast 通道，按发布顺序投递；不回放历史，订阅之后的事件才会收到。
//! 没有订阅者时发布即丢弃，不影响协调器。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use crate::coordinator::{GenerationRecord, MintInfo};
use crate::core::AgentStatus;

/// 推送给订阅者的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    StatusChanged {
        from: AgentStatus,
        to: AgentStatus,
    },
    GenerationQueued {
        generation_id: String,
        is_video: bool,
        credits: u64,
    },
    /// 后端开始处理（Queued → InProgress）
    GenerationStarted {
        generation_id: String,
    },
    GenerationProgress {
        generation_id: String,
        progress: u8,
    },
    GenerationCompleted {
        generation_id: String,
        result_ref: String,
    },
    GenerationFailed {
        generation_id: String,
        error: String,
    },
    CreditsRefunded {
        generation_id: String,
        amount: u64,
        available: u64,
    },
    CreditsAdded {
        amount: u64,
        total: u64,
    },
    Minted {
        generation_id: String,
        mint_info: MintInfo,
    },
}

impl AgentEvent {
    pub fn queued(generation: &GenerationRecord) -> Self {
        AgentEvent::GenerationQueued {
            generation_id: generation.id.clone(),
            is_video: generation.is_video,
            credits: generation.credits,
        }
    }

    /// 事件类型名（SSE 的 event 字段）
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::StatusChanged { .. } => "status_changed",
            AgentEvent::GenerationQueued { .. } => "generation_queued",
            AgentEvent::GenerationStarted { .. } => "generation_started",
            AgentEvent::GenerationProgress { .. } => "generation_progress",
            AgentEvent::GenerationCompleted { .. } => "generation_completed",
            AgentEvent::GenerationFailed { .. } => "generation_failed",
            AgentEvent::CreditsRefunded { .. } => "credits_refunded",
            AgentEvent::CreditsAdded { .. } => "credits_added",
            AgentEvent::Minted { .. } => "minted",
        }
    }
}

/// 带身份与时间戳的事件信封
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: String,
    pub identity: String,
    pub timestamp: i64,
    pub event: AgentEvent,
}

impl EventEnvelope {
    pub fn new(identity: impl Into<String>, event: AgentEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            identity: identity.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            event,
        }
    }
}

/// 按 identity 分发的事件通道
pub struct EventChannel {
    senders: RwLock<HashMap<String, broadcast::Sender<EventEnvelope>>>,
    buffer: usize,
}

impl EventChannel {
    pub fn new(buffer: usize) -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// 发布事件，返回收到事件的订阅者数
    pub async fn publish(&self, identity: &str, event: AgentEvent) -> usize {
        let senders = self.senders.read().await;
        let Some(tx) = senders.get(identity) else {
            return 0;
        };
        tracing::debug!(identity = %identity, kind = event.kind(), "Publishing event");
        tx.send(EventEnvelope::new(identity, event)).unwrap_or(0)
    }

    /// 订阅某个 Agent 的事件（Agent 不必已存在）
    pub async fn subscribe(&self, identity: &str) -> broadcast::Receiver<EventEnvelope> {
        if let Some(tx) = self.senders.read().await.get(identity) {
            return tx.subscribe();
        }
        let mut senders = self.senders.write().await;
        senders
            .entry(identity.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer).0)
            .subscribe()
    }

    pub async fn subscriber_count(&self, identity: &str) -> usize {
        self.senders
            .read()
            .await
            .get(identity)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// 移除已无订阅者的通道，返回移除数量
    pub async fn prune(&self) -> usize {
        let mut senders = self.senders.write().await;
        let before = senders.len();
        senders.retain(|_, tx| tx.receiver_count() > 0);
        before - senders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let channel = EventChannel::new(8);
        let delivered = channel
            .publish(
                "a1",
                AgentEvent::CreditsAdded {
                    amount: 10,
                    total: 110,
                },
            )
            .await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_events_delivered_in_order() {
        let channel = EventChannel::new(8);
        let mut rx = channel.subscribe("a1").await;

        for progress in [10u8, 50, 90] {
            channel
                .publish(
                    "a1",
                    AgentEvent::GenerationProgress {
                        generation_id: "gen_1".to_string(),
                        progress,
                    },
                )
                .await;
        }

        for expected in [10u8, 50, 90] {
            let envelope = rx.recv().await.unwrap();
            assert_eq!(envelope.identity, "a1");
            assert_eq!(
                envelope.event,
                AgentEvent::GenerationProgress {
                    generation_id: "gen_1".to_string(),
                    progress: expected,
                }
            );
        }
    }

    #[tokio::test]
    async fn test_identities_are_isolated() {
        let channel = EventChannel::new(8);
        let mut rx_b = channel.subscribe("b").await;
        let _rx_a = channel.subscribe("a").await;

        channel
            .publish(
                "a",
                AgentEvent::CreditsAdded {
                    amount: 1,
                    total: 1,
                },
            )
            .await;
        assert!(matches!(
            rx_b.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_prune_drops_idle_channels() {
        let channel = EventChannel::new(8);
        let rx = channel.subscribe("a1").await;
        assert_eq!(channel.subscriber_count("a1").await, 1);
        assert_eq!(channel.prune().await, 0);

        drop(rx);
        assert_eq!(channel.prune().await, 1);
        assert_eq!(channel.subscriber_count("a1").await, 0);
    }

    #[test]
    fn test_event_json_shape() {
        let envelope = EventEnvelope::new(
            "a1",
            AgentEvent::StatusChanged {
                from: AgentStatus::Ready,
                to: AgentStatus::Generating,
            },
        );
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["identity"], "a1");
        assert_eq!(json["event"]["type"], "status_changed");
        assert_eq!(json["event"]["to"], "generating");
    }
}
