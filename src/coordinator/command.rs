//! 协调器邮箱消息
//!
//! 外部命令携带 oneshot 回复通道；WorkerUpdate 是生成任务回传给 Actor 的内部消息。

use std::time::Duration;

use tokio::sync::oneshot;

use super::record::{AgentSummary, GenerationRecord, PackageKind};
use crate::backend::BackendError;
use crate::core::{CoordinatorError, CoordinatorResult};

pub(crate) type Reply<T> = oneshot::Sender<CoordinatorResult<T>>;

/// 发往 Agent Actor 的命令
pub(crate) enum Command {
    Initialize {
        owner_address: String,
        package_kind: PackageKind,
        total_credits: u64,
        reply: Reply<AgentSummary>,
    },
    GetStatus {
        generation_id: Option<String>,
        reply: Reply<AgentSummary>,
    },
    Generate {
        prompt: String,
        is_video: bool,
        required_credits: u64,
        reply: Reply<GenerationTicket>,
    },
    NotifyMinted {
        generation_id: String,
        token_id: String,
        tx_hash: String,
        reply: Reply<GenerationRecord>,
    },
    AddCredits {
        amount: u64,
        reply: Reply<AgentSummary>,
    },
    Reinitialize {
        owner_address: String,
        package_kind: PackageKind,
        total_credits: u64,
        reply: Reply<AgentSummary>,
    },
    /// 空闲回收请求；Actor 空闲超过 idle_timeout 且无生成在途时回复 true 并退出
    Evict {
        idle_timeout: Duration,
        reply: oneshot::Sender<bool>,
    },
}

impl Command {
    /// 不处理，直接以错误回复
    pub(crate) fn reject(self, err: CoordinatorError) {
        match self {
            Command::Initialize { reply, .. }
            | Command::GetStatus { reply, .. }
            | Command::AddCredits { reply, .. }
            | Command::Reinitialize { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Command::Generate { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Command::NotifyMinted { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Command::Evict { reply, .. } => {
                let _ = reply.send(false);
            }
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Command::Initialize { .. } => "initialize",
            Command::GetStatus { .. } => "get_status",
            Command::Generate { .. } => "generate",
            Command::NotifyMinted { .. } => "notify_minted",
            Command::AddCredits { .. } => "add_credits",
            Command::Reinitialize { .. } => "reinitialize",
            Command::Evict { .. } => "evict",
        }
    }
}

/// generate 受理结果：Queued 状态的记录 + 生成结束时的通知
#[derive(Debug)]
pub struct GenerationTicket {
    pub generation: GenerationRecord,
    /// 生成到达终态（Completed / Failed）时收到最终记录；Actor 异常退出时被关闭
    pub completion: oneshot::Receiver<GenerationRecord>,
}

/// 生成任务 → Actor
#[derive(Debug)]
pub(crate) enum WorkerUpdate {
    Started {
        generation_id: String,
    },
    Progress {
        generation_id: String,
        progress: u8,
    },
    Finished {
        generation_id: String,
        outcome: Result<String, BackendError>,
    },
    /// 生成任务 panic 或被取消
    Crashed {
        generation_id: String,
        reason: String,
    },
}
