//! CoordinatorHandle：Actor 的可克隆句柄
//!
//! 每个方法发送一条命令并等待 oneshot 回复；邮箱关闭或回复被丢弃时返回 Unavailable。

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::command::{Command, GenerationTicket, Reply};
use super::record::{AgentSummary, GenerationRecord, PackageKind};
use crate::core::{CoordinatorError, CoordinatorResult, GenerationStage};

#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    identity: String,
    tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    pub(crate) fn new(identity: impl Into<String>, tx: mpsc::Sender<Command>) -> Self {
        Self {
            identity: identity.into(),
            tx,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Actor 是否已退出（被回收或启动失败）
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// 两个句柄是否指向同一个 Actor
    pub fn same_actor(&self, other: &CoordinatorHandle) -> bool {
        self.tx.same_channel(&other.tx)
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> CoordinatorResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| CoordinatorError::Unavailable)?;
        rx.await.map_err(|_| CoordinatorError::Unavailable)?
    }

    pub async fn initialize(
        &self,
        owner_address: impl Into<String>,
        package_kind: PackageKind,
        total_credits: u64,
    ) -> CoordinatorResult<AgentSummary> {
        let owner_address = owner_address.into();
        self.request(|reply| Command::Initialize {
            owner_address,
            package_kind,
            total_credits,
            reply,
        })
        .await
    }

    pub async fn get_status(
        &self,
        generation_id: Option<String>,
    ) -> CoordinatorResult<AgentSummary> {
        self.request(|reply| Command::GetStatus {
            generation_id,
            reply,
        })
        .await
    }

    /// 受理生成；返回时积分已扣除，生成在后台进行
    pub async fn generate(
        &self,
        prompt: impl Into<String>,
        is_video: bool,
        required_credits: u64,
    ) -> CoordinatorResult<GenerationTicket> {
        let prompt = prompt.into();
        self.request(|reply| Command::Generate {
            prompt,
            is_video,
            required_credits,
            reply,
        })
        .await
    }

    /// 受理并等待生成结束
    ///
    /// 受理之后的任何失败都报告为 BackendFailure（而非 Unavailable），调用方不会因重试而重复扣费。
    pub async fn generate_and_wait(
        &self,
        prompt: impl Into<String>,
        is_video: bool,
        required_credits: u64,
        wait_timeout: Duration,
    ) -> CoordinatorResult<GenerationRecord> {
        let ticket = self.generate(prompt, is_video, required_credits).await?;
        let generation_id = ticket.generation.id.clone();

        match tokio::time::timeout(wait_timeout, ticket.completion).await {
            Ok(Ok(generation)) if generation.stage == GenerationStage::Failed => {
                Err(CoordinatorError::BackendFailure(
                    generation
                        .error
                        .unwrap_or_else(|| "generation failed".to_string()),
                ))
            }
            Ok(Ok(generation)) => Ok(generation),
            Ok(Err(_)) => Err(CoordinatorError::BackendFailure(format!(
                "generation {} interrupted",
                generation_id
            ))),
            Err(_) => Err(CoordinatorError::BackendFailure(format!(
                "timed out waiting for generation {}",
                generation_id
            ))),
        }
    }

    pub async fn notify_minted(
        &self,
        generation_id: impl Into<String>,
        token_id: impl Into<String>,
        tx_hash: impl Into<String>,
    ) -> CoordinatorResult<GenerationRecord> {
        let (generation_id, token_id, tx_hash) =
            (generation_id.into(), token_id.into(), tx_hash.into());
        self.request(|reply| Command::NotifyMinted {
            generation_id,
            token_id,
            tx_hash,
            reply,
        })
        .await
    }

    pub async fn add_credits(&self, amount: u64) -> CoordinatorResult<AgentSummary> {
        self.request(|reply| Command::AddCredits { amount, reply })
            .await
    }

    pub async fn reinitialize(
        &self,
        owner_address: impl Into<String>,
        package_kind: PackageKind,
        total_credits: u64,
    ) -> CoordinatorResult<AgentSummary> {
        let owner_address = owner_address.into();
        self.request(|reply| Command::Reinitialize {
            owner_address,
            package_kind,
            total_credits,
            reply,
        })
        .await
    }

    /// 请求 Actor 在空闲超过 idle_timeout 时退出；返回是否已退出
    pub async fn evict(&self, idle_timeout: Duration) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(Command::Evict {
                idle_timeout,
                reply,
            })
            .await
            .is_err()
        {
            return true;
        }
        rx.await.unwrap_or(true)
    }
}
