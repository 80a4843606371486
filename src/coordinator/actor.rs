//! Agent Actor：每个 identity 一个 tokio 任务，独占 AgentRecord
//!
//! 命令按到达顺序逐个处理，处理期间不 await 后端；生成在独立任务中运行，
//! 进度与结果通过内部通道回到 Actor 再写入记录，因此生成期间 get_status 仍可立即应答。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::command::{Command, GenerationTicket, WorkerUpdate};
use super::handle::CoordinatorHandle;
use super::record::{AgentRecord, GenerationRecord};
use crate::backend::{BackendError, GenerationBackend, GenerationRequest, ProgressReporter};
use crate::config::{AppConfig, CreditPolicy};
use crate::core::{AgentStatus, CoordinatorError};
use crate::events::{AgentEvent, EventChannel};
use crate::store::{RecordStore, StoreError};

/// Actor 运行参数
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub mailbox_capacity: usize,
    pub backend_timeout: Duration,
    pub credit_policy: CreditPolicy,
}

impl CoordinatorSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            mailbox_capacity: cfg.coordinator.mailbox_capacity.max(1),
            backend_timeout: cfg.backend.timeout(),
            credit_policy: cfg.credits.policy,
        }
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// 所有 Actor 共享的依赖
pub struct CoordinatorContext {
    pub backend: Arc<dyn GenerationBackend>,
    pub store: Arc<dyn RecordStore>,
    pub events: Arc<EventChannel>,
    pub settings: CoordinatorSettings,
}

impl CoordinatorContext {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        store: Arc<dyn RecordStore>,
        events: Arc<EventChannel>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            backend,
            store,
            events,
            settings,
        }
    }
}

pub(crate) struct AgentActor {
    record: AgentRecord,
    context: Arc<CoordinatorContext>,
    updates_tx: mpsc::UnboundedSender<WorkerUpdate>,
    /// generation_id → 等待终态的调用方
    waiters: HashMap<String, oneshot::Sender<GenerationRecord>>,
    last_active: Instant,
    /// 最近一次写入存储失败，内存记录比存储新
    unsaved: bool,
}

impl AgentActor {
    /// 启动 Actor 任务并返回其句柄
    pub(crate) fn spawn(
        identity: &str,
        context: Arc<CoordinatorContext>,
    ) -> (CoordinatorHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(context.settings.mailbox_capacity);
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let actor = AgentActor {
            record: AgentRecord::new(identity),
            context,
            updates_tx,
            waiters: HashMap::new(),
            last_active: Instant::now(),
            unsaved: false,
        };
        let task = tokio::spawn(actor.run(rx, updates_rx));
        (CoordinatorHandle::new(identity, tx), task)
    }

    fn identity(&self) -> &str {
        &self.record.identity
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut updates: mpsc::UnboundedReceiver<WorkerUpdate>,
    ) {
        if let Err(e) = self.restore().await {
            tracing::error!(identity = %self.identity(), "Failed to load agent record: {}", e);
            drain_unavailable(&mut commands).await;
            return;
        }
        tracing::debug!(identity = %self.identity(), status = %self.record.status, "Agent actor started");

        let mut commands_open = true;
        loop {
            tokio::select! {
                Some(update) = updates.recv() => {
                    self.handle_update(update).await;
                }
                command = commands.recv(), if commands_open => {
                    match command {
                        Some(Command::Evict { idle_timeout, reply }) => {
                            if self.unsaved {
                                self.persist().await;
                            }
                            if self.can_evict(idle_timeout) {
                                let _ = reply.send(true);
                                tracing::debug!(identity = %self.identity(), "Agent actor evicted");
                                drain_unavailable(&mut commands).await;
                                return;
                            }
                            let _ = reply.send(false);
                        }
                        Some(command) => {
                            self.last_active = Instant::now();
                            self.handle_command(command).await;
                        }
                        None => commands_open = false,
                    }
                }
                else => break,
            }

            // 所有句柄都已释放：等在途生成落地后退出
            if !commands_open && self.record.status != AgentStatus::Generating {
                break;
            }
        }
        if self.unsaved {
            self.persist().await;
        }
        tracing::debug!(identity = %self.identity(), "Agent actor stopped");
    }

    /// 未落盘的记录不能回收，否则下次启动会从旧状态恢复
    fn can_evict(&self, idle_timeout: Duration) -> bool {
        !self.unsaved
            && self.record.status != AgentStatus::Generating
            && self.waiters.is_empty()
            && self.last_active.elapsed() >= idle_timeout
    }

    /// 从存储恢复记录；中断的生成按积分策略标记失败
    async fn restore(&mut self) -> Result<(), StoreError> {
        let Some(stored) = self.context.store.load(self.identity()).await? else {
            return Ok(());
        };
        self.record = stored;

        let refund = self.context.settings.credit_policy.refunds_on_failure();
        let recovered = self.record.recover_interrupted(refund);
        if !recovered.is_empty() {
            for (generation_id, refunded) in &recovered {
                tracing::warn!(
                    identity = %self.identity(),
                    generation_id = %generation_id,
                    refunded,
                    "Generation interrupted by restart, marked failed"
                );
            }
            self.persist().await;
        }
        Ok(())
    }

    async fn persist(&mut self) {
        match self.context.store.save(&self.record).await {
            Ok(()) => {
                if self.unsaved {
                    tracing::info!(identity = %self.identity(), "Agent record persisted after earlier failure");
                }
                self.unsaved = false;
            }
            Err(e) => {
                tracing::error!(identity = %self.identity(), "Failed to persist agent record: {}", e);
                self.unsaved = true;
            }
        }
    }

    async fn publish(&self, event: AgentEvent) {
        self.context.events.publish(self.identity(), event).await;
    }

    async fn status_changed(&self, from: AgentStatus) {
        let to = self.record.status;
        if from != to {
            self.publish(AgentEvent::StatusChanged { from, to }).await;
        }
    }

    async fn handle_command(&mut self, command: Command) {
        tracing::debug!(identity = %self.identity(), command = command.name(), "Handling command");
        match command {
            Command::Initialize {
                owner_address,
                package_kind,
                total_credits,
                reply,
            } => {
                if let Err(e) =
                    self.record
                        .begin_initialize(&owner_address, package_kind, total_credits)
                {
                    let _ = reply.send(Err(e));
                    return;
                }
                self.status_changed(AgentStatus::Uninitialized).await;
                self.record.finish_initialize();
                self.persist().await;
                self.status_changed(AgentStatus::Initializing).await;
                tracing::info!(
                    identity = %self.identity(),
                    package = %package_kind,
                    total_credits,
                    "Agent initialized"
                );
                let _ = reply.send(self.record.summary(None));
            }
            Command::GetStatus {
                generation_id,
                reply,
            } => {
                let _ = reply.send(self.record.summary(generation_id.as_deref()));
            }
            Command::Generate {
                prompt,
                is_video,
                required_credits,
                reply,
            } => {
                let from = self.record.status;
                let generation =
                    match self
                        .record
                        .admit_generation(&prompt, is_video, required_credits)
                    {
                        Ok(generation) => generation,
                        Err(e) => {
                            tracing::debug!(identity = %self.identity(), "Generate rejected: {}", e);
                            let _ = reply.send(Err(e));
                            return;
                        }
                    };
                self.persist().await;
                self.publish(AgentEvent::queued(&generation)).await;
                self.status_changed(from).await;
                tracing::info!(
                    identity = %self.identity(),
                    generation_id = %generation.id,
                    is_video,
                    credits = required_credits,
                    "Generation queued"
                );

                self.spawn_worker(&generation);
                let (completion_tx, completion) = oneshot::channel();
                self.waiters.insert(generation.id.clone(), completion_tx);
                let _ = reply.send(Ok(GenerationTicket {
                    generation,
                    completion,
                }));
            }
            Command::NotifyMinted {
                generation_id,
                token_id,
                tx_hash,
                reply,
            } => match self.record.record_mint(&generation_id, &token_id, &tx_hash) {
                Ok(generation) => {
                    self.persist().await;
                    if let Some(mint_info) = generation.mint_info.clone() {
                        self.publish(AgentEvent::Minted {
                            generation_id: generation.id.clone(),
                            mint_info,
                        })
                        .await;
                    }
                    tracing::info!(
                        identity = %self.identity(),
                        generation_id = %generation_id,
                        token_id = %token_id,
                        "Generation minted"
                    );
                    let _ = reply.send(Ok(generation));
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::AddCredits { amount, reply } => match self.record.add_credits(amount) {
                Ok(total) => {
                    self.persist().await;
                    self.publish(AgentEvent::CreditsAdded { amount, total }).await;
                    tracing::info!(identity = %self.identity(), amount, total, "Credits added");
                    let _ = reply.send(self.record.summary(None));
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::Reinitialize {
                owner_address,
                package_kind,
                total_credits,
                reply,
            } => {
                let from = self.record.status;
                if let Err(e) =
                    self.record
                        .reinitialize(&owner_address, package_kind, total_credits)
                {
                    let _ = reply.send(Err(e));
                    return;
                }
                self.persist().await;
                self.status_changed(from).await;
                tracing::info!(identity = %self.identity(), "Agent reinitialized after error");
                let _ = reply.send(self.record.summary(None));
            }
            Command::Evict { reply, .. } => {
                let _ = reply.send(false);
            }
        }
    }

    /// 在独立任务中调用后端；内层再 spawn 一次以捕获 panic
    fn spawn_worker(&self, generation: &GenerationRecord) {
        let request = GenerationRequest {
            generation_id: generation.id.clone(),
            identity: self.identity().to_string(),
            prompt: generation.prompt.clone(),
            is_video: generation.is_video,
        };
        let backend = Arc::clone(&self.context.backend);
        let timeout = self.context.settings.backend_timeout;
        let updates = self.updates_tx.clone();
        let generation_id = generation.id.clone();

        tokio::spawn(async move {
            let _ = updates.send(WorkerUpdate::Started {
                generation_id: generation_id.clone(),
            });

            let progress_tx = updates.clone();
            let progress_id = generation_id.clone();
            let reporter = ProgressReporter::new(move |progress| {
                let _ = progress_tx.send(WorkerUpdate::Progress {
                    generation_id: progress_id.clone(),
                    progress,
                });
            });

            let job = tokio::spawn(async move {
                match tokio::time::timeout(timeout, backend.invoke(&request, reporter)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(BackendError::Timeout(timeout.as_secs())),
                }
            });

            let update = match job.await {
                Ok(outcome) => WorkerUpdate::Finished {
                    generation_id,
                    outcome,
                },
                Err(e) => WorkerUpdate::Crashed {
                    generation_id,
                    reason: format!("generation worker crashed: {}", e),
                },
            };
            let _ = updates.send(update);
        });
    }

    async fn handle_update(&mut self, update: WorkerUpdate) {
        match update {
            WorkerUpdate::Started { generation_id } => {
                if let Err(e) = self.record.mark_in_progress(&generation_id) {
                    tracing::warn!(identity = %self.identity(), generation_id = %generation_id, "Ignoring start: {}", e);
                    return;
                }
                self.persist().await;
                self.publish(AgentEvent::GenerationStarted { generation_id }).await;
            }
            WorkerUpdate::Progress {
                generation_id,
                progress,
            } => {
                let previous = self
                    .record
                    .generation(&generation_id)
                    .map(|g| g.progress)
                    .unwrap_or(0);
                match self.record.record_progress(&generation_id, progress) {
                    Ok(current) if current > previous => {
                        self.publish(AgentEvent::GenerationProgress {
                            generation_id,
                            progress: current,
                        })
                        .await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(identity = %self.identity(), "Ignoring progress: {}", e);
                    }
                }
            }
            WorkerUpdate::Finished {
                generation_id,
                outcome: Ok(result_ref),
            } => {
                let from = self.record.status;
                match self.record.complete_generation(&generation_id, result_ref.clone()) {
                    Ok(generation) => {
                        self.persist().await;
                        self.publish(AgentEvent::GenerationCompleted {
                            generation_id: generation_id.clone(),
                            result_ref,
                        })
                        .await;
                        self.status_changed(from).await;
                        tracing::info!(identity = %self.identity(), generation_id = %generation_id, "Generation completed");
                        self.resolve_waiter(generation);
                    }
                    Err(e) => {
                        tracing::warn!(identity = %self.identity(), generation_id = %generation_id, "Ignoring completion: {}", e);
                    }
                }
            }
            WorkerUpdate::Finished {
                generation_id,
                outcome: Err(err),
            } => {
                tracing::warn!(identity = %self.identity(), generation_id = %generation_id, "Generation failed: {}", err);
                self.fail(&generation_id, err.to_string(), None).await;
            }
            WorkerUpdate::Crashed {
                generation_id,
                reason,
            } => {
                tracing::error!(identity = %self.identity(), generation_id = %generation_id, "{}", reason);
                self.fail(&generation_id, reason.clone(), Some(reason)).await;
            }
        }
    }

    /// 生成失败；fault 非空时 Agent 进入 Error
    async fn fail(&mut self, generation_id: &str, reason: String, fault: Option<String>) {
        let from = self.record.status;
        let refund = self.context.settings.credit_policy.refunds_on_failure();
        let (generation, refunded) =
            match self.record.fail_generation(generation_id, reason.clone(), refund) {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(identity = %self.identity(), generation_id = %generation_id, "Ignoring failure: {}", e);
                    return;
                }
            };
        if let Some(fault) = fault {
            self.record.enter_error(fault);
        }
        self.persist().await;

        self.publish(AgentEvent::GenerationFailed {
            generation_id: generation_id.to_string(),
            error: reason,
        })
        .await;
        if refunded > 0 {
            self.publish(AgentEvent::CreditsRefunded {
                generation_id: generation_id.to_string(),
                amount: refunded,
                available: self.record.available_credits(),
            })
            .await;
        }
        self.status_changed(from).await;
        self.resolve_waiter(generation);
    }

    fn resolve_waiter(&mut self, generation: GenerationRecord) {
        if let Some(waiter) = self.waiters.remove(&generation.id) {
            let _ = waiter.send(generation);
        }
    }
}

/// 关闭邮箱并以 Unavailable 拒绝所有已排队命令
async fn drain_unavailable(commands: &mut mpsc::Receiver<Command>) {
    commands.close();
    while let Some(command) = commands.recv().await {
        command.reject(CoordinatorError::Unavailable);
    }
}
