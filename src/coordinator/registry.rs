//! Agent 注册表：identity → 协调器句柄
//!
//! 首次引用时启动 Actor（从存储恢复状态）；同一 identity 同一时刻只有一个活跃 Actor。
//! 后台清理任务定期回收空闲 Actor，下次引用时重新启动并恢复。

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::actor::{AgentActor, CoordinatorContext};
use super::handle::CoordinatorHandle;
use crate::core::{CoordinatorError, CoordinatorResult};
use crate::events::EventChannel;
use crate::store::StoreError;

const MAX_IDENTITY_LEN: usize = 128;

/// identity 校验：非空、长度受限、不含控制字符
pub fn validate_identity(identity: &str) -> CoordinatorResult<()> {
    if identity.trim().is_empty() {
        return Err(CoordinatorError::InvalidRequest(
            "identity is required".to_string(),
        ));
    }
    if identity.len() > MAX_IDENTITY_LEN {
        return Err(CoordinatorError::InvalidRequest(format!(
            "identity longer than {} bytes",
            MAX_IDENTITY_LEN
        )));
    }
    if identity.chars().any(char::is_control) {
        return Err(CoordinatorError::InvalidRequest(
            "identity contains control characters".to_string(),
        ));
    }
    Ok(())
}

pub struct AgentRegistry {
    agents: RwLock<HashMap<String, CoordinatorHandle>>,
    /// Actor 任务，关闭时等待其退出
    tasks: Mutex<Vec<JoinHandle<()>>>,
    context: Arc<CoordinatorContext>,
}

impl AgentRegistry {
    pub fn new(context: Arc<CoordinatorContext>) -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            tasks: Mutex::new(Vec::new()),
            context,
        }
    }

    pub fn events(&self) -> &Arc<EventChannel> {
        &self.context.events
    }

    /// 获取或启动某个 identity 的协调器
    pub async fn get_or_spawn(&self, identity: &str) -> CoordinatorResult<CoordinatorHandle> {
        validate_identity(identity)?;

        if let Some(handle) = self.agents.read().await.get(identity) {
            if !handle.is_closed() {
                return Ok(handle.clone());
            }
        }

        let mut agents = self.agents.write().await;
        if let Some(handle) = agents.get(identity) {
            if !handle.is_closed() {
                return Ok(handle.clone());
            }
        }
        let (handle, task) = AgentActor::spawn(identity, Arc::clone(&self.context));
        {
            let mut tasks = self.tasks.lock().await;
            tasks.retain(|t| !t.is_finished());
            tasks.push(task);
        }
        agents.insert(identity.to_string(), handle.clone());
        tracing::debug!(identity = %identity, "Spawned agent coordinator");
        Ok(handle)
    }

    /// 把操作转发给 identity 对应的协调器
    ///
    /// 命令撞上回收时会收到 Unavailable（未被执行），此时换新 Actor 重试一次。
    pub async fn dispatch<T, F, Fut>(&self, identity: &str, op: F) -> CoordinatorResult<T>
    where
        F: Fn(CoordinatorHandle) -> Fut,
        Fut: Future<Output = CoordinatorResult<T>>,
    {
        let handle = self.get_or_spawn(identity).await?;
        match op(handle.clone()).await {
            Err(CoordinatorError::Unavailable) => {
                tracing::debug!(identity = %identity, "Coordinator unavailable, retrying on fresh actor");
                self.forget(&handle).await;
                let handle = self.get_or_spawn(identity).await?;
                op(handle).await
            }
            other => other,
        }
    }

    /// 移除句柄（仅当表中仍是同一个 Actor）
    async fn forget(&self, handle: &CoordinatorHandle) {
        let mut agents = self.agents.write().await;
        if agents
            .get(handle.identity())
            .is_some_and(|current| current.same_actor(handle))
        {
            agents.remove(handle.identity());
        }
    }

    /// 回收空闲超过 idle_timeout 的 Actor，返回回收数量
    pub async fn evict_idle(&self, idle_timeout: Duration) -> usize {
        let handles: Vec<CoordinatorHandle> = self.agents.read().await.values().cloned().collect();
        let mut evicted = 0;
        for handle in handles {
            if handle.evict(idle_timeout).await {
                self.forget(&handle).await;
                evicted += 1;
            }
        }
        evicted
    }

    pub async fn active_count(&self) -> usize {
        self.agents
            .read()
            .await
            .values()
            .filter(|h| !h.is_closed())
            .count()
    }

    /// 已持久化的 Agent 数量
    pub async fn stored_count(&self) -> Result<usize, StoreError> {
        self.context.store.count().await
    }

    /// 释放所有句柄并等待 Actor 退出
    ///
    /// Actor 处理完已排队命令、等在途生成落地并写入存储后才退出。
    /// 超过 timeout 仍未退出的 Actor 留给重启恢复处理，返回其数量。
    pub async fn shutdown(&self, timeout: Duration) -> usize {
        let released = {
            let mut agents = self.agents.write().await;
            let count = agents.len();
            agents.clear();
            count
        };
        let mut pending: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock().await);
        tracing::info!("Released {} agent coordinators, draining {} actors", released, pending.len());

        let drained = tokio::time::timeout(timeout, async {
            for task in pending.iter_mut() {
                let _ = task.await;
            }
        })
        .await;

        match drained {
            Ok(()) => {
                tracing::info!("All agent coordinators stopped");
                0
            }
            Err(_) => {
                let remaining = pending.iter().filter(|t| !t.is_finished()).count();
                tracing::warn!(
                    "{} agent coordinators still running after {}s, in-flight generations will be recovered on restart",
                    remaining,
                    timeout.as_secs()
                );
                remaining
            }
        }
    }

    /// 启动后台清理：回收空闲 Actor，清理无订阅者的事件通道
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        idle_timeout: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval.max(Duration::from_secs(1)));
            timer.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = timer.tick() => {
                        let evicted = registry.evict_idle(idle_timeout).await;
                        let pruned = registry.events().prune().await;
                        if evicted > 0 || pruned > 0 {
                            tracing::info!("Sweep: evicted {} idle agents, pruned {} event channels", evicted, pruned);
                        }
                    }
                }
            }
            tracing::debug!("Registry sweeper stopped");
        })
    }
}
