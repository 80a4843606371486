//! 状态定义：Agent 状态机与单次生成的阶段
//!
//! AgentStatus 由协调器独占维护；GenerationStage 随后端进度推进，终态不可再变。

use std::fmt;

use serde::{Deserialize, Serialize};

/// Agent 状态机
///
/// Uninitialized → Initializing → Ready ⇄ Generating；
/// Error 只能通过外部重新初始化退出。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Uninitialized,
    Initializing,
    Ready,
    Generating,
    Error,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Uninitialized => "uninitialized",
            AgentStatus::Initializing => "initializing",
            AgentStatus::Ready => "ready",
            AgentStatus::Generating => "generating",
            AgentStatus::Error => "error",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单次生成的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStage {
    /// 已受理，积分已扣除，等待后端开始
    Queued,
    /// 后端处理中
    InProgress,
    /// 已产出结果
    Completed,
    /// 后端失败、超时或被中断
    Failed,
}

impl GenerationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStage::Queued => "queued",
            GenerationStage::InProgress => "in_progress",
            GenerationStage::Completed => "completed",
            GenerationStage::Failed => "failed",
        }
    }

    /// 是否已到终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationStage::Completed | GenerationStage::Failed)
    }
}

impl fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
