//! 协调器错误类型
//!
//! 每个 Agent 操作都返回 CoordinatorResult；除 BackendFailure 外，所有错误都在同步路径上返回，
//! 且被拒绝的请求不会修改 AgentRecord。

use thiserror::Error;

use super::state::AgentStatus;
use crate::coordinator::PackageKind;

/// 针对单个 Agent 的操作可能返回的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("Agent already initialized")]
    AlreadyInitialized,

    #[error("Agent not ready (status: {0})")]
    NotReady(AgentStatus),

    /// 同一 Agent 已有生成在进行中
    #[error("Agent busy: generation {0} in progress")]
    Busy(String),

    #[error("Insufficient credits: required {required}, available {available}")]
    InsufficientCredits { required: u64, available: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Backend failure: {0}")]
    BackendFailure(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Capability '{capability}' not included in {package} package")]
    CapabilityMissing {
        capability: String,
        package: PackageKind,
    },

    /// Actor 已停止（空闲回收或存储不可用），请求未被处理
    #[error("Coordinator unavailable")]
    Unavailable,
}

impl CoordinatorError {
    /// 稳定的错误码（HTTP 响应体 / 日志使用）
    pub fn code(&self) -> &'static str {
        match self {
            CoordinatorError::AlreadyInitialized => "already_initialized",
            CoordinatorError::NotReady(_) => "not_ready",
            CoordinatorError::Busy(_) => "busy",
            CoordinatorError::InsufficientCredits { .. } => "insufficient_credits",
            CoordinatorError::NotFound(_) => "not_found",
            CoordinatorError::InvalidState(_) => "invalid_state",
            CoordinatorError::BackendFailure(_) => "backend_failure",
            CoordinatorError::InvalidRequest(_) => "invalid_request",
            CoordinatorError::CapabilityMissing { .. } => "capability_missing",
            CoordinatorError::Unavailable => "unavailable",
        }
    }
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoordinatorError::InsufficientCredits {
            required: 80,
            available: 75,
        };
        assert_eq!(err.to_string(), "Insufficient credits: required 80, available 75");
        assert_eq!(err.code(), "insufficient_credits");

        let err = CoordinatorError::NotReady(AgentStatus::Uninitialized);
        assert!(err.to_string().contains("uninitialized"));

        let err = CoordinatorError::CapabilityMissing {
            capability: "video".to_string(),
            package: PackageKind::Starter,
        };
        assert_eq!(err.to_string(), "Capability 'video' not included in starter package");
    }
}
