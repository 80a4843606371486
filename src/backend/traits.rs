//! 生成后端抽象
//!
//! 协调器只依赖 GenerationBackend：给定 prompt 产出结果引用，期间可通过 ProgressReporter 上报进度。

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// 一次生成调用的输入
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub generation_id: String,
    pub identity: String,
    pub prompt: String,
    pub is_video: bool,
}

/// 后端调用失败的原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(String),

    /// 后端明确拒绝（内容审核、配额等）
    #[error("Rejected by backend: {0}")]
    Rejected(String),

    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
}

/// 进度回调（0-100）
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Arc<dyn Fn(u8) + Send + Sync>,
}

impl ProgressReporter {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// 丢弃所有进度
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn report(&self, progress: u8) {
        (self.callback)(progress.min(100));
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter").finish_non_exhaustive()
    }
}

/// 图片 / 视频生成后端
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// 后端名称（日志用）
    fn name(&self) -> &str;

    /// 执行生成，成功返回产物引用（URL / 存储 key）
    async fn invoke(
        &self,
        request: &GenerationRequest,
        progress: ProgressReporter,
    ) -> Result<String, BackendError>;
}
