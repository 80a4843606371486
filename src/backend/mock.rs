//! Mock 生成后端（本地开发与测试用，无需外部服务）
//!
//! 按固定步数上报进度，结束后返回 `mock://{image|video}/{generation_id}`；
//! prompt 含 `[fail]` 时返回 Rejected，便于演练失败与退款路径。

use std::time::Duration;

use async_trait::async_trait;

use super::traits::{BackendError, GenerationBackend, GenerationRequest, ProgressReporter};

const FAIL_MARKER: &str = "[fail]";

/// Mock 后端：模拟耗时并分步上报进度
#[derive(Debug, Clone)]
pub struct MockBackend {
    delay: Duration,
    steps: u8,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            delay: Duration::from_millis(0),
            steps: 4,
        }
    }

    /// 总耗时（平均分摊到每一步）
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_steps(mut self, steps: u8) -> Self {
        self.steps = steps.max(1);
        self
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(
        &self,
        request: &GenerationRequest,
        progress: ProgressReporter,
    ) -> Result<String, BackendError> {
        let step_delay = self.delay / u32::from(self.steps);
        for step in 1..=self.steps {
            if !step_delay.is_zero() {
                tokio::time::sleep(step_delay).await;
            }
            if step < self.steps {
                progress.report((u32::from(step) * 100 / u32::from(self.steps)) as u8);
            }
        }

        if request.prompt.contains(FAIL_MARKER) {
            return Err(BackendError::Rejected(format!(
                "prompt contains {}",
                FAIL_MARKER
            )));
        }

        let kind = if request.is_video { "video" } else { "image" };
        Ok(format!("mock://{}/{}", kind, request.generation_id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn request(prompt: &str, is_video: bool) -> GenerationRequest {
        GenerationRequest {
            generation_id: "gen_test".to_string(),
            identity: "a1".to_string(),
            prompt: prompt.to_string(),
            is_video,
        }
    }

    #[tokio::test]
    async fn test_mock_reports_progress() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = ProgressReporter::new(move |p| sink.lock().unwrap().push(p));

        let result = MockBackend::new()
            .with_steps(4)
            .invoke(&request("a cat", true), reporter)
            .await
            .unwrap();

        assert_eq!(result, "mock://video/gen_test");
        assert_eq!(*seen.lock().unwrap(), vec![25, 50, 75]);
    }

    #[tokio::test]
    async fn test_mock_fail_marker() {
        let err = MockBackend::new()
            .invoke(&request("please [fail]", false), ProgressReporter::noop())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)));
    }
}
