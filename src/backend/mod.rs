//! 生成后端：抽象与实现（Mock / HTTP）

pub mod http;
pub mod mock;
pub mod traits;

use std::sync::Arc;
use std::time::Duration;

pub use http::HttpBackend;
pub use mock::MockBackend;
pub use traits::{BackendError, GenerationBackend, GenerationRequest, ProgressReporter};

use crate::config::{BackendKind, BackendSection};

/// 根据 [backend] 配置创建后端
pub fn create_backend_from_config(
    section: &BackendSection,
) -> anyhow::Result<Arc<dyn GenerationBackend>> {
    match section.kind {
        BackendKind::Mock => {
            tracing::info!("Using mock generation backend");
            Ok(Arc::new(
                MockBackend::new().with_delay(Duration::from_millis(section.mock_delay_ms)),
            ))
        }
        BackendKind::Http => {
            let base_url = section
                .base_url
                .clone()
                .filter(|u| !u.is_empty())
                .ok_or_else(|| anyhow::anyhow!("backend.base_url is required for http backend"))?;
            let api_key = section
                .api_key
                .clone()
                .or_else(|| std::env::var("INFT_BACKEND_API_KEY").ok());
            tracing::info!("Using HTTP generation backend: {}", base_url);
            Ok(Arc::new(HttpBackend::new(base_url, api_key, section.timeout())?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_backend_requires_base_url() {
        let section = BackendSection {
            kind: BackendKind::Http,
            ..BackendSection::default()
        };
        assert!(create_backend_from_config(&section).is_err());
    }

    #[test]
    fn test_default_is_mock() {
        let backend = create_backend_from_config(&BackendSection::default()).unwrap();
        assert_eq!(backend.name(), "mock");
    }
}
