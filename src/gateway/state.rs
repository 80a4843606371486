use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, CreditsSection};
use crate::coordinator::AgentRegistry;

/// wait=true 时在后端超时之外额外等待的余量
const WAIT_MARGIN: Duration = Duration::from_secs(10);

/// 路由共享状态
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<AgentRegistry>,
    pub credits: CreditsSection,
    pub mint_secret: Option<String>,
    pub wait_timeout: Duration,
}

impl GatewayState {
    pub fn new(registry: Arc<AgentRegistry>, cfg: &AppConfig) -> Self {
        Self {
            registry,
            credits: cfg.credits.clone(),
            mint_secret: cfg.server.mint_secret.clone().filter(|s| !s.is_empty()),
            wait_timeout: cfg.backend.timeout() + WAIT_MARGIN,
        }
    }
}
