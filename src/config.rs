//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `INFT__*` 覆盖（双下划线表示嵌套，如 `INFT__BACKEND__KIND=http`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub coordinator: CoordinatorSection,
    pub backend: BackendSection,
    pub credits: CreditsSection,
    pub persistence: PersistenceSection,
}

/// [server] 段：监听地址、铸造回调密钥、回收周期
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind_addr: String,
    /// 设置后 generation_minted 回调必须携带 `x-mint-secret` 头
    pub mint_secret: Option<String>,
    /// 空闲 Actor 回收与事件通道清理的周期（秒）
    pub sweep_interval_secs: u64,
    /// 关闭时等待在途生成落地的上限（秒）
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8787".to_string(),
            mint_secret: None,
            sweep_interval_secs: 60,
            shutdown_timeout_secs: 30,
        }
    }
}

/// [coordinator] 段：Actor 邮箱容量、事件缓冲、空闲回收阈值
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoordinatorSection {
    pub mailbox_capacity: usize,
    /// 每个 Agent 的广播缓冲；慢订阅者超出后丢弃旧事件
    pub event_buffer: usize,
    pub idle_timeout_secs: u64,
}

impl Default for CoordinatorSection {
    fn default() -> Self {
        Self {
            mailbox_capacity: 32,
            event_buffer: 64,
            idle_timeout_secs: 900,
        }
    }
}

/// 生成后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// 本地模拟后端（无需外部服务）
    #[default]
    Mock,
    /// HTTP 模型服务
    Http,
}

/// [backend] 段：生成后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    pub kind: BackendKind,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// 单次生成超时（秒），超时记为 Failed
    pub timeout_secs: u64,
    /// Mock 后端模拟耗时（毫秒）
    pub mock_delay_ms: u64,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            kind: BackendKind::Mock,
            base_url: None,
            api_key: None,
            timeout_secs: 120,
            mock_delay_ms: 500,
        }
    }
}

impl BackendSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// 生成失败时如何处理已扣除的积分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CreditPolicy {
    /// 失败即显式退还（发布 credits_refunded 事件）
    #[default]
    RefundOnFailure,
    /// 受理即消耗，失败不退
    SpendOnAdmission,
}

impl CreditPolicy {
    pub fn refunds_on_failure(&self) -> bool {
        matches!(self, CreditPolicy::RefundOnFailure)
    }
}

/// [credits] 段：退款策略与默认定价
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CreditsSection {
    pub policy: CreditPolicy,
    /// 请求未指定 required_credits 时，图片 / 视频的默认扣费
    pub image_cost: u64,
    pub video_cost: u64,
}

impl Default for CreditsSection {
    fn default() -> Self {
        Self {
            policy: CreditPolicy::RefundOnFailure,
            image_cost: 10,
            video_cost: 50,
        }
    }
}

impl CreditsSection {
    pub fn cost_for(&self, is_video: bool) -> u64 {
        if is_video {
            self.video_cost
        } else {
            self.image_cost
        }
    }
}

/// [persistence] 段：设置 db_path 且启用 async-sqlite 时持久化到 SQLite，否则仅内存
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PersistenceSection {
    pub db_path: Option<PathBuf>,
}

/// 从 config 目录加载配置，环境变量 INFT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 INFT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!("Config file {:?} not found, skipping", path);
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("INFT")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.bind_addr, "127.0.0.1:8787");
        assert_eq!(cfg.server.shutdown_timeout_secs, 30);
        assert_eq!(cfg.backend.kind, BackendKind::Mock);
        assert_eq!(cfg.credits.policy, CreditPolicy::RefundOnFailure);
        assert_eq!(cfg.credits.cost_for(false), 10);
        assert_eq!(cfg.credits.cost_for(true), 50);
        assert!(cfg.persistence.db_path.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
[backend]
kind = "http"
base_url = "http://127.0.0.1:9999"
timeout_secs = 5

[credits]
policy = "spend_on_admission"
video_cost = 75
"#,
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.backend.kind, BackendKind::Http);
        assert_eq!(cfg.backend.base_url.as_deref(), Some("http://127.0.0.1:9999"));
        assert_eq!(cfg.backend.timeout(), Duration::from_secs(5));
        assert_eq!(cfg.credits.policy, CreditPolicy::SpendOnAdmission);
        assert_eq!(cfg.credits.video_cost, 75);
        // 未出现的键保留默认值
        assert_eq!(cfg.credits.image_cost, 10);
        assert_eq!(cfg.coordinator.mailbox_capacity, 32);
    }
}
