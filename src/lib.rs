//! INFT Hub - 每个 Agent 一个协调器的生成服务
//!
//! 模块划分：
//! - **backend**: 生成后端抽象与实现（Mock / HTTP）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **coordinator**: AgentRecord 状态机、Actor、句柄与注册表
//! - **core**: 错误类型、状态枚举、优雅关闭
//! - **events**: 按 identity 的事件广播
//! - **gateway**: HTTP / WebSocket / SSE 路由
//! - **observability**: tracing 日志初始化
//! - **store**: AgentRecord 持久化（内存 / SQLite）

pub mod backend;
pub mod config;
pub mod coordinator;
pub mod core;
pub mod events;
pub mod gateway;
pub mod observability;
pub mod store;

pub use coordinator::{AgentRegistry, CoordinatorContext, CoordinatorHandle, CoordinatorSettings};
