//! HTTP 路由层
//!
//! 只做转发：从路径 / 请求体 / query 取出 identity，交给 AgentRegistry 找到对应协调器。
//! 不持有任何 Agent 状态。
//!
//! - **routes**: 路由表
//! - **handlers**: initialize / generate / status / generation_minted / credits / reinitialize
//! - **stream**: WebSocket 与 SSE 事件推送
//! - **auth**: 铸造回调密钥校验
//! - **error**: 错误码映射

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod stream;

pub use error::ApiError;
pub use routes::create_router;
pub use state::GatewayState;
