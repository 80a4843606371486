use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;
use super::state::GatewayState;
use super::stream;

pub fn create_router(state: GatewayState) -> Router {
    Router::new()
        // 按 identity 分路径
        .route("/agents/:identity/initialize", post(handlers::initialize_agent))
        .route("/agents/:identity/generate", post(handlers::generate_agent))
        .route("/agents/:identity/status", get(handlers::agent_status))
        .route("/agents/:identity/generation_minted", post(handlers::agent_minted))
        .route("/agents/:identity/credits", post(handlers::add_credits))
        .route("/agents/:identity/reinitialize", post(handlers::reinitialize_agent))
        .route("/agents/:identity/ws", get(stream::agent_ws))
        .route("/agents/:identity/events", get(stream::agent_sse))
        // 扁平路由：identity 在请求体 / query
        .route("/initialize", post(handlers::initialize_flat))
        .route("/generate", post(handlers::generate_flat))
        .route("/generation_minted", post(handlers::minted_flat))
        .route("/status", get(handlers::status_flat))
        .route("/health", get(handlers::health))
        .with_state(state)
}
