//! HTTP 处理器：解析 identity 与请求体，转发给 AgentRegistry
//!
//! 每个操作有两种入口：`/agents/:identity/...`（identity 在路径）与扁平路由（identity 在请求体或 query）。
//! 两处都给出 identity 且不一致时返回 400。

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use super::auth::ensure_mint_authorized;
use super::error::ApiError;
use super::state::GatewayState;
use crate::coordinator::PackageKind;

#[derive(Debug, Deserialize)]
pub struct InitializeRequest {
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub owner_address: String,
    pub package_kind: PackageKind,
    /// 缺省时取套餐默认额度
    #[serde(default)]
    pub total_credits: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub is_video: bool,
    /// 缺省时按 [credits] 定价
    #[serde(default)]
    pub required_credits: Option<u64>,
    /// 等待生成结束再返回
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Deserialize)]
pub struct MintedRequest {
    #[serde(default)]
    pub identity: Option<String>,
    pub generation_id: String,
    #[serde(default)]
    pub token_id: String,
    #[serde(default)]
    pub tx_hash: String,
}

#[derive(Debug, Deserialize)]
pub struct AddCreditsRequest {
    pub amount: u64,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub identity: Option<String>,
    pub generation_id: Option<String>,
}

/// 合并路径与请求体里的 identity
fn resolve_identity(path: Option<String>, body: Option<String>) -> Result<String, ApiError> {
    let body = body.filter(|s| !s.is_empty());
    match (path, body) {
        (Some(p), Some(b)) if p != b => Err(ApiError::bad_request(format!(
            "identity mismatch: path '{}' vs body '{}'",
            p, b
        ))),
        (Some(p), _) => Ok(p),
        (None, Some(b)) => Ok(b),
        (None, None) => Err(ApiError::bad_request("identity is required")),
    }
}

// ----- 共用实现 -----

async fn initialize(
    state: &GatewayState,
    identity: String,
    req: InitializeRequest,
) -> Result<Response, ApiError> {
    let total = req
        .total_credits
        .unwrap_or_else(|| req.package_kind.default_credits());
    let kind = req.package_kind;
    let owner = req.owner_address;
    let summary = state
        .registry
        .dispatch(&identity, |h| {
            let owner = owner.clone();
            async move { h.initialize(owner, kind, total).await }
        })
        .await?;
    Ok(Json(summary).into_response())
}

async fn generate(
    state: &GatewayState,
    identity: String,
    req: GenerateRequest,
) -> Result<Response, ApiError> {
    let is_video = req.is_video;
    let credits = req
        .required_credits
        .unwrap_or_else(|| state.credits.cost_for(is_video));
    let prompt = req.prompt;

    if req.wait {
        let wait_timeout = state.wait_timeout;
        let generation = state
            .registry
            .dispatch(&identity, |h| {
                let prompt = prompt.clone();
                async move {
                    h.generate_and_wait(prompt, is_video, credits, wait_timeout)
                        .await
                }
            })
            .await?;
        return Ok(Json(generation).into_response());
    }

    let ticket = state
        .registry
        .dispatch(&identity, |h| {
            let prompt = prompt.clone();
            async move { h.generate(prompt, is_video, credits).await }
        })
        .await?;
    Ok((StatusCode::ACCEPTED, Json(ticket.generation)).into_response())
}

async fn status(
    state: &GatewayState,
    identity: String,
    generation_id: Option<String>,
) -> Result<Response, ApiError> {
    let summary = state
        .registry
        .dispatch(&identity, |h| {
            let generation_id = generation_id.clone();
            async move { h.get_status(generation_id).await }
        })
        .await?;
    Ok(Json(summary).into_response())
}

async fn minted(
    state: &GatewayState,
    headers: &HeaderMap,
    identity: String,
    req: MintedRequest,
) -> Result<Response, ApiError> {
    ensure_mint_authorized(headers, state.mint_secret.as_deref())?;
    let generation = state
        .registry
        .dispatch(&identity, |h| {
            let (generation_id, token_id, tx_hash) = (
                req.generation_id.clone(),
                req.token_id.clone(),
                req.tx_hash.clone(),
            );
            async move { h.notify_minted(generation_id, token_id, tx_hash).await }
        })
        .await?;
    Ok(Json(generation).into_response())
}

// ----- /agents/:identity/... -----

pub async fn initialize_agent(
    State(state): State<GatewayState>,
    Path(identity): Path<String>,
    payload: Result<Json<InitializeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let identity = resolve_identity(Some(identity), req.identity.clone())?;
    initialize(&state, identity, req).await
}

pub async fn generate_agent(
    State(state): State<GatewayState>,
    Path(identity): Path<String>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let identity = resolve_identity(Some(identity), req.identity.clone())?;
    generate(&state, identity, req).await
}

pub async fn agent_status(
    State(state): State<GatewayState>,
    Path(identity): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Result<Response, ApiError> {
    let identity = resolve_identity(Some(identity), query.identity)?;
    status(&state, identity, query.generation_id).await
}

pub async fn agent_minted(
    State(state): State<GatewayState>,
    Path(identity): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<MintedRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let identity = resolve_identity(Some(identity), req.identity.clone())?;
    minted(&state, &headers, identity, req).await
}

pub async fn add_credits(
    State(state): State<GatewayState>,
    Path(identity): Path<String>,
    payload: Result<Json<AddCreditsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let amount = req.amount;
    let summary = state
        .registry
        .dispatch(&identity, |h| async move { h.add_credits(amount).await })
        .await?;
    Ok(Json(summary).into_response())
}

pub async fn reinitialize_agent(
    State(state): State<GatewayState>,
    Path(identity): Path<String>,
    payload: Result<Json<InitializeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let identity = resolve_identity(Some(identity), req.identity.clone())?;
    let total = req
        .total_credits
        .unwrap_or_else(|| req.package_kind.default_credits());
    let kind = req.package_kind;
    let owner = req.owner_address;
    let summary = state
        .registry
        .dispatch(&identity, |h| {
            let owner = owner.clone();
            async move { h.reinitialize(owner, kind, total).await }
        })
        .await?;
    Ok(Json(summary).into_response())
}

// ----- 扁平路由（identity 在请求体 / query） -----

pub async fn initialize_flat(
    State(state): State<GatewayState>,
    payload: Result<Json<InitializeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let identity = resolve_identity(None, req.identity.clone())?;
    initialize(&state, identity, req).await
}

pub async fn generate_flat(
    State(state): State<GatewayState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let identity = resolve_identity(None, req.identity.clone())?;
    generate(&state, identity, req).await
}

pub async fn status_flat(
    State(state): State<GatewayState>,
    Query(query): Query<StatusQuery>,
) -> Result<Response, ApiError> {
    let identity = resolve_identity(None, query.identity)?;
    status(&state, identity, query.generation_id).await
}

pub async fn minted_flat(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    payload: Result<Json<MintedRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let identity = resolve_identity(None, req.identity.clone())?;
    minted(&state, &headers, identity, req).await
}

pub async fn health(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    let stored_agents = match state.registry.stored_count().await {
        Ok(count) => serde_json::json!(count),
        Err(e) => {
            tracing::warn!("Health check could not count stored agents: {}", e);
            serde_json::Value::Null
        }
    };
    Json(serde_json::json!({
        "status": "ok",
        "active_agents": state.registry.active_count().await,
        "stored_agents": stored_agents,
    }))
}
