//! HTTP 生成后端
//!
//! POST `{base_url}/generate`，请求体 `{generation_id, identity, prompt, is_video}`；
//! 响应体取 `artifact_ref`（或 `url`），出现 `error` 字段视为拒绝。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;

use super::traits::{BackendError, GenerationBackend, GenerationRequest, ProgressReporter};

#[derive(Debug, Serialize)]
struct GeneratePayload<'a> {
    generation_id: &'a str,
    identity: &'a str,
    prompt: &'a str,
    is_video: bool,
}

/// 调用外部模型服务的后端
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/generate", self.base_url)
    }
}

/// 从响应 JSON 中取出产物引用
fn parse_response(body: &serde_json::Value) -> Result<String, BackendError> {
    if let Some(error) = body.get("error").and_then(|e| e.as_str()) {
        return Err(BackendError::Rejected(error.to_string()));
    }
    body.get("artifact_ref")
        .or_else(|| body.get("url"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| BackendError::InvalidResponse("missing artifact_ref".to_string()))
}

/// 先看状态码再解析响应体；非 2xx 时优先取 JSON 中的 `error`，否则保留状态码
fn interpret_response(status: StatusCode, text: &str) -> Result<String, BackendError> {
    let body = serde_json::from_str::<serde_json::Value>(text);

    if !status.is_success() {
        let message = body
            .ok()
            .and_then(|b| b.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or_else(|| status.to_string());
        return Err(if status.is_client_error() {
            BackendError::Rejected(message)
        } else {
            BackendError::Http(message)
        });
    }

    let body = body.map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
    parse_response(&body)
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn invoke(
        &self,
        request: &GenerationRequest,
        progress: ProgressReporter,
    ) -> Result<String, BackendError> {
        let payload = GeneratePayload {
            generation_id: &request.generation_id,
            identity: &request.identity,
            prompt: &request.prompt,
            is_video: request.is_video,
        };

        let mut req = self.client.post(self.endpoint()).json(&payload);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        progress.report(5);
        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(self.timeout.as_secs())
            } else {
                BackendError::Http(e.to_string())
            }
        })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| BackendError::Http(e.to_string()))?;
        let artifact = interpret_response(status, &text)?;
        tracing::debug!(generation_id = %request.generation_id, artifact = %artifact, "HTTP backend finished");
        Ok(artifact)
    }
}
