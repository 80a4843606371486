//! 铸造回调鉴权：配置了 mint_secret 时要求 `x-mint-secret` 头

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use super::error::ApiError;

pub const MINT_SECRET_HEADER: &str = "x-mint-secret";

pub fn ensure_mint_authorized(headers: &HeaderMap, secret: Option<&str>) -> Result<(), ApiError> {
    let Some(expected) = secret.filter(|s| !s.is_empty()) else {
        return Ok(());
    };

    let provided = headers
        .get(MINT_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim);

    match provided {
        Some(value) if bool::from(value.as_bytes().ct_eq(expected.as_bytes())) => Ok(()),
        Some(_) => {
            tracing::warn!("Mint notification rejected: wrong secret");
            Err(ApiError::unauthorized("invalid mint secret"))
        }
        None => Err(ApiError::unauthorized("missing x-mint-secret header")),
    }
}
