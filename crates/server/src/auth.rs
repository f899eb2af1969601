//! API-key authentication for the trigger surface.
//!
//! A key arrives either as `Authorization: Bearer <key>` or as `x-api-key`
//! and maps to exactly one tenant.

use axum::http::{header, HeaderMap, StatusCode};

use oncall_core::config::AuthConfig;

use crate::api::{error_response, ApiError};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Pull the presented key out of the request headers, if any.
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    bearer
        .or_else(|| headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()).map(str::trim))
        .filter(|k| !k.is_empty())
}

/// Resolve the caller's tenant or reject with 401.
pub fn authenticate(headers: &HeaderMap, auth: &AuthConfig) -> Result<String, ApiError> {
    let key = presented_key(headers)
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "missing API key"))?;

    match auth.tenant_for(key) {
        Some(tenant) => Ok(tenant.to_string()),
        None => {
            tracing::warn!("rejected request with unknown API key");
            Err(error_response(StatusCode::UNAUTHORIZED, "invalid API key"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use oncall_core::config::parse_api_keys;

    fn auth() -> AuthConfig {
        AuthConfig {
            api_keys: parse_api_keys("k-acme:acme,k-globex:globex"),
        }
    }

    #[test]
    fn bearer_token_maps_to_tenant() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer k-acme"));
        assert_eq!(authenticate(&headers, &auth()).unwrap(), "acme");
    }

    #[test]
    fn api_key_header_maps_to_tenant() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("k-globex"));
        assert_eq!(authenticate(&headers, &auth()).unwrap(), "globex");
    }

    #[test]
    fn missing_or_unknown_key_is_unauthorized() {
        let headers = HeaderMap::new();
        assert_eq!(authenticate(&headers, &auth()).unwrap_err().0, StatusCode::UNAUTHORIZED);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer nope"));
        assert_eq!(authenticate(&headers, &auth()).unwrap_err().0, StatusCode::UNAUTHORIZED);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic k-acme"));
        assert_eq!(authenticate(&headers, &auth()).unwrap_err().0, StatusCode::UNAUTHORIZED);
    }
}
