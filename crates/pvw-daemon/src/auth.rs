// auth.rs — Bearer authentication and actor identity.
//
// Every non-health endpoint requires `Authorization: Bearer <token>`
// matching the server-configured secret. The comparison is constant-time;
// a missing server token answers 503 (the service is unconfigured, the
// caller is not at fault); a missing or wrong client token answers 401.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::AppState;

/// The actor recorded in audit when no `X-Actor-ID` header is present.
pub const DEFAULT_ACTOR: &str = "authenticated";

/// Axum middleware guarding the `/v1` surface.
pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.auth_token.as_deref() else {
        return ApiError::Unconfigured("server auth token is not configured".to_string())
            .into_response();
    };

    let presented = bearer_token(request.headers());
    match presented {
        Some(token) if constant_time_eq(token, expected) => next.run(request).await,
        Some(_) => ApiError::Unauthorized("invalid bearer token".to_string()).into_response(),
        None => {
            ApiError::Unauthorized("missing Authorization: Bearer header".to_string())
                .into_response()
        }
    }
}

/// The actor identity for audit: `X-Actor-ID` if present, else the default.
/// Never taken from the request body.
pub fn actor_from(headers: &HeaderMap) -> String {
    headers
        .get("x-actor-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|actor| !actor.is_empty())
        .unwrap_or(DEFAULT_ACTOR)
        .to_string()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Constant-time equality over the token bytes. Length mismatches return
/// early, which leaks only the length — the token value itself is never
/// compared byte-by-byte in a data-dependent order.
fn constant_time_eq(a: &str, b: &str) -> bool {
    ring::constant_time::verify_slices_are_equal(a.as_bytes(), b.as_bytes()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_extraction() {
        let headers = headers_with("authorization", "Bearer sekrit");
        assert_eq!(bearer_token(&headers), Some("sekrit"));

        let headers = headers_with("authorization", "Basic dXNlcjpwYXNz");
        assert_eq!(bearer_token(&headers), None);

        let headers = headers_with("authorization", "Bearer ");
        assert_eq!(bearer_token(&headers), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn constant_time_comparison_agrees_with_equality() {
        assert!(constant_time_eq("token", "token"));
        assert!(!constant_time_eq("token", "other"));
        assert!(!constant_time_eq("token", "token-longer"));
    }

    #[test]
    fn actor_defaults_and_reads_the_header() {
        assert_eq!(actor_from(&HeaderMap::new()), "authenticated");

        let headers = headers_with("x-actor-id", "agent-7");
        assert_eq!(actor_from(&headers), "agent-7");

        let headers = headers_with("x-actor-id", "   ");
        assert_eq!(actor_from(&headers), "authenticated");
    }
}
