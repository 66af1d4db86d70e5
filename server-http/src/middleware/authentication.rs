use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Shared secret every protected route expects as a bearer token.
#[derive(Clone)]
pub struct ApiToken(Arc<str>);

impl ApiToken {
    pub fn new(token: &str) -> Self {
        Self(Arc::from(token))
    }

    fn matches(&self, candidate: &str) -> bool {
        // Every byte is compared once the lengths match.
        let expected = self.0.as_bytes();
        let candidate = candidate.as_bytes();
        expected.len() == candidate.len()
            && expected
                .iter()
                .zip(candidate)
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
fn extract_bearer(auth_header: &str) -> Option<&str> {
    let mut parts = auth_header.split_whitespace();
    let scheme = parts.next()?;
    let token = parts.next()?;

    if parts.next().is_some() || !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }

    Some(token)
}

fn unauthorized(message: &'static str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        message,
    )
        .into_response()
}

/// Authentication middleware
pub async fn auth_middleware(
    State(token): State<ApiToken>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let auth_header = match auth_header {
        Some(h) => h,
        None => return Err(unauthorized("Missing Authorization header")),
    };

    let candidate = match extract_bearer(auth_header) {
        Some(candidate) => candidate,
        None => return Err(unauthorized("Invalid Authorization header format")),
    };

    if !token.matches(candidate) {
        tracing::warn!(path = %request.uri().path(), "Rejected request with invalid API token");
        return Err(unauthorized("Invalid authentication credentials"));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer("bearer abc123"), Some("abc123"));

        assert!(extract_bearer("Basic abc123").is_none());
        assert!(extract_bearer("Bearer").is_none());
        assert!(extract_bearer("Bearer a b").is_none());
        assert!(extract_bearer("invalid").is_none());
    }

    #[test]
    fn test_token_matching() {
        let token = ApiToken::new("secret-token");
        assert!(token.matches("secret-token"));
        assert!(!token.matches("secret-tokem"));
        assert!(!token.matches("secret"));
        assert!(!token.matches(""));
    }
}
