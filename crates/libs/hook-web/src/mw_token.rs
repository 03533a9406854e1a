//! Shared secret check for hook requests.

use std::{fmt, sync::Arc};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::prelude::*;

/// Header carrying the shared secret.
pub const TOKEN_HEADER: &str = "x-hook-token";

/// The secret every request has to present.
#[derive(Clone)]
pub struct AccessToken(Arc<str>);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Arc::from(token.into()))
    }

    /// Compare without short circuiting on the first differing byte.
    pub fn matches(&self, presented: &[u8]) -> bool {
        let expected = self.0.as_bytes();
        if expected.len() != presented.len() {
            return false;
        }
        expected
            .iter()
            .zip(presented)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Middleware rejecting requests whose `X-HOOK-TOKEN` is not the configured
/// secret, before any handler runs.
///
/// # Examples
///
/// ```rust
/// use axum::{Router, middleware, routing::post};
/// use hook_web::mw_token::{AccessToken, mw_require_token};
///
/// let app: Router<()> = Router::new()
///     .route("/", post(hook_handler))
///     .route_layer(middleware::from_fn_with_state(
///         AccessToken::new("secret"),
///         mw_require_token,
///     ));
///
/// async fn hook_handler() -> &'static str {
///     "accepted"
/// }
/// ```
pub async fn mw_require_token(
    State(token): State<AccessToken>,
    req: Request,
    next: Next,
) -> Result<Response> {
    let presented = req
        .headers()
        .get(TOKEN_HEADER)
        .map(|value| value.as_bytes())
        .unwrap_or_default();
    if !token.matches(presented) {
        let path = req.uri().path();
        warn!("Rejected request to {path} with a wrong token");
        return Err(Error::ApiForbidden);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::post,
    };
    use tower::ServiceExt;

    use super::*;

    fn app(calls: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/",
                post(move || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        "ran"
                    }
                }),
            )
            .route_layer(middleware::from_fn_with_state(
                AccessToken::new("s3cret"),
                mw_require_token,
            ))
    }

    fn request(token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/");
        if let Some(token) = token {
            builder = builder.header("X-HOOK-TOKEN", token);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn matches_only_the_exact_token() {
        let token = AccessToken::new("s3cret");
        assert!(token.matches(b"s3cret"));
        assert!(!token.matches(b"s3cre"));
        assert!(!token.matches(b"s3cret!"));
        assert!(!token.matches(b"S3CRET"));
        assert!(!token.matches(b""));
        assert_eq!(format!("{token:?}"), "AccessToken(***)");
    }

    #[tokio::test]
    async fn correct_token_reaches_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let response = app(calls.clone())
            .oneshot(request(Some("s3cret")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn wrong_or_missing_token_is_forbidden_without_side_effects() {
        let calls = Arc::new(AtomicUsize::new(0));
        for token in [Some("nope"), None] {
            let response = app(calls.clone()).oneshot(request(token)).await.unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
