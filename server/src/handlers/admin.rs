use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::state::AppState;
use crate::utils::error::AppError;

/// Guards `/api/admin/*` with a bearer token when `ADMIN_API_TOKEN` is set.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match provided {
        None => Err(AppError::AuthError("Missing bearer token".to_string())),
        Some(token)
            if constant_time_eq::constant_time_eq(
                token.trim().as_bytes(),
                expected.as_bytes(),
            ) =>
        {
            Ok(next.run(request).await)
        }
        Some(_) => Err(AppError::Forbidden("Invalid admin token".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::middleware;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::services::LogTicketMailer;
    use crate::store::MemoryStore;

    fn guarded(admin_token: Option<&str>) -> Router {
        let config = Config {
            admin_token: admin_token.map(str::to_string),
            ..Config::default()
        };
        let state = AppState::new(
            Arc::new(MemoryStore::new()),
            Arc::new(LogTicketMailer),
            &config,
        );
        Router::new()
            .route("/", get(|| async { "ok" }))
            .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
            .with_state(state)
    }

    async fn status_with(app: Router, authorization: Option<&str>) -> StatusCode {
        let mut request = axum::http::Request::builder().uri("/");
        if let Some(value) = authorization {
            request = request.header(header::AUTHORIZATION, value);
        }
        app.oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_guard_compares_bearer_token() {
        let app = guarded(Some("s3cret"));
        assert_eq!(status_with(app.clone(), Some("Bearer s3cret")).await, StatusCode::OK);
        assert_eq!(
            status_with(app.clone(), Some("Bearer s3creT")).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_with(app.clone(), Some("Bearer s3cre")).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(status_with(app, None).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_guard_is_open_without_configured_token() {
        assert_eq!(status_with(guarded(None), None).await, StatusCode::OK);
    }
}
