use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::handlers::ACCOUNT_EMAIL_HEADER;

const PREFLIGHT_MAX_AGE_SECS: u64 = 86400;

/// CORS for the browser front-end, scanner app and admin console.
///
/// Credentials are only allowed alongside an explicit origin list; with no
/// usable origins the layer falls back to any origin without credentials.
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => {
                tracing::debug!("CORS: Allowing origin: {}", origin);
                Some(value)
            }
            Err(e) => {
                tracing::warn!("CORS: Invalid origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static(ACCOUNT_EMAIL_HEADER),
        ])
        .expose_headers([header::CONTENT_LENGTH, header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(PREFLIGHT_MAX_AGE_SECS));

    if allowed.is_empty() {
        tracing::warn!("CORS: No valid origins configured, allowing any origin without credentials");
        layer.allow_origin(AllowOrigin::any())
    } else {
        tracing::info!("CORS: Configured with {} allowed origin(s)", allowed.len());
        layer
            .allow_origin(AllowOrigin::list(allowed))
            .allow_credentials(true)
    }
}
