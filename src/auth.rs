use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;

use crate::config::{AppConfig, AuthConfig};
use crate::error::AppError;

/// Authentication middleware for the administration API
///
/// The health endpoint is always reachable so liveness checks need no credentials.
pub async fn auth_middleware(
    State(app_config): State<Arc<AppConfig>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if request.uri().path() == health_path(&app_config.server.base_path) {
        return Ok(next.run(request).await);
    }

    if let Err(reason) = validate_authentication(&app_config.auth, request.headers()) {
        tracing::debug!(path = %request.uri().path(), reason, "admin authentication rejected");
        return Err(AppError::Unauthorized("Authentication required".to_string()));
    }

    Ok(next.run(request).await)
}

fn health_path(base_path: &str) -> String {
    format!("{}/health", base_path.trim_end_matches('/'))
}

fn validate_authentication(auth: &AuthConfig, headers: &HeaderMap) -> Result<(), &'static str> {
    let auth_header = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok());

    match auth.auth_type.as_str() {
        "unauthenticated" => Ok(()),
        "bearer" => {
            let provided = auth_header
                .and_then(|h| h.strip_prefix("Bearer "))
                .ok_or("missing bearer token")?;

            match auth.token.as_deref() {
                Some(expected) if provided == expected => Ok(()),
                Some(_) => Err("bearer token mismatch"),
                None => Err("no bearer token configured"),
            }
        }
        "basic" => {
            let encoded = auth_header
                .and_then(|h| h.strip_prefix("Basic "))
                .ok_or("missing basic credentials")?;

            let decoded = general_purpose::STANDARD
                .decode(encoded)
                .map_err(|_| "malformed basic credentials")?;
            let decoded = String::from_utf8(decoded).map_err(|_| "malformed basic credentials")?;
            let (username, password) = decoded
                .split_once(':')
                .ok_or("malformed basic credentials")?;

            match &auth.basic {
                Some(basic) if username == basic.username && password == basic.password => Ok(()),
                Some(_) => Err("basic credentials mismatch"),
                None => Err("no basic credentials configured"),
            }
        }
        _ => Err("unknown authentication type"),
    }
}
