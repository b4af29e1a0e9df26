//! HTTP administration API

use axum::{
    http::{HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::treasury::Treasury;

pub mod access;
pub mod directory;
pub mod group;
pub mod user;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub treasury: Treasury,
    pub config: Arc<AppConfig>,
}

/// Build the API router with authentication and access logging applied
pub fn router(treasury: Treasury, config: Arc<AppConfig>) -> Router {
    let base_path = config.server.base_path.trim_end_matches('/').to_string();

    let api = Router::new()
        .route("/health", get(access::health))
        .route(
            "/organizations",
            post(directory::create_organization).get(directory::list_organizations),
        )
        .route(
            "/organizations/{id}",
            get(directory::get_organization).delete(directory::delete_organization),
        )
        .route("/organizations/{id}/users", get(user::list_organization_users))
        .route("/organizations/{id}/groups", get(group::list_organization_groups))
        .route(
            "/identity-providers",
            post(directory::create_identity_provider).get(directory::list_identity_providers),
        )
        .route(
            "/identity-providers/{id}",
            get(directory::get_identity_provider).delete(directory::delete_identity_provider),
        )
        .route("/users", put(user::vault_user))
        .route("/users/{id}", get(user::get_user).delete(user::delete_user))
        .route("/users/{id}/groups", get(user::user_groups))
        .route("/groups", put(group::vault_group))
        .route("/groups/{id}", get(group::get_group).delete(group::delete_group))
        .route(
            "/groups/{id}/members/{user_id}",
            put(group::add_member).delete(group::remove_member),
        )
        .route("/authenticate", post(access::authenticate))
        .route("/authorize", post(access::authorize));

    let api = if base_path.is_empty() {
        api
    } else {
        Router::new().nest(&base_path, api)
    };

    api.layer(middleware::from_fn_with_state(
        config.clone(),
        crate::auth::auth_middleware,
    ))
    .layer(middleware::from_fn(crate::logging::logging_middleware))
    .with_state(AppState { treasury, config })
}

/// JSON response carrying a weak ETag derived from the record version
pub(crate) fn versioned<T: Serialize>(status: StatusCode, version: i64, body: &T) -> Response {
    let mut response = (status, Json(body)).into_response();
    if let Ok(etag) = HeaderValue::from_str(&format!("W/\"{}\"", version)) {
        response.headers_mut().insert("ETag", etag);
    }
    response
}
