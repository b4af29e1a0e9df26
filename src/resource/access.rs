use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::AppState;
use crate::backend::Backend;
use crate::error::AppResult;
use crate::extractors::ApiJson;
use crate::models::{AuthorizationDecision, Credentials, User};
use crate::treasury::TreasuryDb;

#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    pub user_id: Uuid,
    pub role: String,
}

pub async fn health(State(state): State<AppState>) -> AppResult<(StatusCode, Json<Value>)> {
    let backend = state.treasury.backend();
    backend.health_check().await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "database": backend.database_type().as_str(),
        })),
    ))
}

pub async fn authenticate(
    State(state): State<AppState>,
    ApiJson(credentials): ApiJson<Credentials>,
) -> AppResult<Json<User>> {
    let user = state.treasury.authenticate_user(&credentials).await?;
    Ok(Json(user))
}

pub async fn authorize(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AuthorizeRequest>,
) -> AppResult<Json<AuthorizationDecision>> {
    let decision = state
        .treasury
        .authorize_user(request.user_id, &request.role)
        .await?;
    Ok(Json(decision))
}
