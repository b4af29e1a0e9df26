use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    Json,
};
use uuid::Uuid;

use super::{versioned, AppState};
use crate::backend::{DirectoryBackend, GroupBackend, UserBackend};
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, ApiPath};
use crate::models::{Group, ListResponse, User};
use crate::treasury::TreasuryDb;

/// Insert or update a user; 201 on first write, 200 afterwards
pub async fn vault_user(
    State(state): State<AppState>,
    ApiJson(mut user): ApiJson<User>,
) -> AppResult<Response> {
    state.treasury.user_vault(&mut user).await?;

    let status = if user.version == 1 {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok(versioned(status, user.version, &user))
}

pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Response> {
    let user = state.treasury.get_user(id).await?;
    Ok(versioned(StatusCode::OK, user.version, &user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    if !state.treasury.backend().delete_user(id).await? {
        return Err(AppError::NotFound(format!("User {} not found", id)));
    }

    tracing::info!(user_id = %id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn user_groups(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ListResponse<Group>>> {
    state.treasury.get_user(id).await?;
    let groups = state.treasury.backend().find_groups_by_user_id(id).await?;
    Ok(Json(groups.into()))
}

pub async fn list_organization_users(
    State(state): State<AppState>,
    ApiPath(organization_id): ApiPath<Uuid>,
) -> AppResult<Json<ListResponse<User>>> {
    let backend = state.treasury.backend();
    if backend.find_organization_by_id(organization_id).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "Organization {} not found",
            organization_id
        )));
    }

    let users = backend.find_users_by_organization(organization_id).await?;
    Ok(Json(users.into()))
}
