use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    Json,
};
use uuid::Uuid;

use super::{versioned, AppState};
use crate::backend::{DirectoryBackend, GroupBackend};
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, ApiPath};
use crate::models::{Group, ListResponse};
use crate::treasury::TreasuryDb;

/// Insert or update a group with its member set
pub async fn vault_group(
    State(state): State<AppState>,
    ApiJson(mut group): ApiJson<Group>,
) -> AppResult<Response> {
    state.treasury.group_vault(&mut group).await?;

    let status = if group.version == 1 {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok(versioned(status, group.version, &group))
}

pub async fn get_group(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Response> {
    let group = state.treasury.get_group(id).await?;
    Ok(versioned(StatusCode::OK, group.version, &group))
}

pub async fn delete_group(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    if !state.treasury.backend().delete_group(id).await? {
        return Err(AppError::NotFound(format!("Group {} not found", id)));
    }

    tracing::info!(group_id = %id, "group deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_member(
    State(state): State<AppState>,
    ApiPath((group_id, user_id)): ApiPath<(Uuid, Uuid)>,
) -> AppResult<Response> {
    let group = state.treasury.add_member(group_id, user_id).await?;
    Ok(versioned(StatusCode::OK, group.version, &group))
}

pub async fn remove_member(
    State(state): State<AppState>,
    ApiPath((group_id, user_id)): ApiPath<(Uuid, Uuid)>,
) -> AppResult<Response> {
    let group = state.treasury.remove_member(group_id, user_id).await?;
    Ok(versioned(StatusCode::OK, group.version, &group))
}

pub async fn list_organization_groups(
    State(state): State<AppState>,
    ApiPath(organization_id): ApiPath<Uuid>,
) -> AppResult<Json<ListResponse<Group>>> {
    let backend = state.treasury.backend();
    if backend.find_organization_by_id(organization_id).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "Organization {} not found",
            organization_id
        )));
    }

    let groups = backend.find_groups_by_organization(organization_id).await?;
    Ok(Json(groups.into()))
}
