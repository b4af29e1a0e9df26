use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::AppState;
use crate::backend::DirectoryBackend;
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, ApiPath};
use crate::models::{IdentityProvider, ListResponse, Organization};

pub async fn create_organization(
    State(state): State<AppState>,
    ApiJson(organization): ApiJson<Organization>,
) -> AppResult<(StatusCode, Json<Organization>)> {
    let created = state
        .treasury
        .backend()
        .create_organization(&organization)
        .await?;

    tracing::info!(organization_id = %created.id, name = %created.name, "organization created");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_organizations(
    State(state): State<AppState>,
) -> AppResult<Json<ListResponse<Organization>>> {
    let organizations = state.treasury.backend().list_organizations().await?;
    Ok(Json(organizations.into()))
}

pub async fn get_organization(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Organization>> {
    state
        .treasury
        .backend()
        .find_organization_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Organization {} not found", id)))
}

pub async fn delete_organization(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    if !state.treasury.backend().delete_organization(id).await? {
        return Err(AppError::NotFound(format!("Organization {} not found", id)));
    }

    tracing::info!(organization_id = %id, "organization deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_identity_provider(
    State(state): State<AppState>,
    ApiJson(idp): ApiJson<IdentityProvider>,
) -> AppResult<(StatusCode, Json<IdentityProvider>)> {
    let created = state
        .treasury
        .backend()
        .create_identity_provider(&idp)
        .await?;

    tracing::info!(idp_id = %created.id, kind = %created.kind, "identity provider created");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_identity_providers(
    State(state): State<AppState>,
) -> AppResult<Json<ListResponse<IdentityProvider>>> {
    let idps = state.treasury.backend().list_identity_providers().await?;
    Ok(Json(idps.into()))
}

pub async fn get_identity_provider(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<IdentityProvider>> {
    state
        .treasury
        .backend()
        .find_identity_provider_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Identity provider {} not found", id)))
}

pub async fn delete_identity_provider(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    if !state.treasury.backend().delete_identity_provider(id).await? {
        return Err(AppError::NotFound(format!(
            "Identity provider {} not found",
            id
        )));
    }

    tracing::info!(idp_id = %id, "identity provider deleted");
    Ok(StatusCode::NO_CONTENT)
}
