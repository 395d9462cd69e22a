use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::{
        groups::{CreateGroupRequest, UpdateGroupRequest},
        MessageResponse,
    },
    middleware::{AdminSession, Authenticated},
    models::{AccountResponse, GroupResponse},
    utils::{ValidatedJson, ValidatedPath},
    AppState,
};

pub async fn list_groups(
    State(state): State<AppState>,
    _caller: Authenticated,
) -> Result<Json<Vec<GroupResponse>>, AppError> {
    Ok(Json(state.groups.list_groups().await?))
}

pub async fn get_group(
    State(state): State<AppState>,
    _caller: Authenticated,
    ValidatedPath(group_id): ValidatedPath<Uuid>,
) -> Result<Json<GroupResponse>, AppError> {
    Ok(Json(state.groups.get_group(group_id).await?))
}

pub async fn group_members(
    State(state): State<AppState>,
    _caller: Authenticated,
    ValidatedPath(group_id): ValidatedPath<Uuid>,
) -> Result<Json<Vec<AccountResponse>>, AppError> {
    let members = state.membership.members_of(group_id).await?;
    Ok(Json(members.into_iter().map(AccountResponse::from).collect()))
}

pub async fn create_group(
    State(state): State<AppState>,
    _admin: AdminSession,
    ValidatedJson(req): ValidatedJson<CreateGroupRequest>,
) -> Result<(StatusCode, Json<GroupResponse>), AppError> {
    let group = state.groups.create_group(req.into()).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn update_group(
    State(state): State<AppState>,
    _admin: AdminSession,
    ValidatedPath(group_id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateGroupRequest>,
) -> Result<Json<GroupResponse>, AppError> {
    Ok(Json(state.groups.update_group(group_id, req.into()).await?))
}

pub async fn delete_group(
    State(state): State<AppState>,
    _admin: AdminSession,
    ValidatedPath(group_id): ValidatedPath<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state.groups.delete_group(group_id).await?;
    Ok(Json(MessageResponse::new("Group deleted")))
}

pub async fn add_member(
    State(state): State<AppState>,
    _admin: AdminSession,
    ValidatedPath((group_id, account_id)): ValidatedPath<(Uuid, Uuid)>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .membership
        .add_membership(account_id, group_id)
        .await?;
    Ok(Json(MessageResponse::new("Membership added")))
}

pub async fn remove_member(
    State(state): State<AppState>,
    _admin: AdminSession,
    ValidatedPath((group_id, account_id)): ValidatedPath<(Uuid, Uuid)>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .membership
        .remove_membership(account_id, group_id)
        .await?;
    Ok(Json(MessageResponse::new("Membership removed")))
}
