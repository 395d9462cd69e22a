use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::{
        accounts::{CreateAccountRequest, GroupIdsRequest, ResetPasswordRequest, UpdateAccountRequest},
        MessageResponse,
    },
    guard::forbid_self,
    middleware::{AdminSession, CurrentSession},
    models::{AccountChanges, AccountResponse, GroupSummary},
    utils::{Password, ValidatedJson, ValidatedPath},
    AppState,
};

pub async fn list_accounts(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> Result<Json<Vec<AccountResponse>>, AppError> {
    Ok(Json(state.credentials.list_accounts().await?))
}

pub async fn create_account(
    State(state): State<AppState>,
    _admin: AdminSession,
    ValidatedJson(req): ValidatedJson<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), AppError> {
    let account = state.credentials.create_account(req.into()).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn get_account(
    State(state): State<AppState>,
    _admin: AdminSession,
    ValidatedPath(account_id): ValidatedPath<Uuid>,
) -> Result<Json<AccountResponse>, AppError> {
    Ok(Json(state.credentials.get_account(account_id).await?))
}

pub async fn update_account(
    State(state): State<AppState>,
    _admin: AdminSession,
    CurrentSession(context): CurrentSession,
    ValidatedPath(account_id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateAccountRequest>,
) -> Result<Json<AccountResponse>, AppError> {
    let changes = AccountChanges::from(req);
    let password_changed = changes.password.is_some();

    let account = state
        .credentials
        .update_account(account_id, changes)
        .await?;

    if password_changed {
        state
            .authenticator
            .password_changed(account_id, context.token.as_deref());
    }
    Ok(Json(account))
}

/// Delete an account. Callers may not delete themselves.
pub async fn delete_account(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    ValidatedPath(account_id): ValidatedPath<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    forbid_self(&admin, account_id).map_err(|e| {
        tracing::warn!(%account_id, "Refused self-deletion");
        AppError::from(e)
    })?;

    state.credentials.delete_account(account_id).await?;
    state.authenticator.account_removed(account_id);

    Ok(Json(MessageResponse::new("Account deleted")))
}

pub async fn activate_account(
    State(state): State<AppState>,
    _admin: AdminSession,
    ValidatedPath(account_id): ValidatedPath<Uuid>,
) -> Result<Json<AccountResponse>, AppError> {
    Ok(Json(state.credentials.set_active(account_id, true).await?))
}

pub async fn deactivate_account(
    State(state): State<AppState>,
    _admin: AdminSession,
    ValidatedPath(account_id): ValidatedPath<Uuid>,
) -> Result<Json<AccountResponse>, AppError> {
    Ok(Json(state.credentials.set_active(account_id, false).await?))
}

pub async fn toggle_active(
    State(state): State<AppState>,
    _admin: AdminSession,
    ValidatedPath(account_id): ValidatedPath<Uuid>,
) -> Result<Json<AccountResponse>, AppError> {
    Ok(Json(state.credentials.toggle_active(account_id).await?))
}

pub async fn make_admin(
    State(state): State<AppState>,
    _admin: AdminSession,
    ValidatedPath(account_id): ValidatedPath<Uuid>,
) -> Result<Json<AccountResponse>, AppError> {
    Ok(Json(state.credentials.set_admin(account_id, true).await?))
}

pub async fn remove_admin(
    State(state): State<AppState>,
    _admin: AdminSession,
    ValidatedPath(account_id): ValidatedPath<Uuid>,
) -> Result<Json<AccountResponse>, AppError> {
    Ok(Json(state.credentials.set_admin(account_id, false).await?))
}

pub async fn toggle_admin(
    State(state): State<AppState>,
    _admin: AdminSession,
    ValidatedPath(account_id): ValidatedPath<Uuid>,
) -> Result<Json<AccountResponse>, AppError> {
    Ok(Json(state.credentials.toggle_admin(account_id).await?))
}

pub async fn reset_password(
    State(state): State<AppState>,
    _admin: AdminSession,
    CurrentSession(context): CurrentSession,
    ValidatedPath(account_id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .credentials
        .set_password(account_id, &Password::new(req.new_password))
        .await?;
    state
        .authenticator
        .password_changed(account_id, context.token.as_deref());

    Ok(Json(MessageResponse::new("Password reset")))
}

pub async fn account_groups(
    State(state): State<AppState>,
    _admin: AdminSession,
    ValidatedPath(account_id): ValidatedPath<Uuid>,
) -> Result<Json<Vec<GroupSummary>>, AppError> {
    let groups = state.membership.groups_of(account_id).await?;
    Ok(Json(groups.into_iter().map(GroupSummary::from).collect()))
}

/// Add the account to every listed group, keeping existing memberships.
pub async fn add_account_groups(
    State(state): State<AppState>,
    _admin: AdminSession,
    ValidatedPath(account_id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<GroupIdsRequest>,
) -> Result<Json<Vec<GroupSummary>>, AppError> {
    let groups = state
        .membership
        .add_memberships(account_id, &req.group_ids)
        .await?;
    Ok(Json(groups.into_iter().map(GroupSummary::from).collect()))
}

/// Make the listed groups the account's exact membership set.
pub async fn replace_account_groups(
    State(state): State<AppState>,
    _admin: AdminSession,
    ValidatedPath(account_id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<GroupIdsRequest>,
) -> Result<Json<Vec<GroupSummary>>, AppError> {
    let groups = state
        .membership
        .replace_groups_of(account_id, &req.group_ids)
        .await?;
    Ok(Json(groups.into_iter().map(GroupSummary::from).collect()))
}

pub async fn remove_account_group(
    State(state): State<AppState>,
    _admin: AdminSession,
    ValidatedPath((account_id, group_id)): ValidatedPath<(Uuid, Uuid)>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .membership
        .remove_membership(account_id, group_id)
        .await?;
    Ok(Json(MessageResponse::new("Membership removed")))
}
