//! Member account endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    auth::{CurrentPrincipal, Principal},
    error::{AppError, AppResult},
    models::{
        borrowing::BorrowingResponse,
        member::{AccountStatus, CreateMember, MemberResponse, UpdateMember},
        Page, PageQuery,
    },
    AppState,
};

/// Staff or the member themselves
fn require_self_or_staff(principal: &Principal, member_id: i32) -> AppResult<()> {
    if principal.is_staff() || principal.member_id == member_id {
        Ok(())
    } else {
        Err(AppError::forbidden())
    }
}

pub async fn list_members(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Page<MemberResponse>>> {
    principal.require_staff()?;

    let page = state.services.members.list(&query).await?;
    Ok(Json(page.map(MemberResponse::from)))
}

/// Create a member with explicit roles
pub async fn create_member(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(member): Json<CreateMember>,
) -> AppResult<(StatusCode, Json<MemberResponse>)> {
    principal.require_admin()?;
    member.validate()?;

    let created = state.services.members.create(member).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

pub async fn get_member(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
) -> AppResult<Json<MemberResponse>> {
    require_self_or_staff(&principal, id)?;

    let member = state.services.members.get_by_id(id).await?;
    Ok(Json(member.into()))
}

pub async fn update_member(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
    Json(member): Json<UpdateMember>,
) -> AppResult<Json<MemberResponse>> {
    require_self_or_staff(&principal, id)?;
    member.validate()?;

    let updated = state.services.members.update(id, member).await?;
    Ok(Json(updated.into()))
}

/// Open or close the account gates
pub async fn update_member_status(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
    Json(status): Json<AccountStatus>,
) -> AppResult<Json<MemberResponse>> {
    principal.require_admin()?;

    let updated = state.services.members.update_status(id, status).await?;
    tracing::info!(member_id = id, changed_by = %principal.email, ?status, "account status changed");
    Ok(Json(updated.into()))
}

/// Delete a member without active borrowings
pub async fn delete_member(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    principal.require_admin()?;

    state.services.members.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
pub struct MemberBorrowingsQuery {
    /// Only records without a return date
    #[serde(default)]
    pub active: bool,
}

/// Borrowings of one member
pub async fn get_member_borrowings(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
    Query(query): Query<MemberBorrowingsQuery>,
) -> AppResult<Json<Vec<BorrowingResponse>>> {
    require_self_or_staff(&principal, id)?;

    let records = state.services.members.borrowings(id, query.active).await?;
    Ok(Json(records.into_iter().map(BorrowingResponse::from).collect()))
}
