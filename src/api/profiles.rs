//! Member profile endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    auth::{CurrentPrincipal, Principal},
    error::{AppError, AppResult},
    models::{
        profile::{CreateProfile, UpdateProfile},
        MemberProfile, Page, PageQuery,
    },
    AppState,
};

fn require_owner_or_staff(principal: &Principal, profile: &MemberProfile) -> AppResult<()> {
    if principal.is_staff() || principal.member_id == profile.member_id {
        Ok(())
    } else {
        Err(AppError::forbidden())
    }
}

pub async fn list_profiles(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Page<MemberProfile>>> {
    principal.require_staff()?;

    let page = state.services.profiles.list(&query).await?;
    Ok(Json(page))
}

/// Create the profile of the member named by `member_email`
pub async fn create_profile(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(profile): Json<CreateProfile>,
) -> AppResult<(StatusCode, Json<MemberProfile>)> {
    if !principal.is_staff() && !principal.is(&profile.member_email) {
        return Err(AppError::forbidden());
    }
    profile.validate()?;

    let created = state.services.profiles.create(profile).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_profile(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
) -> AppResult<Json<MemberProfile>> {
    let profile = state.services.profiles.get_by_id(id).await?;
    require_owner_or_staff(&principal, &profile)?;
    Ok(Json(profile))
}

pub async fn update_profile(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
    Json(update): Json<UpdateProfile>,
) -> AppResult<Json<MemberProfile>> {
    let profile = state.services.profiles.get_by_id(id).await?;
    require_owner_or_staff(&principal, &profile)?;

    let updated = state.services.profiles.update(id, update).await?;
    Ok(Json(updated))
}

pub async fn delete_profile(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    let profile = state.services.profiles.get_by_id(id).await?;
    require_owner_or_staff(&principal, &profile)?;

    state.services.profiles.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
