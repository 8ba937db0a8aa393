//! Authentication endpoints

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    auth::CurrentPrincipal,
    error::AppResult,
    models::member::{MemberResponse, RegisterMember},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub member: MemberResponse,
}

/// Exchange credentials for a bearer token
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let (issued, member) = state
        .services
        .tokens
        .login(&request.email, &request.password)
        .await?;

    Ok(Json(LoginResponse {
        token: issued.token,
        token_type: "Bearer".to_string(),
        expires_at: issued.expires_at,
        member: member.into(),
    }))
}

/// Self-registration; the new account holds the MEMBER role only
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterMember>,
) -> AppResult<(StatusCode, Json<MemberResponse>)> {
    request.validate()?;

    let member = state.services.members.register(request).await?;
    Ok((StatusCode::CREATED, Json(member.into())))
}

/// Current member
pub async fn me(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> AppResult<Json<MemberResponse>> {
    let member = state.services.members.get_by_id(principal.member_id).await?;
    Ok(Json(member.into()))
}
