//! Author endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    auth::CurrentPrincipal,
    error::AppResult,
    models::{
        author::{CreateAuthor, UpdateAuthor},
        Author, Page, PageQuery,
    },
    AppState,
};

pub async fn list_authors(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Page<Author>>> {
    let page = state.services.catalog.list_authors(&query).await?;
    Ok(Json(page))
}

pub async fn get_author(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Author>> {
    let author = state.services.catalog.get_author(id).await?;
    Ok(Json(author))
}

pub async fn create_author(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(author): Json<CreateAuthor>,
) -> AppResult<(StatusCode, Json<Author>)> {
    principal.require_staff()?;
    author.validate()?;

    let created = state.services.catalog.create_author(author).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_author(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
    Json(author): Json<UpdateAuthor>,
) -> AppResult<Json<Author>> {
    principal.require_staff()?;

    let updated = state.services.catalog.update_author(id, author).await?;
    Ok(Json(updated))
}

pub async fn delete_author(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    principal.require_staff()?;

    state.services.catalog.delete_author(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
