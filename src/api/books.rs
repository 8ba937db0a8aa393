//! Book endpoints

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
        book::{CreateBook, UpdateBook},
        Book, Page, PageQuery,
    },
    AppState,
};

/// List the catalogue
pub async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Page<Book>>> {
    let page = state.services.catalog.list_books(&query).await?;
    Ok(Json(page))
}

pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

pub async fn create_book(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(book): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    principal.require_staff()?;
    book.validate()?;

    let created = state.services.catalog.create_book(book).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_book(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
    Json(book): Json<UpdateBook>,
) -> AppResult<Json<Book>> {
    principal.require_staff()?;

    let updated = state.services.catalog.update_book(id, book).await?;
    Ok(Json(updated))
}

pub async fn delete_book(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    principal.require_staff()?;

    state.services.catalog.delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
