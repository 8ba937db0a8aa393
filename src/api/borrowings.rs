//! Borrowing endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    auth::CurrentPrincipal,
    error::AppResult,
    models::{
        borrowing::{BorrowingResponse, CreateBorrowing, ReturnBorrowing, UpdateBorrowing},
        Page, PageQuery,
    },
    AppState,
};

pub async fn list_borrowings(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Page<BorrowingResponse>>> {
    principal.require_staff()?;

    let page = state.services.borrowings.list(&query).await?;
    Ok(Json(page.map(BorrowingResponse::from)))
}

/// Request a book; the record starts unapproved
pub async fn create_borrowing(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(request): Json<CreateBorrowing>,
) -> AppResult<(StatusCode, Json<BorrowingResponse>)> {
    let record = state.services.borrowings.request(&principal, request).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

pub async fn get_borrowing(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowingResponse>> {
    let record = state.services.borrowings.get(&principal, id).await?;
    Ok(Json(record.into()))
}

pub async fn update_borrowing(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
    Json(update): Json<UpdateBorrowing>,
) -> AppResult<Json<BorrowingResponse>> {
    let record = state.services.borrowings.update(&principal, id, update).await?;
    Ok(Json(record.into()))
}

pub async fn approve_borrowing(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowingResponse>> {
    let record = state.services.borrowings.approve(&principal, id).await?;
    Ok(Json(record.into()))
}

/// Mark the book as returned; an empty body means "now"
pub async fn return_borrowing(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
    request: Option<Json<ReturnBorrowing>>,
) -> AppResult<Json<BorrowingResponse>> {
    let Json(request) = request.unwrap_or_default();

    let record = state
        .services
        .borrowings
        .return_book(&principal, id, request.return_date)
        .await?;
    Ok(Json(record.into()))
}

pub async fn delete_borrowing(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.borrowings.delete(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
