//! API handlers for Athenaeum REST endpoints

pub mod auth;
pub mod authors;
pub mod books;
pub mod borrowings;
pub mod health;
pub mod members;
pub mod profiles;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{auth as access, AppState};

/// Mount point of every versioned route
pub const API_PREFIX: &str = "/api/v1";

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/me", get(auth::me))
        // Catalogue
        .route("/authors", get(authors::list_authors).post(authors::create_author))
        .route(
            "/authors/:id",
            get(authors::get_author)
                .put(authors::update_author)
                .delete(authors::delete_author),
        )
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        // Members
        .route("/members", get(members::list_members).post(members::create_member))
        .route(
            "/members/:id",
            get(members::get_member)
                .put(members::update_member)
                .delete(members::delete_member),
        )
        .route("/members/:id/status", put(members::update_member_status))
        .route("/members/:id/borrowings", get(members::get_member_borrowings))
        // Profiles
        .route("/profiles", get(profiles::list_profiles).post(profiles::create_profile))
        .route(
            "/profiles/:id",
            get(profiles::get_profile)
                .put(profiles::update_profile)
                .delete(profiles::delete_profile),
        )
        // Borrowings
        .route(
            "/borrowings",
            get(borrowings::list_borrowings).post(borrowings::create_borrowing),
        )
        .route(
            "/borrowings/:id",
            get(borrowings::get_borrowing)
                .put(borrowings::update_borrowing)
                .delete(borrowings::delete_borrowing),
        )
        .route("/borrowings/:id/approve", post(borrowings::approve_borrowing))
        .route("/borrowings/:id/return", post(borrowings::return_borrowing))
        // Layers run bottom-up: the gate resolves the caller before the policy runs
        .layer(middleware::from_fn_with_state(
            state.clone(),
            access::policy::authorize,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            access::gate::authenticate,
        ))
        .with_state(state);

    Router::new()
        .nest(API_PREFIX, api_v1)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::Role, testing::TestContext};
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(
        ctx: &TestContext,
        method: Method,
        path: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method(method)
            .uri(format!("{}{}", API_PREFIX, path));
        if let Some(bearer) = bearer {
            request = request.header(header::AUTHORIZATION, bearer);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = ctx.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_lending_scenario() {
        let ctx = TestContext::new();
        let m = ctx.seed_member("m@x.com", &[Role::Member]);
        let other = ctx.seed_member("o@x.com", &[Role::Member]);
        let staff = ctx.seed_member("lib@x.com", &[Role::Librarian]);
        let b1 = ctx.seed_book("Dune");

        let member_auth = ctx.bearer(&m).await;
        let other_auth = ctx.bearer(&other).await;
        let staff_auth = ctx.bearer(&staff).await;

        let request = json!({
            "book_id": b1.id,
            "book_title": "Dune",
            "member_id": m.id,
            "member_email": "m@x.com",
        });
        let (status, record) =
            send(&ctx, Method::POST, "/borrowings", Some(&member_auth), Some(request)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(record["approved"], false);
        assert_eq!(record["state"], "requested");
        let id = record["id"].as_i64().unwrap();

        let (status, record) = send(
            &ctx,
            Method::POST,
            &format!("/borrowings/{}/approve", id),
            Some(&staff_auth),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(record["approved"], true);
        assert!(record["return_date"].is_null());

        let path = format!("/borrowings/{}", id);
        let (status, _) = send(&ctx, Method::DELETE, &path, Some(&other_auth), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&ctx, Method::DELETE, &path, Some(&member_auth), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&ctx, Method::GET, &path, Some(&staff_auth), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_anonymous_access() {
        let ctx = TestContext::new();
        let m = ctx.seed_member("m@x.com", &[Role::Member]);
        let b1 = ctx.seed_book("Dune");

        let (status, book) = send(&ctx, Method::GET, &format!("/books/{}", b1.id), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(book["title"], "Dune");

        let (status, body) = send(
            &ctx,
            Method::POST,
            "/borrowings",
            None,
            Some(json!({ "book_id": b1.id, "member_id": m.id, "member_email": "m@x.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "NotAuthorized");

        let (status, _) = send(&ctx, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_huge_page_number_reads_empty_page() {
        let ctx = TestContext::new();
        ctx.seed_book("Dune");

        let (status, page) =
            send(&ctx, Method::GET, "/books?page=9223372036854775807", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["items"], json!([]));
        assert_eq!(page["total"], 1);
    }

    #[tokio::test]
    async fn test_listings_are_gzipped_on_request() {
        let ctx = TestContext::new();
        for title in ["Dune", "Hyperion", "Solaris"] {
            ctx.seed_book(title);
        }

        let request = Request::builder()
            .uri(format!("{}/books", API_PREFIX))
            .header(header::ACCEPT_ENCODING, "gzip")
            .body(Body::empty())
            .unwrap();
        let response = ctx.router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
    }

    #[tokio::test]
    async fn test_member_cannot_borrow_for_someone_else() {
        let ctx = TestContext::new();
        let m = ctx.seed_member("m@x.com", &[Role::Member]);
        let other = ctx.seed_member("o@x.com", &[Role::Member]);
        let b1 = ctx.seed_book("Dune");
        let auth = ctx.bearer(&m).await;

        let (status, _) = send(
            &ctx,
            Method::POST,
            "/borrowings",
            Some(&auth),
            Some(json!({ "book_id": b1.id, "member_id": other.id, "member_email": "o@x.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(ctx.borrowings.writes(), 0);
    }

    #[tokio::test]
    async fn test_member_reads_only_own_account() {
        let ctx = TestContext::new();
        let m = ctx.seed_member("m@x.com", &[Role::Member]);
        let other = ctx.seed_member("o@x.com", &[Role::Member]);
        let auth = ctx.bearer(&m).await;

        let (status, me) = send(&ctx, Method::GET, &format!("/members/{}", m.id), Some(&auth), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "m@x.com");
        assert!(me.get("password").is_none());

        let (status, _) =
            send(&ctx, Method::GET, &format!("/members/{}", other.id), Some(&auth), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&ctx, Method::GET, "/members/4040", Some(&auth), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_register_grants_member_role() {
        let ctx = TestContext::new();

        let (status, member) = send(
            &ctx,
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "email": "new@x.com", "name": "New", "password": "long-enough" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(member["roles"], json!(["MEMBER"]));

        let (status, _) = send(
            &ctx,
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "email": "NEW@x.com", "name": "Again", "password": "long-enough" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_only_admins_manage_accounts() {
        let ctx = TestContext::new();
        let m = ctx.seed_member("m@x.com", &[Role::Member]);
        let librarian = ctx.seed_member("lib@x.com", &[Role::Librarian]);
        let admin = ctx.seed_member("admin@x.com", &[Role::Admin]);
        let lib_auth = ctx.bearer(&librarian).await;
        let admin_auth = ctx.bearer(&admin).await;
        let status_path = format!("/members/{}/status", m.id);
        let locked = json!({
            "enabled": true,
            "account_non_expired": true,
            "account_non_locked": false,
            "credentials_non_expired": true,
        });

        let (status, _) =
            send(&ctx, Method::PUT, &status_path, Some(&lib_auth), Some(locked.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) =
            send(&ctx, Method::PUT, &status_path, Some(&admin_auth), Some(locked)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["account_non_locked"], false);

        let (status, _) = send(
            &ctx,
            Method::POST,
            "/members",
            Some(&admin_auth),
            Some(json!({ "email": "x@x.com", "name": "X", "password": "long-enough", "roles": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_locked_member_token_is_ignored() {
        let ctx = TestContext::new();
        let m = ctx.seed_member("m@x.com", &[Role::Member]);
        let auth = ctx.bearer(&m).await;
        ctx.lock_member(m.id).await;

        let (status, _) = send(&ctx, Method::GET, "/auth/me", Some(&auth), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
