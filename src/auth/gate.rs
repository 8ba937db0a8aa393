//! Authentication gate and principal extractors

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use std::convert::Infallible;

use crate::{error::AppError, services::Services, AppState};

use super::Principal;

/// Attach a [`Principal`] when the request carries a valid bearer token.
///
/// Never fails: a missing, invalid or expired token, an unknown subject or an
/// inactive account all leave the request anonymous. A request that already
/// carries a principal passes through untouched.
pub async fn authenticate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    if request.extensions().get::<Principal>().is_none() {
        if let Some(Authorization(bearer)) = request.headers().typed_get::<Authorization<Bearer>>() {
            if let Some(principal) = resolve_principal(&state.services, bearer.token()).await {
                request.extensions_mut().insert(principal);
            }
        }
    }

    next.run(request).await
}

/// Verify `token` and load its subject
pub async fn resolve_principal(services: &Services, token: &str) -> Option<Principal> {
    let claims = match services.tokens.verify(token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!("bearer token rejected: {}", e);
            return None;
        }
    };

    let member = match services.members.find_by_email(&claims.sub).await {
        Ok(Some(member)) => member,
        Ok(None) => {
            tracing::debug!(subject = %claims.sub, "token subject no longer exists");
            return None;
        }
        Err(e) => {
            tracing::warn!(subject = %claims.sub, "failed to load token subject: {}", e);
            return None;
        }
    };

    if !member.is_active() {
        tracing::debug!(member_id = member.id, "inactive account presented a token");
        return None;
    }

    Some(Principal::new(&member, claims.roles))
}

/// Principal of an authenticated request; 401 when the caller is anonymous
pub struct CurrentPrincipal(pub Principal);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentPrincipal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentPrincipal)
            .ok_or_else(|| AppError::Authentication("Authentication required".to_string()))
    }
}

/// Principal if any
pub struct MaybePrincipal(pub Option<Principal>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for MaybePrincipal {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybePrincipal(parts.extensions.get::<Principal>().cloned()))
    }
}
