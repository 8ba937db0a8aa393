//! Route-level access policy
//!
//! Every request under `/api/v1` is matched against an ordered list of
//! [`RouteRule`]s. Rules are sorted most specific first when the policy is
//! built, so a catch-all declared early never shadows a narrower rule. The
//! first rule whose method and pattern match decides; a rule passes when any
//! one of its requirements holds. A request no rule matches is denied.

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use std::cmp::Reverse;

use crate::{
    error::{AppError, AppResult},
    models::member::{Role, STAFF},
    AppState,
};

use super::Principal;

/// Largest body buffered for a payload check
const MAX_INSPECTED_BODY: usize = 1024 * 1024;

const ADMIN: &[Role] = &[Role::Admin];

/// Resource kinds whose owner can be resolved from a path id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    Member,
    Profile,
    Borrowing,
}

/// Body fields that can be matched against the caller's identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadField {
    MemberEmail,
}

impl PayloadField {
    pub fn key(&self) -> &'static str {
        match self {
            PayloadField::MemberEmail => "member_email",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Public,
    Authenticated,
    AnyRole(&'static [Role]),
    /// The resource named by the path's `:id` belongs to the caller
    Owner(Ownership),
    /// A field of the JSON body names the caller
    PayloadClaim(PayloadField),
}

/// Looks up who owns a resource
#[async_trait]
pub trait OwnershipResolver: Send + Sync {
    /// Email of the owning member, `None` when the resource does not exist
    async fn owner_email(&self, kind: Ownership, id: i32) -> AppResult<Option<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
    /// `**`, the remainder of the path (possibly empty)
    Rest,
}

/// Path pattern such as `/books`, `/borrowings/:id/approve` or `/books/**`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "**" => Segment::Rest,
                s if s.starts_with(':') => Segment::Param,
                s => Segment::Literal(s.to_string()),
            })
            .collect();

        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    /// Captured `:param` values when `path` matches
    fn captures(&self, path: &str) -> Option<Vec<String>> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut captures = Vec::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Rest => return Some(captures),
                Segment::Literal(literal) => {
                    if parts.get(i) != Some(&literal.as_str()) {
                        return None;
                    }
                }
                Segment::Param => captures.push(parts.get(i)?.to_string()),
            }
        }

        (parts.len() == self.segments.len()).then_some(captures)
    }

    fn has_rest(&self) -> bool {
        self.segments.contains(&Segment::Rest)
    }

    fn literals(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    fn params(&self) -> usize {
        self.segments.iter().filter(|s| **s == Segment::Param).count()
    }
}

impl std::fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug, Clone)]
pub struct RouteRule {
    /// `None` matches every method
    pub method: Option<Method>,
    pub pattern: RoutePattern,
    pub any_of: Vec<Requirement>,
}

impl RouteRule {
    pub fn new(method: Option<Method>, pattern: &str, any_of: Vec<Requirement>) -> Self {
        Self {
            method,
            pattern: RoutePattern::parse(pattern),
            any_of,
        }
    }

    fn specificity(&self) -> (bool, usize, Reverse<usize>, usize, bool) {
        (
            !self.pattern.has_rest(),
            self.pattern.literals(),
            Reverse(self.pattern.params()),
            self.pattern.segments.len(),
            self.method.is_some(),
        )
    }

    fn matches(&self, method: &Method, path: &str) -> Option<Vec<String>> {
        if self.method.as_ref().is_some_and(|m| m != method) {
            return None;
        }
        self.pattern.captures(path)
    }
}

/// One rule per listed method
fn on(methods: &[Method], pattern: &str, any_of: &[Requirement]) -> Vec<RouteRule> {
    methods
        .iter()
        .map(|m| RouteRule::new(Some(m.clone()), pattern, any_of.to_vec()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NoMatchingRule,
    Unauthenticated,
    Insufficient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

/// What the evaluator needs to know about one request
pub struct AccessRequest<'a> {
    pub principal: Option<&'a Principal>,
    pub method: &'a Method,
    /// Path relative to the API prefix
    pub path: &'a str,
    pub payload: Option<&'a Value>,
}

#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: Vec<RouteRule>,
}

impl AccessPolicy {
    /// Build a policy; rules are reordered most specific first, ties keep
    /// their declaration order
    pub fn new(mut rules: Vec<RouteRule>) -> Self {
        rules.sort_by(|a, b| b.specificity().cmp(&a.specificity()));
        Self { rules }
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    fn matching(&self, method: &Method, path: &str) -> Option<(&RouteRule, Vec<String>)> {
        self.rules
            .iter()
            .find_map(|rule| rule.matches(method, path).map(|captures| (rule, captures)))
    }

    /// Whether deciding this request requires the JSON body
    pub fn needs_payload(&self, method: &Method, path: &str) -> bool {
        self.matching(method, path).is_some_and(|(rule, _)| {
            rule.any_of
                .iter()
                .any(|r| matches!(r, Requirement::PayloadClaim(_)))
        })
    }

    pub async fn evaluate(
        &self,
        request: &AccessRequest<'_>,
        resolver: &dyn OwnershipResolver,
    ) -> AppResult<Decision> {
        let Some((rule, captures)) = self.matching(request.method, request.path) else {
            return Ok(Decision::Deny(DenyReason::NoMatchingRule));
        };

        for requirement in &rule.any_of {
            if satisfied(requirement, request, &captures, resolver).await? {
                return Ok(Decision::Allow);
            }
        }

        Ok(Decision::Deny(match request.principal {
            None => DenyReason::Unauthenticated,
            Some(_) => DenyReason::Insufficient,
        }))
    }
}

async fn satisfied(
    requirement: &Requirement,
    request: &AccessRequest<'_>,
    captures: &[String],
    resolver: &dyn OwnershipResolver,
) -> AppResult<bool> {
    if *requirement == Requirement::Public {
        return Ok(true);
    }
    let Some(principal) = request.principal else {
        return Ok(false);
    };

    match requirement {
        Requirement::Public | Requirement::Authenticated => Ok(true),
        Requirement::AnyRole(roles) => Ok(principal.has_any_role(roles)),
        Requirement::Owner(kind) => {
            // Unparsable and unknown ids are both plain denials
            let Some(id) = captures.first().and_then(|c| c.parse::<i32>().ok()) else {
                return Ok(false);
            };
            Ok(resolver
                .owner_email(*kind, id)
                .await?
                .is_some_and(|email| principal.is(&email)))
        }
        Requirement::PayloadClaim(field) => Ok(request
            .payload
            .and_then(|p| p.get(field.key()))
            .and_then(Value::as_str)
            .is_some_and(|email| principal.is(email))),
    }
}

impl Default for AccessPolicy {
    /// Route table of the lending API, relative to `/api/v1`
    fn default() -> Self {
        use Requirement::*;

        let staff = AnyRole(STAFF);
        let admin = AnyRole(ADMIN);
        let (get, post, put, delete) = (Method::GET, Method::POST, Method::PUT, Method::DELETE);

        let mut rules = vec![
            // Catch-all first: ordering is by specificity, not declaration
            RouteRule::new(None, "/**", vec![Authenticated]),
        ];

        rules.extend(on(&[get.clone()], "/health", &[Public]));
        rules.extend(on(&[get.clone()], "/ready", &[Public]));
        rules.extend(on(&[post.clone()], "/auth/login", &[Public]));
        rules.extend(on(&[post.clone()], "/auth/register", &[Public]));
        rules.extend(on(&[get.clone()], "/auth/me", &[Authenticated]));

        for catalogue in ["/authors/**", "/books/**"] {
            rules.extend(on(&[get.clone()], catalogue, &[Public]));
            rules.extend(on(&[post.clone(), put.clone(), delete.clone()], catalogue, &[staff]));
        }

        rules.extend(on(&[get.clone()], "/members", &[staff]));
        rules.extend(on(&[post.clone()], "/members", &[admin]));
        rules.extend(on(
            &[get.clone(), put.clone()],
            "/members/:id",
            &[staff, Owner(Ownership::Member)],
        ));
        rules.extend(on(&[delete.clone()], "/members/:id", &[admin]));
        rules.extend(on(&[put.clone()], "/members/:id/status", &[admin]));
        rules.extend(on(
            &[get.clone()],
            "/members/:id/borrowings",
            &[staff, Owner(Ownership::Member)],
        ));

        rules.extend(on(&[get.clone()], "/profiles", &[staff]));
        rules.extend(on(
            &[post.clone()],
            "/profiles",
            &[staff, PayloadClaim(PayloadField::MemberEmail)],
        ));
        rules.extend(on(
            &[get.clone(), put.clone(), delete.clone()],
            "/profiles/:id",
            &[staff, Owner(Ownership::Profile)],
        ));

        rules.extend(on(&[get.clone()], "/borrowings", &[staff]));
        rules.extend(on(
            &[post.clone()],
            "/borrowings",
            &[staff, PayloadClaim(PayloadField::MemberEmail)],
        ));
        rules.extend(on(
            &[get, put, delete],
            "/borrowings/:id",
            &[staff, Owner(Ownership::Borrowing)],
        ));
        rules.extend(on(&[post.clone()], "/borrowings/:id/approve", &[staff]));
        rules.extend(on(&[post], "/borrowings/:id/return", &[staff]));

        Self::new(rules)
    }
}

/// Strip the API prefix when the layer sees the full path
fn relative_path(path: &str) -> &str {
    match path.strip_prefix(crate::api::API_PREFIX) {
        Some("") => "/",
        Some(rest) => rest,
        None => path,
    }
}

/// Enforce the access policy; runs after the authentication gate
pub async fn authorize(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let method = request.method().clone();
    let path = relative_path(request.uri().path()).to_string();
    let principal = request.extensions().get::<Principal>().cloned();

    let (request, payload) = if state.policy.needs_payload(&method, &path) {
        let (parts, body) = request.into_parts();
        let bytes = axum::body::to_bytes(body, MAX_INSPECTED_BODY)
            .await
            .map_err(|e| AppError::BadRequest(format!("Unreadable request body: {}", e)))?;
        let payload = serde_json::from_slice::<Value>(&bytes).ok();
        (Request::from_parts(parts, Body::from(bytes)), payload)
    } else {
        (request, None)
    };

    let decision = state
        .policy
        .evaluate(
            &AccessRequest {
                principal: principal.as_ref(),
                method: &method,
                path: &path,
                payload: payload.as_ref(),
            },
            state.services.as_ref(),
        )
        .await?;

    match decision {
        Decision::Allow => Ok(next.run(request).await),
        Decision::Deny(reason) => {
            tracing::info!(
                %method,
                path = %path,
                caller = principal.as_ref().map(|p| p.email.as_str()).unwrap_or("anonymous"),
                ?reason,
                "access denied"
            );
            Err(AppError::forbidden())
        }
    }
}
