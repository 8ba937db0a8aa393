//! Identity token issuing and verification

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult, EntityKind},
    models::{Member, Role},
};

use super::members::{verify_password, MembersService};

/// Claims carried by every identity token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Member email
    pub sub: String,
    pub iss: String,
    pub roles: BTreeSet<Role>,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly signed token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenService {
    members: MembersService,
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    lifetime: Duration,
}

impl TokenService {
    pub fn new(members: MembersService, config: &AuthConfig) -> Self {
        Self {
            members,
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.issuer.clone(),
            lifetime: Duration::hours(config.jwt_expiration_hours as i64),
        }
    }

    /// Issue a token for the member registered under `email`
    pub async fn issue(&self, email: &str) -> AppResult<IssuedToken> {
        self.issue_at(email, Utc::now()).await
    }

    pub async fn issue_at(&self, email: &str, now: DateTime<Utc>) -> AppResult<IssuedToken> {
        let member = self.members.find_by_email(email).await?.ok_or_else(|| {
            AppError::NotFound(EntityKind::Member, format!("No member with email {}", email))
        })?;
        self.sign(&member, now)
    }

    fn sign(&self, member: &Member, now: DateTime<Utc>) -> AppResult<IssuedToken> {
        let expires_at = now + self.lifetime;
        let claims = TokenClaims {
            sub: member.email.clone(),
            iss: self.issuer.clone(),
            roles: member.roles.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Check signature, issuer and expiry; never consults the store
    pub fn verify(&self, token: &str) -> AppResult<TokenClaims> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> AppResult<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below, strictly and against the given clock
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["sub", "iss", "exp"]);

        let claims = decode::<TokenClaims>(token, &self.decoding, &validation)
            .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))?
            .claims;

        if claims.exp <= now.timestamp() {
            return Err(AppError::Authentication("Token expired".to_string()));
        }

        Ok(claims)
    }

    /// Check credentials and account gates, then issue a token
    pub async fn login(&self, email: &str, password: &str) -> AppResult<(IssuedToken, Member)> {
        let invalid = || AppError::Authentication("Invalid email or password".to_string());

        let Some(member) = self.members.find_by_email(email).await? else {
            // Pay the same argon2 cost as a real check
            verify_password(ABSENT_MEMBER_HASH, password)?;
            return Err(invalid());
        };

        if !verify_password(&member.password, password)? {
            tracing::debug!(member_id = member.id, "login rejected: wrong password");
            return Err(invalid());
        }

        if !member.is_active() {
            return Err(AppError::Authentication("Account is disabled or locked".to_string()));
        }

        let issued = self.sign(&member, Utc::now())?;
        tracing::info!(member_id = member.id, "member logged in");
        Ok((issued, member.as_ref().clone()))
    }
}

/// Well-formed hash with default argon2 parameters that no password matches
const ABSENT_MEMBER_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$J9bme5qtAR6sJ5gffhlCXQ$2vXTqZcn67jk2VDO4S5VCBdXmVqHw5aHPSrImmLTI2Q";
