//! JWT handling for the Copydesk server.
//!
//! Two token types are in play:
//! * **Login tokens** are issued by the external identity provider and signed with the shared
//!   `CPD_IDP_SECRET`. They carry the user's identity, a strictly-increasing nonce and the roles the
//!   caller wants on their session.
//! * **Access tokens** are issued by this server from `/auth` after the login token checks out, signed
//!   with `CPD_JWT_SECRET`, and presented on every `/api` call as `Authorization: Bearer <token>`.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use chrono::{Duration, Utc};
use copydesk_engine::{
    db_types::Roles,
    policy::Actor,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

pub const AUTH_HEADER: &str = "cpd_auth_token";

/// Claims of an access token issued by this server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The identity-provider user id.
    pub sub: String,
    pub email: String,
    pub name: String,
    pub roles: Roles,
    pub iat: i64,
    pub exp: i64,
}

impl JwtClaims {
    pub fn actor(&self) -> Actor {
        Actor { user_id: Some(self.sub.clone()), email: Some(self.email.clone()), roles: self.roles.clone() }
    }
}

/// Extracts validated claims that the JWT middleware stored on the request. Routes using this extractor
/// must sit inside a scope wrapped with [`crate::middleware::JwtMiddlewareFactory`].
impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned().ok_or_else(|| {
            ServerError::AuthenticationError(AuthError::ValidationError("no access token on request".into()))
        });
        ready(claims)
    }
}

/// Claims of a login token minted by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginToken {
    pub sub: String,
    pub email: String,
    pub name: String,
    /// Must strictly increase on every login call; a unix timestamp works well.
    pub nonce: u64,
    pub desired_roles: Roles,
    pub exp: i64,
}

/// Verifies a login token against the identity-provider secret.
pub fn check_login_token_signature(token: &str, config: &AuthConfig) -> Result<LoginToken, AuthError> {
    let key = DecodingKey::from_secret(config.idp_secret.reveal().as_bytes());
    let mut validation = Validation::default();
    validation.set_required_spec_claims(&["exp"]);
    let data = decode::<LoginToken>(token, &key, &validation)
        .map_err(|e| AuthError::ValidationError(e.to_string()))?;
    Ok(data.claims)
}

/// Verifies an access token issued by this server and returns its claims.
pub fn validate_access_token(token: &str, config: &AuthConfig) -> Result<JwtClaims, AuthError> {
    let key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
    let mut validation = Validation::default();
    validation.set_required_spec_claims(&["exp"]);
    let data =
        decode::<JwtClaims>(token, &key, &validation).map_err(|e| AuthError::ValidationError(e.to_string()))?;
    Ok(data.claims)
}

pub struct TokenIssuer {
    encoding_key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        Self { encoding_key }
    }

    /// Issue a new access token for the given login token.
    /// This method DOES NOT verify that the `login_token` contains legitimate information. This must be
    /// done prior to calling `issue_token`.
    pub fn issue_token(&self, login_token: LoginToken, duration: Option<Duration>) -> Result<String, AuthError> {
        let now = Utc::now();
        let duration = duration.unwrap_or_else(|| Duration::hours(24));
        let claims = JwtClaims {
            sub: login_token.sub,
            email: login_token.email,
            name: login_token.name,
            roles: login_token.desired_roles,
            iat: now.timestamp(),
            exp: (now + duration).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::ValidationError(e.to_string()))
    }
}
