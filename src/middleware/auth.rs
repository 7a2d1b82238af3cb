//! JWT Authentication Middleware
//!
//! This module provides bearer-token authentication for the audit API.

use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, TokenData,
    Validation,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{config::AuthConfig, utils::error::AppError, AppState};

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (caller identity)
    pub sub: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Not before timestamp
    pub nbf: i64,
    /// JWT ID (unique identifier for this token)
    pub jti: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

/// Authenticated caller extracted from the bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub subject: String,
    pub token_id: String,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            subject: claims.sub,
            token_id: claims.jti,
        }
    }
}

/// Create a new JWT access token for `subject`
pub fn create_access_token(
    subject: &str,
    config: &AuthConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let lifetime = i64::try_from(config.token_expiry_hours)
        .ok()
        .and_then(Duration::try_hours)
        .unwrap_or(Duration::MAX);
    let exp = now.checked_add_signed(lifetime).unwrap_or(DateTime::<Utc>::MAX_UTC);

    let claims = Claims {
        sub: subject.to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
        nbf: now.timestamp(),
        jti: Uuid::new_v4().to_string(),
        iss: config.issuer.clone(),
        aud: config.audience.clone(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

/// Validate and decode a JWT token
pub fn validate_token(token: &str, config: &AuthConfig) -> Result<TokenData<Claims>, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    if let Some(ref issuer) = config.issuer {
        validation.set_issuer(&[issuer]);
    }
    match config.audience {
        Some(ref audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })
}

/// Authentication error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    TokenExpired,
}

impl AuthError {
    fn message(self) -> &'static str {
        match self {
            AuthError::MissingToken => "Missing authentication token",
            AuthError::InvalidToken => "Invalid authentication token",
            AuthError::TokenExpired => "Authentication token has expired",
        }
    }

    /// The `WWW-Authenticate` challenge for this failure.
    pub fn challenge(self, realm: &str) -> String {
        match self {
            AuthError::MissingToken => format!("Bearer realm=\"{}\"", realm),
            AuthError::InvalidToken | AuthError::TokenExpired => format!(
                "Bearer realm=\"{}\", error=\"invalid_token\", error_description=\"{}\"",
                realm,
                self.message()
            ),
        }
    }

    /// 401 ProblemDetails response carrying the challenge header.
    pub fn into_response_for(self, realm: &str) -> Response {
        let mut response = AppError::unauthorized(self.message()).into_response();
        if let Ok(value) = HeaderValue::from_str(&self.challenge(realm)) {
            response.headers_mut().insert(WWW_AUTHENTICATE, value);
        }
        response
    }
}

/// Extract bearer token from Authorization header
fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware
///
/// Validates the bearer token from the Authorization header and injects the
/// AuthUser into request extensions. A no-op when authentication is disabled.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth = &state.config.auth;
    if !auth.enabled {
        return next.run(request).await;
    }

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let result = match header {
        None => Err(AuthError::MissingToken),
        Some(value) => extract_bearer_token(value)
            .ok_or(AuthError::InvalidToken)
            .and_then(|token| validate_token(token, auth)),
    };

    match result {
        Ok(token_data) => {
            let user = AuthUser::from(token_data.claims);
            debug!(subject = %user.subject, "Authenticated request");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(err) => {
            debug!(reason = err.message(), "Rejected request");
            err.into_response_for(&auth.realm)
        }
    }
}
