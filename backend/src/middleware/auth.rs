//! Authentication middleware
//!
//! Bearer token verification and role-gated extractors. Tokens are HS256 JWTs
//! issued by the identity provider; `sub` is the provider's user id.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::AppState;

/// Authenticated user information extracted from the bearer token
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl AuthUser {
    /// Check if the user carries the given role
    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Decode and validate a JWT
pub fn decode_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })
}

/// Extract the bearer token, `Ok(None)` when no Authorization header is sent
fn bearer_token(headers: &HeaderMap) -> AppResult<Option<&str>> {
    match headers.get(AUTHORIZATION) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(|t| Some(t.trim()))
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".to_string())),
    }
}

fn authenticate(state: &AppState, token: &str) -> AppResult<AuthUser> {
    let claims = decode_token(token, &state.config.auth.jwt_secret)?;
    if claims.sub.is_empty() {
        return Err(AppError::InvalidToken);
    }

    Ok(AuthUser {
        user_id: claims.sub,
        email: claims.email,
        role: claims.role,
    })
}

/// Authentication middleware that requires a valid bearer token
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = match bearer_token(request.headers()) {
        Ok(Some(token)) => authenticate(&state, token),
        Ok(None) => Err(AppError::Unauthorized(
            "Missing Authorization header".to_string(),
        )),
        Err(e) => Err(e),
    };

    match user {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Attaches the user when a token is sent; anonymous requests pass through.
/// A token that is sent but invalid is still rejected.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match bearer_token(request.headers()) {
        Ok(Some(token)) => match authenticate(&state, token) {
            Ok(user) => {
                request.extensions_mut().insert(user);
            }
            Err(e) => return e.into_response(),
        },
        Ok(None) => {}
        Err(e) => return e.into_response(),
    }

    next.run(request).await
}

/// Extractor for authenticated user
/// Use this in handlers behind `auth_middleware`
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// Extractor for users holding the configured admin role
#[derive(Clone, Debug)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        if !user.has_role(&state.config.auth.admin_role) {
            tracing::warn!(user_id = %user.user_id, "Admin access denied");
            return Err(AppError::InsufficientPermissions);
        }

        Ok(AdminUser(user))
    }
}
