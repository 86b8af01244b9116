//! Cart identity extraction
//!
//! A cart belongs either to a signed-in user or to an anonymous browser
//! session. The session id travels in a header (`x-session-id` by default).

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::AppState;

/// Who is asking for a cart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartIdentity {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

impl CartIdentity {
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CartIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .extensions
            .get::<AuthUser>()
            .map(|user| user.user_id.clone());

        let session_id = match parts.headers.get(state.config.cart.session_header.as_str()) {
            None => None,
            Some(value) => {
                let value = value
                    .to_str()
                    .map_err(|_| AppError::validation("session_id", "Session id must be ASCII"))?
                    .trim();
                shared::validate_session_id(value)
                    .map_err(|msg| AppError::validation("session_id", msg))?;
                Some(value.to_string())
            }
        };

        if user_id.is_none() && session_id.is_none() {
            return Err(AppError::BadRequest(
                "A signed-in user or a session id is required".to_string(),
            ));
        }

        Ok(CartIdentity {
            user_id,
            session_id,
        })
    }
}
