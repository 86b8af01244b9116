//! Request middleware and extractors

pub mod auth;
pub mod session;

pub use auth::{
    auth_middleware, optional_auth_middleware, AdminUser, AuthUser, Claims, CurrentUser,
};
pub use session::CartIdentity;
