//! HTTP request handlers

pub mod admin;
pub mod cart;
pub mod checkout;
pub mod health;
pub mod orders;
pub mod strains;
pub mod webhooks;

pub use admin::*;
pub use cart::*;
pub use checkout::*;
pub use health::*;
pub use orders::*;
pub use strains::*;
pub use webhooks::*;
