//! External API integrations

pub mod stripe;

pub use stripe::{CheckoutLineItem, CheckoutSession, CheckoutSessionRequest, StripeClient};
