//! Shared types and models for the GreenLeaf storefront
//!
//! This crate contains the domain rules shared between the backend, the
//! storefront UI (via WASM), and the test suites. It performs no I/O.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
