//! Domain models for the GreenLeaf storefront

mod cart;
mod order;
mod strain;

pub use cart::*;
pub use order::*;
pub use strain::*;
