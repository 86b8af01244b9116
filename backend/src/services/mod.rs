//! Business logic services for the GreenLeaf storefront

pub mod admin;
pub mod cart;
pub mod checkout;
pub mod inventory;
pub mod order;
pub mod payment_events;
pub mod strain;

pub use admin::AdminService;
pub use cart::CartService;
pub use checkout::CheckoutService;
pub use inventory::InventoryService;
pub use order::OrderService;
pub use payment_events::PaymentEventService;
pub use strain::StrainService;
