//! Configuration management for the GreenLeaf storefront
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with GREENLEAF_ prefix

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Bearer token verification
    pub auth: AuthConfig,

    /// Cart behaviour
    pub cart: CartConfig,

    /// Storefront pricing and stock settings
    pub store: StoreConfig,

    /// Payment gateway configuration
    pub stripe: StripeConfig,

    /// Log output configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Apply pending migrations on startup
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity provider
    pub jwt_secret: String,

    /// Value of the `role` claim that grants admin access
    pub admin_role: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CartConfig {
    /// Header carrying the anonymous session id
    pub session_header: String,

    /// Upper bound for a single cart line
    pub max_quantity_per_item: i32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// ISO currency code, lowercase as the payment gateway expects
    pub currency: String,

    /// Sales tax as a fraction of the subtotal
    pub tax_rate: Decimal,

    /// Inventory at or below this quantity is reported as low stock
    pub low_stock_threshold: i32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StripeConfig {
    /// API base URL
    pub api_base: String,

    /// Secret API key
    pub secret_key: String,

    /// Webhook signing secret
    pub webhook_secret: String,

    /// Maximum age of a signed webhook in seconds
    pub webhook_tolerance_secs: i64,

    /// Redirect after successful payment; `{CHECKOUT_SESSION_ID}` is substituted by the gateway
    pub success_url: String,

    /// Redirect when the customer abandons the payment page
    pub cancel_url: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("GREENLEAF_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.run_migrations", environment == "development")?
            .set_default("auth.admin_role", "admin")?
            .set_default("cart.session_header", "x-session-id")?
            .set_default("cart.max_quantity_per_item", 10)?
            .set_default("store.currency", "usd")?
            .set_default("store.tax_rate", "0")?
            .set_default("store.low_stock_threshold", 5)?
            .set_default("stripe.api_base", "https://api.stripe.com")?
            .set_default("stripe.webhook_tolerance_secs", 300)?
            .set_default("logging.json", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (GREENLEAF_ prefix)
            .add_source(
                Environment::with_prefix("GREENLEAF")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}
