pub mod types;
pub mod price_infra;
pub mod event_log;
pub mod error;
pub mod config;
pub mod observability;
pub mod interfaces;
pub mod api;
pub mod oracle;

pub use error::{Error, FetchError, Result};
pub use oracle::{OracleHealth, PriceOracle};
pub use types::{Quote, SubscriptionId};
