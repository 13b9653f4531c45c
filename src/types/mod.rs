pub mod ids;
pub mod quote;

pub use ids::SubscriptionId;
pub use quote::{Quote, AGGREGATED_SOURCE};
