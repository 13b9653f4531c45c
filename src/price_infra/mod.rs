pub mod connectors;
pub mod aggregator;
pub mod cache;
pub mod health;
pub mod runner;
pub mod scheduler;
pub mod subscribers;

pub use aggregator::PriceAggregator;
pub use cache::QuoteCache;
pub use health::{SourceHealth, SourceStatus};
pub use runner::SourceRunner;
pub use scheduler::Scheduler;
pub use subscribers::{QuoteCallback, SubscriberRegistry};
