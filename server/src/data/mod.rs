//! Data layer: shared types, concurrent stores, and the rule cache

pub mod cache;
pub mod store;
pub mod types;

pub use cache::RuleCache;
pub use store::{ProjectStore, RuleStore, SpanStore, TraceStore};
