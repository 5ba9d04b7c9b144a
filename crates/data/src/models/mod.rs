//! Row records for the engine's tables, with conversions into the domain
//! types the evaluation layer consumes.

pub mod broker;
pub mod instance;
pub mod recommendation;
pub mod run;

pub use broker::{
    AccountSnapshotRecord, ChainQuoteRecord, ExecutionRecord, OpenOrderRecord, PositionRecord,
};
pub use instance::StrategyInstanceRecord;
pub use recommendation::{RecommendationRecord, RecommendationStatus};
pub use run::{RunStatus, StrategyRunRecord};
