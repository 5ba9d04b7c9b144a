//! Persistence for the wheelhouse engine: broker state reads, the run
//! ledger, and idempotent output writes.

pub mod coordinator;
pub mod database;
pub mod models;
pub mod repositories;

pub use coordinator::{PersistenceCoordinator, RecommendationDisposition};
pub use database::connect;
pub use models::{
    AccountSnapshotRecord, ChainQuoteRecord, ExecutionRecord, OpenOrderRecord, PositionRecord,
    RecommendationRecord, RecommendationStatus, RunStatus, StrategyInstanceRecord,
    StrategyRunRecord,
};
pub use repositories::Repositories;
