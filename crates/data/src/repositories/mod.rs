//! Database repositories for the strategy engine.
//!
//! Each repository provides typed access to one slice of the schema. Broker
//! state is read-only here; the engine's own writes go through the run
//! ledger and the persistence coordinator.

pub mod broker_repo;
pub mod instance_repo;
pub mod recommendation_repo;
pub mod run_repo;

pub use broker_repo::BrokerStateRepository;
pub use instance_repo::StrategyInstanceRepository;
pub use recommendation_repo::RecommendationRepository;
pub use run_repo::StrategyRunRepository;

use sqlx::PgPool;

/// Creates all repositories from a single database pool.
pub struct Repositories {
    pub instances: StrategyInstanceRepository,
    pub broker: BrokerStateRepository,
    pub runs: StrategyRunRepository,
    pub recommendations: RecommendationRepository,
}

impl Repositories {
    /// Creates a new set of repositories from a database pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            instances: StrategyInstanceRepository::new(pool.clone()),
            broker: BrokerStateRepository::new(pool.clone()),
            runs: StrategyRunRepository::new(pool.clone()),
            recommendations: RecommendationRepository::new(pool),
        }
    }
}
