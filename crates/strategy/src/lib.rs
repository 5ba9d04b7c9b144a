//! Strategy implementations, the process-wide registry, and risk filtering.

pub mod covered_call;
pub mod phase;
pub mod registry;
pub mod risk;
pub mod schemas;
pub mod select;
pub mod synthetic_leaps;
pub mod theta;
pub mod wheel;

pub use covered_call::CoveredCallStrategy;
pub use phase::{classify, ShortOption, WheelPhase};
pub use registry::{RegisteredStrategy, StrategyRegistry};
pub use risk::{FilterOutcome, RejectReason, Rejection, RiskEngine};
pub use select::{screen, ScreenParams, ScreenResult};
pub use synthetic_leaps::SyntheticLeapsStrategy;
pub use theta::ThetaFarmStrategy;
pub use wheel::WheelStrategy;
