//! Core types, contracts, and validation for the wheelhouse strategy engine.
//!
//! This crate provides:
//! - Domain types for normalized broker state (snapshots, positions, chains)
//! - The immutable `StrategyContext` consumed by evaluators
//! - Action types emitted by strategies (signals, opportunities, recommendations)
//! - Declarative config schemas with a collect-all-violations validator
//! - The pure `Strategy` trait and the engine error taxonomy

pub mod account;
pub mod actions;
pub mod chain;
pub mod config;
pub mod context;
pub mod error;
pub mod instrument;
pub mod position;
pub mod schema;
pub mod traits;

pub use account::{AccountSnapshot, RiskMode};
pub use actions::{
    canonical_json, round_money, signal_types, Actions, ActionKind, Opportunity, Recommendation,
    Signal,
};
pub use chain::OptionQuote;
pub use config::{AppConfig, DatabaseConfig, EngineSettings};
pub use context::StrategyContext;
pub use error::EngineError;
pub use instrument::{OptionContract, OptionRight};
pub use position::{Execution, OpenOrder, OrderSide, Position, PositionKind};
pub use schema::{merge_config, ConfigMap, ConfigSchema, FieldKind, FieldSpec, Violation};
pub use traits::{Strategy, StrategyId};
