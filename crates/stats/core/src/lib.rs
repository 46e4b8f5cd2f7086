//! Tag-driven stat aggregation with pluggable stacking strategies.
//!
//! `stats-core` keeps a registry of tagged numeric modifiers and folds them
//! into derived values on demand. Which stats influence each other is decided
//! purely by affection-tag intersection; how they combine is decided by the
//! installed strategy.
//!
//! # Architecture
//!
//! ```text
//! [ Stat (value, kind, affections) ]
//!      ↓
//! [ StatRegistry — mutation, events, setup hooks ]
//!      ↓
//! [ StackingStrategy — LayeredStrategy | CachedStrategy ]
//!      ↓
//! [ calculated value ]
//! ```
//!
//! ## Principles
//!
//! 1. **Handle identity**: stats are named by registry-minted [`StatId`]s,
//!    never by field equality
//! 2. **Post-commit notification**: hooks, strategy, and listeners all see
//!    the mutated state
//! 3. **Never stale**: every mutation that could affect a memoized value
//!    evicts it before the mutating call returns
//! 4. **Deterministic**: affected-set scans run in handle order, so
//!    first-match semantics are reproducible
//!
//! # Example
//!
//! ```
//! use stats_core::{AffectionSet, FoldKind, Stat, StatRegistry};
//!
//! let mut registry = StatRegistry::<FoldKind>::new();
//! let power = registry.add(Stat::base(100.0, AffectionSet::from_tags([1])));
//! registry.add(Stat::new(20.0, FoldKind::Flat, AffectionSet::from_tags([1])));
//!
//! assert_eq!(registry.calculated_value(power), Some(120.0));
//! ```

pub mod affection;
pub mod config;
pub mod error;
pub mod registry;
pub mod stat;
pub mod strategy;
pub mod table;

pub use affection::{AffectionSet, AffectionTag};
pub use config::CacheConfig;
pub use error::StrategyError;
pub use registry::{RegistryListener, StatRegistry};
pub use stat::{AddedHook, StackKind, Stat, StatId};
pub use strategy::{
    CachedStrategy, Fold, FoldClass, FoldKind, Layer, LayerClass, LayerKind, LayeredStrategy,
    StackingStrategy, StatQuery,
};
pub use table::StatTable;
