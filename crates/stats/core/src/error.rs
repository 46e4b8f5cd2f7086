//! Error types for strategy installation.
//!
//! Strategy construction is the only fallible operation in the crate.
//! Everything else is total over its documented domain: formulas degrade to
//! identity values on empty affected sets, and removing an absent stat is a
//! silent no-op.

/// Failure to construct a stacking strategy.
///
/// [`crate::StatRegistry::set_strategy`] swallows this, logs it, and reports
/// `false` to the caller; the previously installed strategy stays live.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StrategyError {
    /// The strategy rejected its configuration.
    #[error("invalid strategy configuration: {reason}")]
    InvalidConfig {
        /// Static description of the rejected parameter.
        reason: &'static str,
    },

    /// The strategy cannot operate over the registry's stacking kinds.
    #[error("strategy does not support the registry's stacking kinds")]
    UnsupportedKinds,
}
