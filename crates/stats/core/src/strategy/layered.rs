//! Stateless layered aggregation.
//!
//! Seven modifier tiers fold around a base value through pure data
//! dependencies: each tier consumes earlier tiers' results, never a running
//! accumulator. The strategy keeps no state and re-walks the affected set on
//! every call, which suits small per-frame-tolerant stat sets; larger sets
//! want [`super::CachedStrategy`].

use super::{StackingStrategy, StatQuery, sum_values};
use crate::stat::{StackKind, Stat, StatId};
use crate::table::StatTable;

/// The seven modifier tiers understood by [`LayeredStrategy`].
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Layer {
    /// Flat amount added before any multiplier.
    Flat,
    /// Summed percentage applied to the original base value.
    BaseIncreased,
    /// Summed percentage applied to the flat subtotal.
    FlatIncreased,
    /// Independent multiple of the original base, one term per stat, summed.
    BaseScaled,
    /// Independent multiple of the flat subtotal, one term per stat, summed.
    FlatScaled,
    /// Summed percentage applied to the combined subtotal.
    TotalIncreased,
    /// Independent multiple of the combined subtotal, one term per stat, summed.
    TotalScaled,
}

/// Maps a host kind space into the layered tiers.
///
/// Kinds that return `None` (the base kind among them) contribute nothing to
/// the fold.
pub trait LayerClass: StackKind {
    fn layer(&self) -> Option<Layer>;
}

/// Ready-made kind space covering exactly the layered tiers.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LayerKind {
    /// Plain value other stats modify.
    #[default]
    Base,
    Flat,
    BaseIncreased,
    FlatIncreased,
    BaseScaled,
    FlatScaled,
    TotalIncreased,
    TotalScaled,
}

impl StackKind for LayerKind {
    const BASE: Self = LayerKind::Base;
}

impl LayerClass for LayerKind {
    fn layer(&self) -> Option<Layer> {
        match self {
            LayerKind::Base => None,
            LayerKind::Flat => Some(Layer::Flat),
            LayerKind::BaseIncreased => Some(Layer::BaseIncreased),
            LayerKind::FlatIncreased => Some(Layer::FlatIncreased),
            LayerKind::BaseScaled => Some(Layer::BaseScaled),
            LayerKind::FlatScaled => Some(Layer::FlatScaled),
            LayerKind::TotalIncreased => Some(Layer::TotalIncreased),
            LayerKind::TotalScaled => Some(Layer::TotalScaled),
        }
    }
}

/// Stateless layered fold.
///
/// Empty additive tiers contribute 0 and empty multiplicative tiers 1, so a
/// stat with no modifiers resolves to exactly its own value. All arithmetic
/// is `f32`.
///
/// # Example
///
/// ```
/// use stats_core::affection::AffectionSet;
/// use stats_core::registry::StatRegistry;
/// use stats_core::stat::Stat;
/// use stats_core::strategy::{LayerKind, LayeredStrategy};
///
/// let mut registry =
///     StatRegistry::<LayerKind>::with_strategy(Box::new(LayeredStrategy::new()));
/// let attack = registry.add(Stat::base(10.0, AffectionSet::from_tags([1])));
/// registry.add(Stat::new(5.0, LayerKind::Flat, AffectionSet::from_tags([1])));
/// registry.add(Stat::new(0.5, LayerKind::BaseIncreased, AffectionSet::from_tags([1])));
///
/// // 5 + 10 * 1.5
/// assert_eq!(registry.calculated_value(attack), Some(20.0));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct LayeredStrategy;

impl LayeredStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl<K: LayerClass> StackingStrategy<K> for LayeredStrategy {
    fn calculated_value(&self, query: StatQuery<'_, K>, stats: &StatTable<K>) -> f32 {
        let base = query.stat.value;
        let affected: Vec<(StatId, &Stat<K>)> =
            stats.affected_by(&query.stat.affections).collect();

        let flat = sum_values(&affected, K::layer, Layer::Flat);
        let base_increased = 1.0 + sum_values(&affected, K::layer, Layer::BaseIncreased);
        let flat_increased = 1.0 + sum_values(&affected, K::layer, Layer::FlatIncreased);
        let base_scaled = scaled_sum(&affected, Layer::BaseScaled, base);
        let flat_scaled = scaled_sum(&affected, Layer::FlatScaled, flat);

        let subtotal = flat * flat_increased + base_scaled + base * base_increased + flat_scaled;

        let total_increased = 1.0 + sum_values(&affected, K::layer, Layer::TotalIncreased);
        let total_scaled = scaled_sum(&affected, Layer::TotalScaled, subtotal);

        subtotal * total_increased + total_scaled
    }
}

/// One independent `value * factor` term per matching stat, summed, never
/// compounded.
fn scaled_sum<K: LayerClass>(stats: &[(StatId, &Stat<K>)], layer: Layer, factor: f32) -> f32 {
    stats
        .iter()
        .filter(|(_, stat)| stat.kind.layer() == Some(layer))
        .map(|(_, stat)| stat.value * factor)
        .sum()
}
