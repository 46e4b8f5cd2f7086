//! Pluggable aggregation strategies.
//!
//! A strategy is the algorithm that folds a stat's affected set into one
//! calculated value. The registry owns exactly one at a time and routes
//! every query and mutation notification through it. Two implementations
//! ship with the crate:
//!
//! - [`LayeredStrategy`] — stateless multi-tier formula, re-walked per call
//! - [`CachedStrategy`] — memoizing fold with affection-driven invalidation

pub mod cached;
pub mod layered;

pub use cached::{CachedStrategy, Fold, FoldClass, FoldKind};
pub use layered::{Layer, LayerClass, LayerKind, LayeredStrategy};

use std::rc::Rc;

use crate::stat::{StackKind, Stat, StatId};
use crate::table::StatTable;

/// A stat under evaluation, together with its handle when it is registered.
///
/// Ad-hoc evaluations ([`crate::StatRegistry::evaluate`]) carry no handle
/// and must never be memoized.
#[derive(Clone, Copy)]
pub struct StatQuery<'a, K: StackKind> {
    pub id: Option<StatId>,
    pub stat: &'a Stat<K>,
}

/// The pluggable algorithm that folds a stat's affected set into one value.
///
/// All methods take `&self`; stateful implementations use interior
/// mutability so registry queries stay shared borrows. The notification
/// methods default to no-ops, leaving stateless strategies with only
/// `calculated_value` to write.
pub trait StackingStrategy<K: StackKind> {
    /// Folds the affected set of `query` into a single value.
    fn calculated_value(&self, query: StatQuery<'_, K>, stats: &StatTable<K>) -> f32;

    /// Called after `stat` was committed to the table.
    fn stat_added(&self, _id: StatId, _stat: &Stat<K>, _stats: &StatTable<K>) {}

    /// Called after `stat` was removed from the table.
    fn stat_removed(&self, _id: StatId, _stat: &Stat<K>, _stats: &StatTable<K>) {}

    /// Drops any memoized value for `id`.
    fn invalidate(&self, _id: StatId) {}

    /// Drops every memoized value.
    fn invalidate_all(&self) {}
}

/// Shared strategy handles stay observable after installation: install an
/// `Rc` clone and keep the other to read metrics off the live instance.
impl<K: StackKind, S: StackingStrategy<K>> StackingStrategy<K> for Rc<S> {
    fn calculated_value(&self, query: StatQuery<'_, K>, stats: &StatTable<K>) -> f32 {
        (**self).calculated_value(query, stats)
    }

    fn stat_added(&self, id: StatId, stat: &Stat<K>, stats: &StatTable<K>) {
        (**self).stat_added(id, stat, stats);
    }

    fn stat_removed(&self, id: StatId, stat: &Stat<K>, stats: &StatTable<K>) {
        (**self).stat_removed(id, stat, stats);
    }

    fn invalidate(&self, id: StatId) {
        (**self).invalidate(id);
    }

    fn invalidate_all(&self) {
        (**self).invalidate_all();
    }
}

/// Sum of raw values over `stats` whose kind classifies as `class`,
/// preserving scan order.
pub fn sum_values<K, C, F>(stats: &[(StatId, &Stat<K>)], classify: F, class: C) -> f32
where
    K: StackKind,
    C: PartialEq,
    F: Fn(&K) -> Option<C>,
{
    stats
        .iter()
        .filter(|(_, stat)| classify(&stat.kind).as_ref() == Some(&class))
        .map(|(_, stat)| stat.value)
        .sum()
}
