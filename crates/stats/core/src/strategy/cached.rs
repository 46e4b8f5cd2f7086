//! Memoizing aggregation with affection-driven invalidation.
//!
//! Stat sets are queried far more often than they mutate (every frame vs.
//! equip/buff events), so folds are memoized per handle and only evicted
//! when a mutation could actually change them. Eviction cost is bounded by
//! how many *already cached* stats share a tag with the mutated one, never
//! by total stat count.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use super::{StackingStrategy, StatQuery, sum_values};
use crate::config::CacheConfig;
use crate::stat::{StackKind, Stat, StatId};
use crate::table::StatTable;

/// Folding classes understood by [`CachedStrategy`].
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
pub enum Fold {
    /// Flat amount added to the base.
    Flat,
    /// Summed percentage multiplier over base plus flat.
    Increased,
    /// Compounding multiplier, `(1 + value)` applied per stat in scan order.
    More,
    /// Replaces the base value outright; first match in scan order wins.
    Override,
    /// Short-circuits the whole fold with its own raw value.
    Absolute,
}

/// Maps a host kind space into folding classes.
///
/// Kinds that return `None` (the base kind among them) contribute nothing to
/// the fold.
pub trait FoldClass: StackKind {
    fn fold(&self) -> Option<Fold>;
}

/// Ready-made kind space covering exactly the folding classes.
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
pub enum FoldKind {
    /// Plain value other stats modify.
    #[default]
    Base,
    Flat,
    Increased,
    More,
    Override,
    Absolute,
}

impl StackKind for FoldKind {
    const BASE: Self = FoldKind::Base;
}

impl FoldClass for FoldKind {
    fn fold(&self) -> Option<Fold> {
        match self {
            FoldKind::Base => None,
            FoldKind::Flat => Some(Fold::Flat),
            FoldKind::Increased => Some(Fold::Increased),
            FoldKind::More => Some(Fold::More),
            FoldKind::Override => Some(Fold::Override),
            FoldKind::Absolute => Some(Fold::Absolute),
        }
    }
}

/// Two parallel collections keyed by handle: membership in `computed` says a
/// value is trusted this epoch, `values` holds it.
#[derive(Debug, Default)]
struct ValueCache {
    computed: HashSet<StatId>,
    values: HashMap<StatId, f32>,
    recomputations: u64,
}

impl ValueCache {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            computed: HashSet::with_capacity(capacity),
            values: HashMap::with_capacity(capacity),
            recomputations: 0,
        }
    }

    fn lookup(&self, id: StatId) -> Option<f32> {
        if self.computed.contains(&id) {
            self.values.get(&id).copied()
        } else {
            None
        }
    }

    fn store(&mut self, id: StatId, value: f32) {
        self.computed.insert(id);
        self.values.insert(id, value);
        self.recomputations += 1;
    }

    fn evict(&mut self, id: StatId) {
        self.computed.remove(&id);
        self.values.remove(&id);
    }

    fn clear(&mut self) {
        self.computed.clear();
        self.values.clear();
    }

    fn len(&self) -> usize {
        self.computed.len()
    }
}

/// Memoizing fold over four modifier classes plus two absolute overrides.
///
/// A memoized value is trusted until a mutation whose affections intersect
/// the cached stat's lands in the registry; invalidation is lazy and
/// demand-driven, never recomputing anything eagerly. Interior mutability
/// keeps queries shared borrows; the crate's single-threaded model makes
/// that safe.
///
/// # Example
///
/// ```
/// use stats_core::affection::AffectionSet;
/// use stats_core::registry::StatRegistry;
/// use stats_core::stat::Stat;
/// use stats_core::strategy::FoldKind;
///
/// let mut registry = StatRegistry::<FoldKind>::new();
/// let health = registry.add(Stat::base(100.0, AffectionSet::from_tags([1])));
/// registry.add(Stat::new(20.0, FoldKind::Flat, AffectionSet::from_tags([1])));
/// registry.add(Stat::new(0.5, FoldKind::Increased, AffectionSet::from_tags([1])));
///
/// // (100 + 20) * 1.5
/// assert_eq!(registry.calculated_value(health), Some(180.0));
/// ```
#[derive(Debug)]
pub struct CachedStrategy {
    cache: RefCell<ValueCache>,
}

impl CachedStrategy {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::new())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            cache: RefCell::new(ValueCache::with_capacity(config.initial_capacity)),
        }
    }

    /// Number of memoized entries currently trusted.
    pub fn cached_len(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Total from-scratch folds stored since construction.
    pub fn recomputations(&self) -> u64 {
        self.cache.borrow().recomputations
    }

    fn fold_value<K: FoldClass>(&self, stat: &Stat<K>, stats: &StatTable<K>) -> f32 {
        let affected: Vec<(StatId, &Stat<K>)> = stats.affected_by(&stat.affections).collect();

        // An absolute stat has the final say, whatever else is present.
        if let Some(value) = first_value(&affected, Fold::Absolute) {
            return value;
        }

        // An override replaces the base before the other classes apply.
        let base = first_value(&affected, Fold::Override).unwrap_or(stat.value);

        let flat = sum_values(&affected, K::fold, Fold::Flat);
        let increased = 1.0 + sum_values(&affected, K::fold, Fold::Increased);
        let more = affected
            .iter()
            .filter(|(_, entry)| entry.kind.fold() == Some(Fold::More))
            .fold(1.0, |product, (_, entry)| product * (1.0 + entry.value));

        (base + flat) * increased * more
    }

    /// Evicts every cached entry whose stat could see `mutated` in its
    /// affected set. Entries whose stat no longer exists are dropped on
    /// sight; their handles are dead and will never be queried again.
    fn invalidate_intersecting<K: FoldClass>(&self, mutated: &Stat<K>, stats: &StatTable<K>) {
        if mutated.kind.is_base() {
            // Plain values are never formula inputs for other stats.
            return;
        }

        let mut cache = self.cache.borrow_mut();
        let stale: Vec<StatId> = cache
            .computed
            .iter()
            .copied()
            .filter(|id| match stats.get(*id) {
                Some(entry) => entry.affections.intersects(&mutated.affections),
                None => true,
            })
            .collect();
        for id in &stale {
            cache.evict(*id);
        }

        if !stale.is_empty() {
            tracing::trace!(
                target: "stats::cache",
                evicted = stale.len(),
                "evicted entries sharing affections with a mutated stat"
            );
        }
    }
}

impl Default for CachedStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: FoldClass> StackingStrategy<K> for CachedStrategy {
    fn calculated_value(&self, query: StatQuery<'_, K>, stats: &StatTable<K>) -> f32 {
        let Some(id) = query.id else {
            // Detached stat: compute, never memoize.
            return self.fold_value(query.stat, stats);
        };

        if let Some(value) = self.cache.borrow().lookup(id) {
            return value;
        }

        let value = self.fold_value(query.stat, stats);
        self.cache.borrow_mut().store(id, value);
        value
    }

    fn stat_added(&self, _id: StatId, stat: &Stat<K>, stats: &StatTable<K>) {
        self.invalidate_intersecting(stat, stats);
    }

    fn stat_removed(&self, _id: StatId, stat: &Stat<K>, stats: &StatTable<K>) {
        self.invalidate_intersecting(stat, stats);
    }

    fn invalidate(&self, id: StatId) {
        self.cache.borrow_mut().evict(id);
    }

    fn invalidate_all(&self) {
        let mut cache = self.cache.borrow_mut();
        if !cache.computed.is_empty() {
            tracing::debug!(
                target: "stats::cache",
                entries = cache.len(),
                "cleared stat cache"
            );
        }
        cache.clear();
    }
}

fn first_value<K: FoldClass>(stats: &[(StatId, &Stat<K>)], fold: Fold) -> Option<f32> {
    stats
        .iter()
        .find(|(_, stat)| stat.kind.fold() == Some(fold))
        .map(|(_, stat)| stat.value)
}
