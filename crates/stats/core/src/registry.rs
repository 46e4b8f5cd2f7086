//! Registry of tagged stats with a pluggable aggregation strategy.
//!
//! The registry owns three things: the backing [`StatTable`], exactly one
//! active [`StackingStrategy`], and the subscribed observers. Every mutation
//! commits to the table first, then runs the stat's own setup hook, then
//! notifies the strategy, then the observers — all synchronously, so a
//! listener that queries the registry sees post-mutation state.

use crate::affection::AffectionSet;
use crate::error::StrategyError;
use crate::stat::{StackKind, Stat, StatId};
use crate::strategy::cached::{CachedStrategy, FoldClass};
use crate::strategy::{StackingStrategy, StatQuery};
use crate::table::StatTable;

/// Observer notified synchronously after registry mutations commit.
///
/// Both methods default to no-ops so listeners implement only what they
/// watch. Display layers subscribe here to refresh themselves; the engine
/// itself has no further use for the events.
pub trait RegistryListener<K: StackKind> {
    fn stat_added(&mut self, _id: StatId, _stat: &Stat<K>) {}
    fn stat_removed(&mut self, _id: StatId, _stat: &Stat<K>) {}
}

/// Unordered collection of stats owned by one entity, folded into derived
/// values by the installed strategy.
///
/// Identity is minted at insertion: [`add`](Self::add) returns the handle
/// that names the stat from then on. Structurally equal records inserted
/// twice are two independent stats. Field mutation goes through
/// [`update`](Self::update), which keeps the strategy's cache coherent;
/// there is no way to alias a stored stat mutably from outside.
pub struct StatRegistry<K: StackKind> {
    stats: StatTable<K>,
    strategy: Box<dyn StackingStrategy<K>>,
    listeners: Vec<Box<dyn RegistryListener<K>>>,
}

impl<K: FoldClass> StatRegistry<K> {
    /// Registry with the default caching strategy installed.
    pub fn new() -> Self {
        Self::with_strategy(Box::new(CachedStrategy::new()))
    }
}

impl<K: FoldClass> Default for StatRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: StackKind> StatRegistry<K> {
    /// Registry with an explicit strategy, for kind spaces the caching
    /// strategy does not cover.
    pub fn with_strategy(strategy: Box<dyn StackingStrategy<K>>) -> Self {
        Self {
            stats: StatTable::new(),
            strategy,
            listeners: Vec::new(),
        }
    }

    /// Commits `stat`, runs its setup hook, and fires notifications.
    ///
    /// The hook runs against the committed state and may mutate the registry
    /// freely — including removing the stat again, in which case no added
    /// notification fires for it.
    pub fn add(&mut self, stat: Stat<K>) -> StatId {
        let id = self.stats.insert(stat);
        self.run_added_hook(id);
        self.announce_added(id, true);
        id
    }

    /// Per-element [`add`](Self::add) semantics, in input order.
    ///
    /// Listener dispatch is skipped wholesale when nobody subscribed;
    /// setup hooks and strategy notification always run.
    pub fn add_all(&mut self, stats: impl IntoIterator<Item = Stat<K>>) -> Vec<StatId> {
        let dispatch = !self.listeners.is_empty();
        stats
            .into_iter()
            .map(|stat| {
                let id = self.stats.insert(stat);
                self.run_added_hook(id);
                self.announce_added(id, dispatch);
                id
            })
            .collect()
    }

    /// Removes the stat named by `id`.
    ///
    /// Removing an absent handle is a silent no-op: no notification fires
    /// and `false` comes back.
    pub fn remove(&mut self, id: StatId) -> bool {
        let Some(stat) = self.stats.remove(id) else {
            return false;
        };
        // The handle is dead; its memoized value must not outlive it.
        self.strategy.invalidate(id);
        self.strategy.stat_removed(id, &stat, &self.stats);
        for listener in &mut self.listeners {
            listener.stat_removed(id, &stat);
        }
        true
    }

    /// Per-element [`remove`](Self::remove) semantics. Returns how many
    /// handles were actually present.
    pub fn remove_all(&mut self, ids: impl IntoIterator<Item = StatId>) -> usize {
        ids.into_iter().filter(|id| self.remove(*id)).count()
    }

    pub fn contains(&self, id: StatId) -> bool {
        self.stats.contains(id)
    }

    pub fn get(&self, id: StatId) -> Option<&Stat<K>> {
        self.stats.get(id)
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Iterates every registered stat in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (StatId, &Stat<K>)> {
        self.stats.iter()
    }

    /// Defensive copy of every registered stat. The snapshot does not track
    /// later mutation.
    pub fn snapshot(&self) -> Vec<Stat<K>>
    where
        K: Clone,
    {
        self.stats.iter().map(|(_, stat)| stat.clone()).collect()
    }

    /// Folded value of the stat named by `id`, via the installed strategy.
    ///
    /// `None` for a handle not (or no longer) in the registry.
    pub fn calculated_value(&self, id: StatId) -> Option<f32> {
        let stat = self.stats.get(id)?;
        Some(
            self.strategy
                .calculated_value(StatQuery { id: Some(id), stat }, &self.stats),
        )
    }

    /// Ad-hoc fold of a raw value against the registered set, without
    /// persisting anything.
    ///
    /// The value is treated as a plain base-kind stat with the given
    /// affections; the result is never memoized.
    pub fn evaluate(&self, value: f32, affections: AffectionSet) -> f32 {
        let stat = Stat::new(value, K::BASE, affections);
        self.strategy
            .calculated_value(StatQuery { id: None, stat: &stat }, &self.stats)
    }

    /// Builds and installs a new strategy.
    ///
    /// Construction failure is swallowed: it is logged, `false` comes back,
    /// and the previous strategy (with its cache) stays live. Success
    /// replaces the strategy, dropping the old cache with it.
    pub fn set_strategy<S, F>(&mut self, build: F) -> bool
    where
        S: StackingStrategy<K> + 'static,
        F: FnOnce() -> Result<S, StrategyError>,
    {
        match build() {
            Ok(strategy) => {
                self.install_strategy(Box::new(strategy));
                true
            }
            Err(error) => {
                tracing::warn!(
                    target: "stats::registry",
                    %error,
                    "strategy construction failed, keeping previous strategy"
                );
                false
            }
        }
    }

    /// Replaces the active strategy, dropping the old one and its cache.
    pub fn install_strategy(&mut self, strategy: Box<dyn StackingStrategy<K>>) {
        self.strategy = strategy;
    }

    /// Mutates a stored stat's fields in place.
    ///
    /// This is the only field-mutation path, and it performs total
    /// invalidation: the stat's own memoized value is dropped, and both the
    /// old and the new shape fan out to the strategy as if the stat had been
    /// removed and re-added. No listener events fire for in-place updates.
    pub fn update(&mut self, id: StatId, mutate: impl FnOnce(&mut Stat<K>)) -> bool {
        let before = match self.stats.get_mut(id) {
            Some(stat) => {
                let before = stat.clone();
                mutate(stat);
                before
            }
            None => return false,
        };
        self.strategy.invalidate(id);
        self.strategy.stat_removed(id, &before, &self.stats);
        if let Some(stat) = self.stats.get(id) {
            self.strategy.stat_added(id, stat, &self.stats);
        }
        true
    }

    /// Drops any memoized value for `id` (manual cache control).
    pub fn invalidate(&self, id: StatId) {
        self.strategy.invalidate(id);
    }

    /// Drops every memoized value, e.g. after bulk external changes.
    pub fn invalidate_all(&self) {
        self.strategy.invalidate_all();
    }

    /// Subscribes an observer to add/remove notifications.
    pub fn subscribe(&mut self, listener: Box<dyn RegistryListener<K>>) {
        self.listeners.push(listener);
    }

    fn run_added_hook(&mut self, id: StatId) {
        let hook = self.stats.get(id).and_then(|stat| stat.on_added.clone());
        if let Some(hook) = hook {
            hook(self, id);
        }
    }

    fn announce_added(&mut self, id: StatId, dispatch: bool) {
        // The setup hook may have removed the stat again.
        let Some(stat) = self.stats.get(id) else {
            return;
        };
        self.strategy.stat_added(id, stat, &self.stats);
        if dispatch {
            for listener in &mut self.listeners {
                listener.stat_added(id, stat);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::cached::{CachedStrategy, Fold, FoldKind};
    use crate::strategy::layered::{Layer, LayerClass, LayeredStrategy};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Kind space served by both shipped strategies, for swap tests.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum DualKind {
        Base,
        Flat,
    }

    impl StackKind for DualKind {
        const BASE: Self = DualKind::Base;
    }

    impl FoldClass for DualKind {
        fn fold(&self) -> Option<Fold> {
            matches!(self, DualKind::Flat).then_some(Fold::Flat)
        }
    }

    impl LayerClass for DualKind {
        fn layer(&self) -> Option<Layer> {
            matches!(self, DualKind::Flat).then_some(Layer::Flat)
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum EventKind {
        Added(StatId),
        Removed(StatId),
    }

    struct Recorder {
        events: Rc<RefCell<Vec<EventKind>>>,
    }

    impl RegistryListener<FoldKind> for Recorder {
        fn stat_added(&mut self, id: StatId, _stat: &Stat<FoldKind>) {
            self.events.borrow_mut().push(EventKind::Added(id));
        }

        fn stat_removed(&mut self, id: StatId, _stat: &Stat<FoldKind>) {
            self.events.borrow_mut().push(EventKind::Removed(id));
        }
    }

    fn recording_registry() -> (StatRegistry<FoldKind>, Rc<RefCell<Vec<EventKind>>>) {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut registry = StatRegistry::new();
        registry.subscribe(Box::new(Recorder {
            events: Rc::clone(&events),
        }));
        (registry, events)
    }

    fn flat(value: f32, tags: &[u16]) -> Stat<FoldKind> {
        Stat::new(
            value,
            FoldKind::Flat,
            AffectionSet::from_tags(tags.iter().copied()),
        )
    }

    #[test]
    fn add_and_remove_fire_events_in_mutation_order() {
        let (mut registry, events) = recording_registry();
        let a = registry.add(Stat::base(1.0, AffectionSet::new()));
        let b = registry.add(flat(2.0, &[1]));
        registry.remove(a);

        assert_eq!(
            *events.borrow(),
            vec![
                EventKind::Added(a),
                EventKind::Added(b),
                EventKind::Removed(a)
            ]
        );
    }

    #[test]
    fn removing_an_absent_handle_is_silent() {
        let (mut registry, events) = recording_registry();
        let a = registry.add(Stat::base(1.0, AffectionSet::new()));
        registry.remove(a);
        events.borrow_mut().clear();

        assert!(!registry.remove(a));
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn add_all_keeps_insertion_order() {
        let (mut registry, events) = recording_registry();
        let ids = registry.add_all([flat(1.0, &[1]), flat(2.0, &[1]), flat(3.0, &[1])]);
        assert_eq!(registry.len(), 3);

        let expected: Vec<EventKind> = ids.iter().map(|id| EventKind::Added(*id)).collect();
        assert_eq!(*events.borrow(), expected);
    }

    #[test]
    fn setup_hook_runs_against_committed_state() {
        let seen_len = Rc::new(RefCell::new(0usize));
        let seen = Rc::clone(&seen_len);

        let mut registry = StatRegistry::<FoldKind>::new();
        registry.add(
            Stat::base(1.0, AffectionSet::new()).with_on_added(move |registry, id| {
                assert!(registry.contains(id));
                *seen.borrow_mut() = registry.len();
            }),
        );

        assert_eq!(*seen_len.borrow(), 1);
    }

    #[test]
    fn setup_hook_may_remove_its_own_stat() {
        let (mut registry, events) = recording_registry();
        let id = registry.add(
            Stat::base(1.0, AffectionSet::new()).with_on_added(|registry, id| {
                registry.remove(id);
            }),
        );

        assert!(!registry.contains(id));
        // Only the removal was observable; no added event for a stat the
        // hook already took back out.
        assert_eq!(*events.borrow(), vec![EventKind::Removed(id)]);
    }

    #[test]
    fn hooks_still_run_when_nobody_listens() {
        let runs = Rc::new(RefCell::new(0u32));
        let mut registry = StatRegistry::<FoldKind>::new();

        let stats: Vec<Stat<FoldKind>> = (0..3)
            .map(|_| {
                let runs = Rc::clone(&runs);
                Stat::base(1.0, AffectionSet::new()).with_on_added(move |_, _| {
                    *runs.borrow_mut() += 1;
                })
            })
            .collect();

        registry.add_all(stats);
        assert_eq!(*runs.borrow(), 3);
    }

    #[test]
    fn snapshot_is_a_defensive_copy() {
        let mut registry = StatRegistry::<FoldKind>::new();
        registry.add(flat(1.0, &[1]));
        let snapshot = registry.snapshot();

        registry.add(flat(2.0, &[1]));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn identity_law_holds_for_both_strategies() {
        let mut cached = StatRegistry::<DualKind>::with_strategy(Box::new(CachedStrategy::new()));
        let mut layered =
            StatRegistry::<DualKind>::with_strategy(Box::new(LayeredStrategy::new()));

        for registry in [&mut cached, &mut layered] {
            registry.add(Stat::new(99.0, DualKind::Flat, AffectionSet::from_tags([1])));
            let lonely = registry.add(Stat::base(12.0, AffectionSet::new()));
            assert_eq!(registry.calculated_value(lonely), Some(12.0));
        }
    }

    #[test]
    fn failed_strategy_construction_keeps_the_old_one() {
        let mut registry = StatRegistry::<FoldKind>::new();
        let health = registry.add(Stat::base(10.0, AffectionSet::from_tags([1])));
        registry.add(flat(5.0, &[1]));
        assert_eq!(registry.calculated_value(health), Some(15.0));

        let installed = registry.set_strategy(|| -> Result<CachedStrategy, _> {
            Err(StrategyError::InvalidConfig {
                reason: "capacity out of range",
            })
        });

        assert!(!installed);
        assert_eq!(registry.calculated_value(health), Some(15.0));
    }

    #[test]
    fn swapping_strategies_drops_the_cache_with_the_old_one() {
        let strategy = Rc::new(CachedStrategy::new());
        let mut registry =
            StatRegistry::<DualKind>::with_strategy(Box::new(Rc::clone(&strategy)));

        let health = registry.add(Stat::base(10.0, AffectionSet::from_tags([1])));
        registry.add(Stat::new(5.0, DualKind::Flat, AffectionSet::from_tags([1])));
        assert_eq!(registry.calculated_value(health), Some(15.0));
        assert_eq!(strategy.cached_len(), 1);

        assert!(registry.set_strategy(|| Ok(LayeredStrategy::new())));
        assert_eq!(registry.calculated_value(health), Some(15.0));

        // Back to a fresh cache; the shared handle to the old one is all
        // that keeps it alive, and it no longer receives notifications.
        assert!(registry.set_strategy(|| Ok(CachedStrategy::new())));
        registry.remove(health);
        assert_eq!(strategy.cached_len(), 1);
    }

    #[test]
    fn update_invalidates_the_changed_stat_and_its_dependents() {
        let strategy = Rc::new(CachedStrategy::new());
        let mut registry =
            StatRegistry::<FoldKind>::with_strategy(Box::new(Rc::clone(&strategy)));

        let health = registry.add(Stat::base(100.0, AffectionSet::from_tags([1])));
        let bonus = registry.add(flat(20.0, &[1]));
        assert_eq!(registry.calculated_value(health), Some(120.0));

        assert!(registry.update(bonus, |stat| stat.value = 50.0));
        assert_eq!(registry.calculated_value(health), Some(150.0));

        // Re-tagging moves the modifier out of the affected set entirely.
        assert!(registry.update(bonus, |stat| {
            stat.affections = AffectionSet::from_tags([2]);
        }));
        assert_eq!(registry.calculated_value(health), Some(100.0));

        assert!(!registry.update(StatId(999), |_| {}));
    }

    #[test]
    fn update_refreshes_a_base_stat_with_empty_affections() {
        let mut registry = StatRegistry::<FoldKind>::new();
        let lonely = registry.add(Stat::base(10.0, AffectionSet::new()));
        assert_eq!(registry.calculated_value(lonely), Some(10.0));

        // No affection intersection anywhere; only the own-entry refresh
        // keeps this from going stale.
        assert!(registry.update(lonely, |stat| stat.value = 25.0));
        assert_eq!(registry.calculated_value(lonely), Some(25.0));
    }

    #[test]
    fn evaluate_folds_against_the_live_set() {
        let mut registry = StatRegistry::<FoldKind>::new();
        registry.add(flat(20.0, &[1]));
        registry.add(Stat::new(
            0.5,
            FoldKind::Increased,
            AffectionSet::from_tags([1]),
        ));

        assert_eq!(registry.evaluate(100.0, AffectionSet::from_tags([1])), 180.0);
        assert_eq!(registry.evaluate(100.0, AffectionSet::from_tags([9])), 100.0);
    }
}
