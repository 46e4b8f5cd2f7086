//! Backing storage for registered stats.

use std::collections::BTreeMap;

use crate::affection::AffectionSet;
use crate::stat::{StackKind, Stat, StatId};

/// Owned collection of stats keyed by handle.
///
/// Iteration runs in handle order, which is allocation order. Affection
/// scans are therefore reproducible run to run; strategies whose formulas
/// have first-match semantics resolve the same stat every time.
#[derive(Clone, Debug)]
pub struct StatTable<K: StackKind> {
    entries: BTreeMap<StatId, Stat<K>>,
    next_id: u64,
}

impl<K: StackKind> StatTable<K> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Commits a stat and mints its handle.
    pub(crate) fn insert(&mut self, stat: Stat<K>) -> StatId {
        let id = self.allocate_id();
        self.entries.insert(id, stat);
        id
    }

    /// Allocates the next handle. Handles are never reused.
    ///
    /// # Panics
    ///
    /// Panics on allocator exhaustion (2^64 insertions).
    fn allocate_id(&mut self) -> StatId {
        let id = StatId(self.next_id);
        self.next_id = self.next_id.checked_add(1).expect("StatId overflow");
        id
    }

    pub(crate) fn remove(&mut self, id: StatId) -> Option<Stat<K>> {
        self.entries.remove(&id)
    }

    pub(crate) fn get_mut(&mut self, id: StatId) -> Option<&mut Stat<K>> {
        self.entries.get_mut(&id)
    }

    pub fn get(&self, id: StatId) -> Option<&Stat<K>> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: StatId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates every entry in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (StatId, &Stat<K>)> {
        self.entries.iter().map(|(id, stat)| (*id, stat))
    }

    /// Every stat whose affection set intersects `affections`, in handle
    /// order.
    ///
    /// There is no implicit self-inclusion: a queried stat shows up in its
    /// own affected set only when its tags self-intersect the query.
    pub fn affected_by<'a>(
        &'a self,
        affections: &'a AffectionSet,
    ) -> impl Iterator<Item = (StatId, &'a Stat<K>)> + 'a {
        self.iter()
            .filter(move |(_, stat)| stat.affections.intersects(affections))
    }
}

impl<K: StackKind> Default for StatTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::cached::FoldKind;

    fn stat(value: f32, tags: &[u16]) -> Stat<FoldKind> {
        Stat::new(
            value,
            FoldKind::Flat,
            AffectionSet::from_tags(tags.iter().copied()),
        )
    }

    #[test]
    fn handles_are_monotonic_and_never_reused() {
        let mut table = StatTable::new();
        let a = table.insert(stat(1.0, &[1]));
        let b = table.insert(stat(2.0, &[1]));
        assert!(a < b);

        table.remove(a);
        let c = table.insert(stat(3.0, &[1]));
        assert!(b < c);
        assert!(!table.contains(a));
    }

    #[test]
    fn affected_by_matches_on_intersection_only() {
        let mut table = StatTable::new();
        let fire = table.insert(stat(1.0, &[1, 2]));
        let frost = table.insert(stat(2.0, &[3]));
        let both = table.insert(stat(3.0, &[2, 3]));

        let query = AffectionSet::from_tags([2]);
        let hits: Vec<StatId> = table.affected_by(&query).map(|(id, _)| id).collect();
        assert_eq!(hits, vec![fire, both]);
        assert!(!hits.contains(&frost));
    }

    #[test]
    fn affected_by_is_in_handle_order() {
        let mut table = StatTable::new();
        let ids: Vec<StatId> = (0..8).map(|i| table.insert(stat(i as f32, &[7]))).collect();
        let query = AffectionSet::from_tags([7]);
        let scanned: Vec<StatId> = table.affected_by(&query).map(|(id, _)| id).collect();
        assert_eq!(scanned, ids);
    }
}
