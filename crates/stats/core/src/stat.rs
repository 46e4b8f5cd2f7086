//! Stat records, handles, and the stacking-kind seam.

use std::fmt;
use std::rc::Rc;

use crate::affection::AffectionSet;
use crate::registry::StatRegistry;

/// Stable opaque handle for a stat tracked in a registry.
///
/// Handles are allocated monotonically and never reused, so a handle held
/// after its stat was removed can never alias a newer stat. Caches key on
/// handles, not on stat field values: two stats with identical fields are
/// still distinct entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatId(pub(crate) u64);

impl StatId {
    /// Raw allocation index, mainly for diagnostics.
    #[inline]
    pub const fn index(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Classification tag controlling how a stat combines with others.
///
/// The kind space is a host-defined closed enum, not a shared integer table:
/// each strategy declares its own classification enum and a mapping trait
/// from the host kinds into it (see [`crate::strategy::layered::LayerClass`]
/// and [`crate::strategy::cached::FoldClass`]). A kind a strategy does not
/// recognize simply contributes nothing to its formula.
pub trait StackKind: Copy + Eq + fmt::Debug + 'static {
    /// Kind assigned to plain base values that other stats modify.
    const BASE: Self;

    /// True for stats that carry a base value rather than modify one.
    ///
    /// Base stats joining or leaving a registry never change anyone else's
    /// formula inputs, which lets caches skip invalidation for them.
    fn is_base(&self) -> bool {
        *self == Self::BASE
    }
}

/// Setup callback invoked right after a stat is committed to a registry.
///
/// Runs before any public notification fires and receives the registry
/// mutably, so a stat can arrange its own follow-up — wire an external timer
/// for later removal, register companion stats, or remove itself outright.
pub type AddedHook<K> = Rc<dyn Fn(&mut StatRegistry<K>, StatId)>;

/// A tagged numeric modifier or base value participating in aggregation.
///
/// Stats are plain records: a raw magnitude, a stacking kind, and the
/// affection tags deciding which other stats it talks to. Identity comes
/// from the [`StatId`] minted when the record enters a registry.
pub struct Stat<K: StackKind> {
    /// Raw, uncalculated magnitude.
    pub value: f32,
    /// How this stat combines with the stats it affects.
    pub kind: K,
    /// Which other stats this one talks to.
    pub affections: AffectionSet,
    pub(crate) on_added: Option<AddedHook<K>>,
}

impl<K: StackKind> Stat<K> {
    /// Creates a stat with no setup hook.
    pub fn new(value: f32, kind: K, affections: AffectionSet) -> Self {
        Self {
            value,
            kind,
            affections,
            on_added: None,
        }
    }

    /// Creates a plain base-kind stat.
    pub fn base(value: f32, affections: AffectionSet) -> Self {
        Self::new(value, K::BASE, affections)
    }

    /// Attaches a setup hook invoked when the stat enters a registry.
    pub fn with_on_added(mut self, hook: impl Fn(&mut StatRegistry<K>, StatId) + 'static) -> Self {
        self.on_added = Some(Rc::new(hook));
        self
    }

    /// Returns true if a setup hook is attached.
    pub fn has_on_added(&self) -> bool {
        self.on_added.is_some()
    }
}

impl<K: StackKind> Clone for Stat<K> {
    fn clone(&self) -> Self {
        Self {
            value: self.value,
            kind: self.kind,
            affections: self.affections.clone(),
            on_added: self.on_added.clone(),
        }
    }
}

impl<K: StackKind> fmt::Debug for Stat<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stat")
            .field("value", &self.value)
            .field("kind", &self.kind)
            .field("affections", &self.affections)
            .field("on_added", &self.on_added.is_some())
            .finish()
    }
}

/// Field equality. The setup hook is identity-less and not compared.
impl<K: StackKind> PartialEq for Stat<K> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
            && self.kind == other.kind
            && self.affections == other.affections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::cached::FoldKind;

    #[test]
    fn base_constructor_uses_the_base_kind() {
        let stat: Stat<FoldKind> = Stat::base(12.5, AffectionSet::new());
        assert_eq!(stat.kind, FoldKind::Base);
        assert!(stat.kind.is_base());
        assert!(!stat.has_on_added());
    }

    #[test]
    fn equality_ignores_the_hook() {
        let plain: Stat<FoldKind> = Stat::base(1.0, AffectionSet::from_tags([4]));
        let hooked: Stat<FoldKind> =
            Stat::base(1.0, AffectionSet::from_tags([4])).with_on_added(|_, _| {});
        assert_eq!(plain, hooked);
        assert!(hooked.has_on_added());
    }
}
