//! # Breakpoint bookkeeping and classification
//!
//! [`BreakpointStore`] tracks ids, enabled state and hit counts for every
//! breakpoint kind. Installing and lifting the actual traps is the backend's
//! job; the store only records what the backend did.
//!
//! [`classify`] answers "which enabled breakpoint kinds sit at this address"
//! as a [`BreakpointKindMask`]. The three kinds are looked up independently:
//! one address can carry a software, a hardware and a memory breakpoint at
//! the same time. Disabled breakpoints contribute nothing.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use bitflags::bitflags;

use crate::types::Address;

/// Unique identifier for a breakpoint managed by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BreakpointId(u64);

impl BreakpointId
{
    #[must_use]
    pub const fn from_raw(value: u64) -> Self
    {
        Self(value)
    }

    /// Raw numeric id (useful for logging).
    #[must_use]
    pub const fn raw(self) -> u64
    {
        self.0
    }
}

/// Breakpoint kinds tracked by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakpointKind
{
    /// Trap instruction patched into code (INT3).
    Software,
    /// Execution breakpoint in a CPU debug register.
    Hardware,
    /// Page-protection based breakpoint on a memory range.
    Memory,
}

impl BreakpointKind
{
    pub const ALL: [Self; 3] = [Self::Software, Self::Hardware, Self::Memory];

    /// The bit this kind occupies in a [`BreakpointKindMask`].
    #[must_use]
    pub const fn mask(self) -> BreakpointKindMask
    {
        match self {
            Self::Software => BreakpointKindMask::SOFTWARE,
            Self::Hardware => BreakpointKindMask::HARDWARE,
            Self::Memory => BreakpointKindMask::MEMORY,
        }
    }
}

bitflags! {
    /// Set of breakpoint kinds present and enabled at one address.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BreakpointKindMask: u32 {
        const SOFTWARE = 1;
        const HARDWARE = 2;
        const MEMORY = 4;
    }
}

/// Public information about a breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointInfo
{
    pub id: BreakpointId,
    pub address: Address,
    pub kind: BreakpointKind,
    /// Whether the breakpoint currently triggers.
    pub enabled: bool,
}

/// Exact-address breakpoint lookup, one kind at a time.
pub trait BreakpointLookup
{
    /// Copy of the breakpoint of `kind` at exactly `address`.
    fn find(&self, address: Address, kind: BreakpointKind) -> Option<BreakpointInfo>;
}

/// Breakpoint store keyed by id and by `(address, kind)`.
///
/// Not internally synchronised; share it as `RwLock<BreakpointStore>`, which
/// also implements [`BreakpointLookup`].
#[derive(Debug, Default)]
pub struct BreakpointStore
{
    next_id: u64,
    by_id: HashMap<BreakpointId, BreakpointInfo>,
    by_kind: HashMap<(Address, BreakpointKind), BreakpointId>,
}

impl BreakpointStore
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    fn allocate_id(&mut self) -> BreakpointId
    {
        self.next_id = self.next_id.wrapping_add(1);
        BreakpointId::from_raw(self.next_id)
    }

    /// Track a new, enabled breakpoint. An existing breakpoint of the same kind
    /// at the same address is replaced.
    pub fn add(&mut self, address: Address, kind: BreakpointKind) -> BreakpointId
    {
        if let Some(previous) = self.id_for_kind(address, kind) {
            self.by_id.remove(&previous);
        }
        let id = self.allocate_id();
        self.by_kind.insert((address, kind), id);
        self.by_id.insert(
            id,
            BreakpointInfo {
                id,
                address,
                kind,
                enabled: true,
            },
        );
        id
    }

    #[must_use]
    pub fn id_for_kind(&self, address: Address, kind: BreakpointKind) -> Option<BreakpointId>
    {
        self.by_kind.get(&(address, kind)).copied()
    }

    #[must_use]
    pub fn info(&self, id: BreakpointId) -> Option<BreakpointInfo>
    {
        self.by_id.get(&id).cloned()
    }

    /// Enable or disable a breakpoint. Returns `false` if the id is unknown.
    pub fn set_enabled(&mut self, id: BreakpointId, enabled: bool) -> bool
    {
        match self.by_id.get_mut(&id) {
            Some(info) => {
                info.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: BreakpointId) -> Option<BreakpointInfo>
    {
        let info = self.by_id.remove(&id)?;
        self.by_kind.remove(&(info.address, info.kind));
        Some(info)
    }

    /// All tracked breakpoints, ordered by id.
    #[must_use]
    pub fn list(&self) -> Vec<BreakpointInfo>
    {
        let mut infos: Vec<_> = self.by_id.values().cloned().collect();
        infos.sort_by_key(|info| info.id.raw());
        infos
    }
}

impl BreakpointLookup for BreakpointStore
{
    fn find(&self, address: Address, kind: BreakpointKind) -> Option<BreakpointInfo>
    {
        self.id_for_kind(address, kind).and_then(|id| self.info(id))
    }
}

impl BreakpointLookup for RwLock<BreakpointStore>
{
    fn find(&self, address: Address, kind: BreakpointKind) -> Option<BreakpointInfo>
    {
        self.read().unwrap_or_else(PoisonError::into_inner).find(address, kind)
    }
}

/// Kinds of enabled breakpoints at exactly `address`.
///
/// ```rust
/// use procmeta_core::breakpoints::{classify, BreakpointKind, BreakpointKindMask, BreakpointStore};
/// use procmeta_core::types::Address;
///
/// let mut store = BreakpointStore::new();
/// let at = Address::from(0x401000);
/// store.add(at, BreakpointKind::Software);
/// let hw = store.add(at, BreakpointKind::Hardware);
/// store.set_enabled(hw, false);
///
/// assert_eq!(classify(&store, at), BreakpointKindMask::SOFTWARE);
/// ```
#[must_use]
pub fn classify(lookup: &dyn BreakpointLookup, address: Address) -> BreakpointKindMask
{
    BreakpointKind::ALL
        .into_iter()
        .filter(|kind| lookup.find(address, *kind).is_some_and(|info| info.enabled))
        .fold(BreakpointKindMask::empty(), |mask, kind| mask | kind.mask())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_add_replaces_same_kind_at_address()
    {
        let mut store = BreakpointStore::new();
        let at = Address::from(0x1000);
        let first = store.add(at, BreakpointKind::Software);
        let second = store.add(at, BreakpointKind::Software);
        assert_ne!(first, second);
        assert!(store.info(first).is_none());
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn test_remove_clears_kind_index()
    {
        let mut store = BreakpointStore::new();
        let at = Address::from(0x2000);
        let id = store.add(at, BreakpointKind::Memory);
        assert!(store.remove(id).is_some());
        assert!(store.id_for_kind(at, BreakpointKind::Memory).is_none());
        assert!(store.remove(id).is_none());
    }
}
