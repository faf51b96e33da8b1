//! # Range Map
//!
//! Ordered map keyed by closed, non-overlapping integer intervals.
//!
//! The map answers "which stored interval contains this point" with a single
//! ordered search. Intervals are ordered by the three-way comparison in
//! [`Range::compare`], under which two intervals compare equal as soon as they
//! overlap. A point query is the degenerate interval `(addr, addr)`, which
//! compares equal to exactly the stored interval containing it.
//!
//! Stored intervals never overlap: [`RangeMap::insert`] refuses any interval
//! that compares equal to one already present, so an extent must be removed
//! before a new one may take its place.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ProcmetaError, Result};

/// Closed interval `[start, end]` of address-sized integers, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range
{
    start: u64,
    end: u64,
}

impl Range
{
    /// Build `[start, end]`. Returns `None` when `start > end`.
    #[must_use]
    pub fn new(start: u64, end: u64) -> Option<Self>
    {
        (start <= end).then_some(Self { start, end })
    }

    /// The single-point interval `[value, value]`.
    #[must_use]
    pub const fn point(value: u64) -> Self
    {
        Self { start: value, end: value }
    }

    /// The interval covering `size` bytes from `base`, i.e. `[base, base + size - 1]`.
    ///
    /// Returns `None` for an empty extent or one that runs past the end of the
    /// address space.
    ///
    /// ```rust
    /// use procmeta_core::range_map::Range;
    ///
    /// let range = Range::from_base_size(0x1000, 0x100).unwrap();
    /// assert_eq!((range.start(), range.end()), (0x1000, 0x10ff));
    /// assert!(Range::from_base_size(0x1000, 0).is_none());
    /// ```
    #[must_use]
    pub fn from_base_size(base: u64, size: u64) -> Option<Self>
    {
        let last = size.checked_sub(1)?;
        Some(Self {
            start: base,
            end: base.checked_add(last)?,
        })
    }

    #[must_use]
    pub const fn start(&self) -> u64
    {
        self.start
    }

    /// Last value inside the interval (inclusive).
    #[must_use]
    pub const fn end(&self) -> u64
    {
        self.end
    }

    #[must_use]
    pub const fn contains(&self, value: u64) -> bool
    {
        self.start <= value && value <= self.end
    }

    #[must_use]
    pub const fn overlaps(&self, other: &Range) -> bool
    {
        self.start <= other.end && other.start <= self.end
    }

    /// Three-way comparison that treats overlapping intervals as equal.
    ///
    /// `Less` only when this interval ends strictly before `other` starts,
    /// `Greater` only when it starts strictly after `other` ends.
    #[must_use]
    pub fn compare(&self, other: &Range) -> Ordering
    {
        if self.end < other.start {
            Ordering::Less
        } else if other.end < self.start {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

impl fmt::Display for Range
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "[0x{:x}, 0x{:x}]", self.start, self.end)
    }
}

/// Map from non-overlapping [`Range`]s to values.
///
/// Entries are stored by start address; a lookup takes the last entry that
/// starts at or before the query's end and checks it with [`Range::compare`].
/// Because stored ranges are disjoint, that entry is the only candidate.
#[derive(Debug, Clone)]
pub struct RangeMap<V>
{
    entries: BTreeMap<u64, (Range, V)>,
}

impl<V> Default for RangeMap<V>
{
    fn default() -> Self
    {
        Self { entries: BTreeMap::new() }
    }
}

impl<V> RangeMap<V>
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    /// Insert `value` under `range`.
    ///
    /// ## Errors
    ///
    /// Returns [`ProcmetaError::Overlap`] and leaves the map unchanged if
    /// `range` overlaps a stored interval.
    pub fn insert(&mut self, range: Range, value: V) -> Result<()>
    {
        if self.find(range).is_some() {
            return Err(ProcmetaError::Overlap {
                start: range.start,
                end: range.end,
            });
        }
        self.entries.insert(range.start, (range, value));
        Ok(())
    }

    /// Stored entry comparing equal to (overlapping) `query`.
    #[must_use]
    pub fn find(&self, query: Range) -> Option<(&Range, &V)>
    {
        let (_, (range, value)) = self.entries.range(..=query.end).next_back()?;
        (range.compare(&query) == Ordering::Equal).then_some((range, value))
    }

    /// Entry whose interval contains `point`.
    #[must_use]
    pub fn get(&self, point: u64) -> Option<(&Range, &V)>
    {
        self.find(Range::point(point))
    }

    /// Remove and return the entry whose interval contains `point`.
    pub fn remove(&mut self, point: u64) -> Option<(Range, V)>
    {
        let start = self.get(point).map(|(range, _)| range.start)?;
        self.entries.remove(&start)
    }

    pub fn clear(&mut self)
    {
        self.entries.clear();
    }

    /// Entries in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = (&Range, &V)>
    {
        self.entries.values().map(|(range, value)| (range, value))
    }

    /// Values in ascending address order.
    pub fn values(&self) -> impl Iterator<Item = &V>
    {
        self.entries.values().map(|(_, value)| value)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn sample() -> RangeMap<&'static str>
    {
        let mut map = RangeMap::new();
        map.insert(Range::from_base_size(0x1000, 0x1000).unwrap(), "first").unwrap();
        map.insert(Range::from_base_size(0x4000, 0x0800).unwrap(), "second").unwrap();
        map
    }

    #[test]
    fn test_compare_treats_overlap_as_equal()
    {
        let a = Range::new(10, 20).unwrap();
        assert_eq!(a.compare(&Range::point(15)), Ordering::Equal);
        assert_eq!(a.compare(&Range::new(20, 30).unwrap()), Ordering::Equal);
        assert_eq!(a.compare(&Range::new(21, 30).unwrap()), Ordering::Less);
        assert_eq!(a.compare(&Range::new(0, 9).unwrap()), Ordering::Greater);
    }

    #[test]
    fn test_point_lookup_hits_containing_range()
    {
        let map = sample();
        assert_eq!(map.get(0x1000).map(|(_, v)| *v), Some("first"));
        assert_eq!(map.get(0x1fff).map(|(_, v)| *v), Some("first"));
        assert_eq!(map.get(0x47ff).map(|(_, v)| *v), Some("second"));
    }

    #[test]
    fn test_point_lookup_misses_outside_bounds()
    {
        let map = sample();
        assert!(map.get(0x0fff).is_none());
        assert!(map.get(0x2000).is_none());
        assert!(map.get(0x3fff).is_none());
        assert!(map.get(0x4800).is_none());
        assert!(map.get(u64::MAX).is_none());
    }

    #[test]
    fn test_insert_rejects_overlap()
    {
        let mut map = sample();
        let err = map.insert(Range::new(0x1800, 0x2800).unwrap(), "clash").unwrap_err();
        assert!(matches!(err, ProcmetaError::Overlap { start: 0x1800, .. }));
        assert_eq!(map.len(), 2);

        // Adjacent but disjoint is fine
        map.insert(Range::new(0x2000, 0x3fff).unwrap(), "between").unwrap();
        assert_eq!(map.values().copied().collect::<Vec<_>>(), ["first", "between", "second"]);
    }

    #[test]
    fn test_remove_then_reinsert()
    {
        let mut map = sample();
        let (range, value) = map.remove(0x1234).unwrap();
        assert_eq!(value, "first");
        assert!(map.get(0x1234).is_none());
        assert!(map.remove(0x1234).is_none());

        map.insert(range, "again").unwrap();
        assert_eq!(map.get(0x1234).map(|(_, v)| *v), Some("again"));
    }

    #[test]
    fn test_from_base_size_rejects_wrapping_extent()
    {
        assert!(Range::from_base_size(u64::MAX, 2).is_none());
        assert_eq!(Range::from_base_size(u64::MAX, 1), Some(Range::point(u64::MAX)));
    }
}
