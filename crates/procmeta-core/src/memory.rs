//! # Debuggee Memory
//!
//! Seams to the process backend and the operations built on them:
//!
//! - [`MemoryReader`]: raw reads of debuggee memory
//! - [`RegionQuery`]: "which region contains this address"
//! - [`BreakpointTraps`]: lifting and re-inserting software breakpoint bytes
//!
//! On top of these sit [`read_guarded`] (reads that never expose breakpoint
//! bytes), [`find_base`] / [`is_valid_read_ptr`] probes and
//! [`build_memory_map`], the one-shot snapshot of committed regions.
//!
//! ## Memory map walk
//!
//! The walk starts at address zero and repeatedly queries the region at the
//! current address, advancing to the region's end. It stops when the query
//! fails, when the end would overflow, or when the backend reports a region
//! that does not move the cursor forward. When the backend offers a
//! [`RegionQuery::snapshot`] the whole walk runs against it; otherwise the walk
//! is not atomic with respect to the debuggee and a region can change between
//! two queries.

use tracing::{debug, trace};

use crate::error::{ProcmetaError, Result};
use crate::modules::ModuleRegistry;
use crate::types::{Address, BoundedString, MemoryMap, MemoryPage, MemoryState, RegionInfo};

/// Reads bytes out of the debuggee.
pub trait MemoryReader: Send + Sync
{
    /// Read exactly `len` bytes at `address`.
    ///
    /// ## Errors
    ///
    /// `MemoryRead` if any byte of the span is unreadable.
    fn read_bytes(&self, address: Address, len: usize) -> Result<Vec<u8>>;
}

/// Describes the virtual memory region containing an address.
pub trait RegionQuery: Send + Sync
{
    /// Region containing `address`, or `None` if the backend cannot tell.
    ///
    /// Unallocated gaps are reported as regions in [`MemoryState::Free`].
    fn query(&self, address: Address) -> Option<RegionInfo>;

    /// A fixed view of the whole address space for multi-query walks.
    ///
    /// Backends where one query is expensive return a parsed snapshot that
    /// answers every query of the walk. `None` walks `self` directly.
    fn snapshot(&self) -> Option<Box<dyn RegionQuery + '_>>
    {
        None
    }
}

/// Software breakpoint bytes that can be lifted out of debuggee memory.
pub trait BreakpointTraps: Send + Sync
{
    /// Restore the original bytes under every inserted software breakpoint.
    fn disable_traps(&self);

    /// Re-insert the trap bytes lifted by [`disable_traps`](Self::disable_traps).
    fn enable_traps(&self);
}

/// Reader for sessions without a debuggee. Every read fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMemory;

impl MemoryReader for NoMemory
{
    fn read_bytes(&self, address: Address, len: usize) -> Result<Vec<u8>>
    {
        Err(ProcmetaError::MemoryRead { address, len })
    }
}

/// RAII guard that lifts breakpoint bytes and re-inserts them when dropped.
///
/// Traps are restored even if the guarded read panics.
pub struct TrapSuspendGuard<'a>
{
    traps: &'a dyn BreakpointTraps,
}

impl<'a> TrapSuspendGuard<'a>
{
    pub fn new(traps: &'a dyn BreakpointTraps) -> Self
    {
        traps.disable_traps();
        Self { traps }
    }
}

impl Drop for TrapSuspendGuard<'_>
{
    fn drop(&mut self)
    {
        self.traps.enable_traps();
    }
}

/// Read debuggee memory as the program itself would see it, without
/// breakpoint bytes.
///
/// ## Errors
///
/// - `InvalidArgument`: `len` is zero
/// - whatever the reader reports for an unreadable span
pub fn read_guarded(reader: &dyn MemoryReader, traps: &dyn BreakpointTraps, address: Address, len: usize) -> Result<Vec<u8>>
{
    if len == 0 {
        return Err(ProcmetaError::InvalidArgument("zero-length read".to_owned()));
    }
    let _traps = TrapSuspendGuard::new(traps);
    reader.read_bytes(address, len)
}

/// [`MemoryReader`] adapter that routes every read through [`read_guarded`].
pub struct GuardedReader<'a>
{
    reader: &'a dyn MemoryReader,
    traps: &'a dyn BreakpointTraps,
}

impl<'a> GuardedReader<'a>
{
    pub fn new(reader: &'a dyn MemoryReader, traps: &'a dyn BreakpointTraps) -> Self
    {
        Self { reader, traps }
    }
}

impl MemoryReader for GuardedReader<'_>
{
    fn read_bytes(&self, address: Address, len: usize) -> Result<Vec<u8>>
    {
        read_guarded(self.reader, self.traps, address, len)
    }
}

/// Base and total size of the allocation containing `address`.
///
/// The size spans every consecutive region that shares the allocation base.
#[must_use]
pub fn find_base(query: &dyn RegionQuery, address: Address) -> Option<(Address, u64)>
{
    let snapshot = query.snapshot();
    let query = snapshot.as_deref().unwrap_or(query);
    let region = query.query(address)?;
    if region.state == MemoryState::Free {
        return None;
    }
    let base = region.allocation_base;
    let mut cursor = base;
    let mut size = 0u64;
    while let Some(next) = query.query(cursor) {
        if next.allocation_base != base || next.state == MemoryState::Free || next.region_size == 0 {
            break;
        }
        size = size.saturating_add(next.region_size);
        match next.base_address.checked_add(next.region_size) {
            Some(end) if end > cursor => cursor = end,
            _ => break,
        }
    }
    Some((base, size.max(region.region_size)))
}

/// Whether at least one byte can be read at `address`.
#[must_use]
pub fn is_valid_read_ptr(reader: &dyn MemoryReader, address: Address) -> bool
{
    reader.read_bytes(address, 1).is_ok()
}

/// Snapshot every committed region, naming the module that owns each one.
///
/// The module name is resolved from the region's base address and includes
/// the extension; regions outside any module get an empty name. An empty map
/// is a normal result.
#[must_use]
pub fn build_memory_map(query: &dyn RegionQuery, modules: &ModuleRegistry) -> MemoryMap
{
    let snapshot = query.snapshot();
    let query = snapshot.as_deref().unwrap_or(query);
    let mut pages = Vec::new();
    let mut cursor = Address::ZERO;
    loop {
        let Some(region) = query.query(cursor) else {
            trace!(address = %cursor, "region query failed, ending walk");
            break;
        };

        if region.state == MemoryState::Commit {
            let module = modules
                .name_from_address(region.base_address, true)
                .unwrap_or_else(BoundedString::new);
            pages.push(MemoryPage { info: region, module });
        }

        let next = match region.base_address.checked_add(region.region_size) {
            Some(next) if next > cursor => next,
            _ => break,
        };
        cursor = next;
    }
    debug!(count = pages.len(), "memory map built");
    MemoryMap::new(pages)
}
