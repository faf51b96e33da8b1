//! Virtual memory region types.

use super::bounded::{BoundedString, MAX_MODULE_SIZE};
use super::Address;

/// Allocation state of a region, as reported by a region query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryState
{
    /// Backed by physical storage or a mapping.
    Commit,
    /// Address space reserved but not backed.
    Reserve,
    /// Unallocated address space.
    Free,
}

/// What backs a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind
{
    /// Mapped view of an executable image.
    Image,
    /// Mapped view of a file or section that is not an image.
    Mapped,
    /// Private (anonymous) memory.
    Private,
    /// Not reported by the backend.
    Unknown,
}

/// Native description of one virtual memory region.
///
/// This mirrors the information a platform region query returns for an
/// address: the containing region's bounds, its allocation, state and
/// protection. `protect` and `allocation_protect` carry the backend's native
/// protection bits unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionInfo
{
    pub base_address: Address,
    pub allocation_base: Address,
    pub allocation_protect: u32,
    pub region_size: u64,
    pub state: MemoryState,
    pub protect: u32,
    pub kind: RegionKind,
}

impl RegionInfo
{
    /// First address past the end of the region, saturating at the top of the address space.
    #[must_use]
    pub fn end(&self) -> Address
    {
        self.base_address.checked_add(self.region_size).unwrap_or(Address::new(u64::MAX))
    }

    #[must_use]
    pub fn contains(&self, address: Address) -> bool
    {
        address >= self.base_address && address < self.end()
    }
}

/// A committed region annotated with the name of the module owning its base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPage
{
    pub info: RegionInfo,
    /// Module file name (with extension), empty when the base is not inside a module.
    pub module: BoundedString<MAX_MODULE_SIZE>,
}

/// Caller-owned snapshot of the debuggee's committed regions, in address order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryMap
{
    pages: Box<[MemoryPage]>,
}

impl MemoryMap
{
    #[must_use]
    pub fn new(pages: Vec<MemoryPage>) -> Self
    {
        Self {
            pages: pages.into_boxed_slice(),
        }
    }

    /// Number of committed regions.
    #[must_use]
    pub fn count(&self) -> usize
    {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.pages.is_empty()
    }

    #[must_use]
    pub fn pages(&self) -> &[MemoryPage]
    {
        &self.pages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MemoryPage>
    {
        self.pages.iter()
    }
}

impl IntoIterator for MemoryMap
{
    type Item = MemoryPage;
    type IntoIter = std::vec::IntoIter<MemoryPage>;

    fn into_iter(self) -> Self::IntoIter
    {
        self.pages.into_vec().into_iter()
    }
}

impl<'a> IntoIterator for &'a MemoryMap
{
    type Item = &'a MemoryPage;
    type IntoIter = std::slice::Iter<'a, MemoryPage>;

    fn into_iter(self) -> Self::IntoIter
    {
        self.pages.iter()
    }
}
