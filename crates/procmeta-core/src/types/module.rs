//! Loaded module records.

use smallvec::SmallVec;

use super::bounded::{BoundedString, MAX_MODULE_SIZE, MAX_SECTION_SIZE};
use super::Address;

/// One section of a loaded module, in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSection
{
    /// Absolute address of the section in the debuggee.
    pub addr: Address,
    /// Virtual size of the section.
    pub size: u64,
    /// Escaped, length-bounded section name.
    pub name: BoundedString<MAX_SECTION_SIZE>,
}

/// Section list storage. Most images carry fewer than eight sections.
pub type SectionList = SmallVec<[ModuleSection; 8]>;

/// Metadata for a binary image mapped into the debuggee.
///
/// Records are built completely before they are inserted into the
/// [`ModuleRegistry`](crate::modules::ModuleRegistry) and never change
/// afterwards. Lookups hand out clones, so a record obtained by a caller stays
/// valid after the module is unloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo
{
    /// Load address.
    pub base: Address,
    /// Size of the mapped image in bytes. Always non-zero.
    pub size: u64,
    /// Lowercase file name without directory or extension.
    pub name: BoundedString<MAX_MODULE_SIZE>,
    /// Lowercase extension including the leading dot, empty if none.
    pub extension: BoundedString<MAX_MODULE_SIZE>,
    /// Full path exactly as reported by the loader.
    pub path: String,
    /// Load-address independent identity of the module, see [`crate::hash`].
    pub hash: u32,
    /// Absolute entry point, or [`Address::ZERO`] for images without one.
    pub entry: Address,
    /// Sections in header order.
    pub sections: SectionList,
    /// Whether the image was read from debuggee memory instead of disk.
    pub is_virtual: bool,
}

impl ModuleInfo
{
    /// First address past the end of the image.
    #[must_use]
    pub fn end(&self) -> Address
    {
        self.base + self.size
    }

    #[must_use]
    pub fn contains(&self, address: Address) -> bool
    {
        address >= self.base && address.offset_from(self.base).is_some_and(|offset| offset < self.size)
    }

    /// Name with extension, e.g. `kernel32.dll`.
    #[must_use]
    pub fn file_name(&self) -> String
    {
        format!("{}{}", self.name, self.extension)
    }

    /// Compact view used by UI notifications.
    #[must_use]
    pub fn summary(&self) -> ModuleSummary
    {
        ModuleSummary {
            base: self.base,
            size: self.size,
            name: self.file_name(),
        }
    }
}

/// Minimal description of a module for UI-facing module lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSummary
{
    pub base: Address,
    pub size: u64,
    pub name: String,
}
