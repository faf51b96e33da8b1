//! # Module Registry
//!
//! Tracks which binary images are mapped into the debuggee.
//!
//! The registry owns a [`RangeMap`] from `[base, base + size - 1]` to the
//! module's [`ModuleInfo`], guarded by a single reader/writer lock:
//!
//! - [`ModuleRegistry::load`], [`ModuleRegistry::unload`] and
//!   [`ModuleRegistry::clear`] take the lock exclusively, and only for the
//!   container mutation itself. Header inspection happens before the lock is
//!   taken, so a record is complete before any reader can see it.
//! - Every accessor takes the lock shared for the span of one query and copies
//!   the result out. Nothing returned aliases registry storage.
//! - Callers that need several lookups under one consistent view use
//!   [`ModuleRegistry::read`], which returns a [`ModuleReadGuard`]. References
//!   handed out by the guard borrow from it and cannot outlive the lock.
//!
//! The registry itself has no side effects beyond its own table. Labelling
//! virtual modules and notifying symbol providers is done by
//! [`DebugSession`](crate::session::DebugSession).

pub mod header;

use std::fs::File;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use memmap2::Mmap;
use tracing::{debug, warn};

use self::header::{inspect_image, ImageExport, ImageLayout};
use crate::error::{ProcmetaError, Result};
use crate::hash;
use crate::memory::MemoryReader;
use crate::range_map::{Range, RangeMap};
use crate::types::{Address, BoundedString, ModuleInfo, SectionList, MAX_MODULE_SIZE};

/// Path prefix marking a module that has no backing file and was injected
/// straight into debuggee memory.
pub const VIRTUAL_MODULE_PREFIX: &str = "virtual:";

/// Result of a successful [`ModuleRegistry::load`].
#[derive(Debug, Clone)]
pub struct LoadedModule
{
    /// Copy of the record now visible in the registry.
    pub info: ModuleInfo,
    /// Exports found in the header, for callers that label them.
    pub exports: Vec<ImageExport>,
}

/// Lifecycle-scoped table of loaded modules.
#[derive(Debug, Default)]
pub struct ModuleRegistry
{
    modules: RwLock<RangeMap<ModuleInfo>>,
}

/// Shared view of the registry.
///
/// Holds the registry's read lock until dropped. Writers block while any
/// guard is alive, so keep guards short-lived.
pub struct ModuleReadGuard<'a>
{
    modules: RwLockReadGuard<'a, RangeMap<ModuleInfo>>,
}

impl ModuleReadGuard<'_>
{
    /// Module containing `address`.
    #[must_use]
    pub fn find_by_address(&self, address: Address) -> Option<&ModuleInfo>
    {
        find_by_address(&self.modules, address)
    }

    /// First module whose name matches `name`, with or without extension, ignoring case.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&ModuleInfo>
    {
        find_by_name(&self.modules, name)
    }

    /// Modules in ascending base order.
    pub fn iter(&self) -> impl Iterator<Item = &ModuleInfo>
    {
        self.modules.values()
    }

    #[must_use]
    pub fn len(&self) -> usize
    {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.modules.is_empty()
    }
}

fn find_by_address(modules: &RangeMap<ModuleInfo>, address: Address) -> Option<&ModuleInfo>
{
    modules.get(address.value()).map(|(_, info)| info)
}

fn find_by_name<'m>(modules: &'m RangeMap<ModuleInfo>, name: &str) -> Option<&'m ModuleInfo>
{
    if name.is_empty() || !BoundedString::<MAX_MODULE_SIZE>::fits(name) {
        return None;
    }
    let wanted = name.to_lowercase();
    modules
        .values()
        .find(|module| module.name.as_str() == wanted || module.file_name() == wanted)
}

impl ModuleRegistry
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Acquire a shared view for several lookups against one consistent state.
    pub fn read(&self) -> ModuleReadGuard<'_>
    {
        ModuleReadGuard {
            modules: self.shared(),
        }
    }

    // Records are immutable once inserted, so a panic in another lock holder
    // cannot leave one half-written; recovering from poison is sound.
    fn shared(&self) -> RwLockReadGuard<'_, RangeMap<ModuleInfo>>
    {
        self.modules.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn exclusive(&self) -> RwLockWriteGuard<'_, RangeMap<ModuleInfo>>
    {
        self.modules.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the module mapped at `[base, base + size)`.
    ///
    /// The file name and extension are derived from `full_path` (lowercased),
    /// and the header is inspected either from the file on disk or, for paths
    /// starting with [`VIRTUAL_MODULE_PREFIX`], from `size` bytes of debuggee
    /// memory read through `memory`. An unreadable header is not fatal: the
    /// module is still registered, without entry point or sections.
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument`: `base` or `size` is zero, `full_path` is empty, or
    ///   the extent wraps the address space
    /// - `Overlap`: the extent overlaps a module that is already loaded
    pub fn load(&self, base: Address, size: u64, full_path: &str, memory: &dyn MemoryReader) -> Result<LoadedModule>
    {
        if base.is_null() || size == 0 || full_path.is_empty() {
            return Err(ProcmetaError::InvalidArgument(format!(
                "module load needs a base, a size and a path (base={base}, size={size:#x}, path={full_path:?})"
            )));
        }
        let range = Range::from_base_size(base.value(), size)
            .ok_or_else(|| ProcmetaError::InvalidArgument(format!("module extent {base}+{size:#x} wraps")))?;

        let (name, extension) = split_module_path(full_path);
        let is_virtual = full_path.starts_with(VIRTUAL_MODULE_PREFIX);

        let layout = if is_virtual {
            read_virtual_layout(base, size, memory)
        } else {
            read_disk_layout(base, full_path)
        }
        .unwrap_or_else(|err| {
            warn!(path = full_path, %err, "module header unavailable, registering without layout");
            ImageLayout::default()
        });

        let info = ModuleInfo {
            base,
            size,
            hash: hash::hash_from_name(&format!("{name}{extension}")),
            name,
            extension,
            path: full_path.to_owned(),
            entry: layout.entry,
            sections: layout.sections,
            is_virtual,
        };

        self.exclusive().insert(range, info.clone())?;
        debug!(name = %info.file_name(), base = %base, size, "module loaded");

        Ok(LoadedModule {
            info,
            exports: layout.exports,
        })
    }

    /// Remove the module containing `base`.
    ///
    /// ## Errors
    ///
    /// `NotFound` if no module contains `base`; the registry is unchanged.
    pub fn unload(&self, base: Address) -> Result<ModuleInfo>
    {
        let removed = self.exclusive().remove(base.value());
        match removed {
            Some((_, info)) => {
                debug!(name = %info.file_name(), base = %info.base, "module unloaded");
                Ok(info)
            }
            None => Err(ProcmetaError::NotFound(format!("no module at {base}"))),
        }
    }

    /// Remove every module. Returns how many were removed.
    pub fn clear(&self) -> usize
    {
        let mut modules = self.exclusive();
        let count = modules.len();
        modules.clear();
        drop(modules);
        debug!(count, "module list cleared");
        count
    }

    #[must_use]
    pub fn len(&self) -> usize
    {
        self.shared().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.shared().is_empty()
    }

    /// Copy of the module containing `address`.
    #[must_use]
    pub fn info_from_address(&self, address: Address) -> Option<ModuleInfo>
    {
        find_by_address(&self.shared(), address).cloned()
    }

    /// Name of the module containing `address`, optionally with its extension.
    ///
    /// `None` if unmapped or if the name does not fit a module-name buffer.
    #[must_use]
    pub fn name_from_address(&self, address: Address, with_extension: bool) -> Option<BoundedString<MAX_MODULE_SIZE>>
    {
        let modules = self.shared();
        let module = find_by_address(&modules, address)?;
        if with_extension {
            BoundedString::try_from_str(&module.file_name())
        } else {
            Some(module.name.clone())
        }
    }

    #[must_use]
    pub fn base_from_address(&self, address: Address) -> Option<Address>
    {
        find_by_address(&self.shared(), address).map(|module| module.base)
    }

    /// Stable identity of `address`.
    ///
    /// Inside a module this is the module's name hash plus the offset from
    /// its base, so it does not change when the module loads elsewhere.
    /// Outside every module the address itself is returned.
    #[must_use]
    pub fn hash_from_address(&self, address: Address) -> u64
    {
        let modules = self.shared();
        match find_by_address(&modules, address) {
            Some(module) => u64::from(module.hash).wrapping_add(address.value() - module.base.value()),
            None => address.value(),
        }
    }

    /// See [`hash::hash_from_name`].
    #[must_use]
    pub fn hash_from_name(name: &str) -> u32
    {
        hash::hash_from_name(name)
    }

    /// Base of the first module named `name` (with or without extension, any case).
    ///
    /// Linear in the number of modules.
    #[must_use]
    pub fn base_from_name(&self, name: &str) -> Option<Address>
    {
        find_by_name(&self.shared(), name).map(|module| module.base)
    }

    #[must_use]
    pub fn size_from_address(&self, address: Address) -> Option<u64>
    {
        find_by_address(&self.shared(), address).map(|module| module.size)
    }

    #[must_use]
    pub fn sections_from_address(&self, address: Address) -> Option<SectionList>
    {
        find_by_address(&self.shared(), address).map(|module| module.sections.clone())
    }

    #[must_use]
    pub fn entry_from_address(&self, address: Address) -> Option<Address>
    {
        find_by_address(&self.shared(), address).map(|module| module.entry)
    }

    #[must_use]
    pub fn path_from_address(&self, address: Address) -> Option<String>
    {
        find_by_address(&self.shared(), address).map(|module| module.path.clone())
    }

    #[must_use]
    pub fn path_from_name(&self, name: &str) -> Option<String>
    {
        find_by_name(&self.shared(), name).map(|module| module.path.clone())
    }

    /// Copies of all modules in ascending base order.
    #[must_use]
    pub fn list(&self) -> Vec<ModuleInfo>
    {
        self.shared().values().cloned().collect()
    }
}

/// Split a loader path into lowercase `(name, extension)`.
///
/// The file component starts after the last `\` or `/`; the extension starts
/// at its last dot and keeps the dot.
///
/// ```rust
/// use procmeta_core::modules::split_module_path;
///
/// let (name, ext) = split_module_path("C:\\Windows\\System32\\KERNEL32.DLL");
/// assert_eq!((name.as_str(), ext.as_str()), ("kernel32", ".dll"));
/// ```
#[must_use]
pub fn split_module_path(full_path: &str) -> (BoundedString<MAX_MODULE_SIZE>, BoundedString<MAX_MODULE_SIZE>)
{
    let folded = full_path.to_lowercase();
    let file = folded.rsplit(['\\', '/']).next().unwrap_or_default();
    let (name, extension) = match file.rfind('.') {
        Some(dot) => file.split_at(dot),
        None => (file, ""),
    };
    if !BoundedString::<MAX_MODULE_SIZE>::fits(name) {
        warn!(name, "module name truncated");
    }
    (
        BoundedString::from_str_truncated(name),
        BoundedString::from_str_truncated(extension),
    )
}

fn read_disk_layout(base: Address, full_path: &str) -> Result<ImageLayout>
{
    let file = File::open(full_path)?;
    // SAFETY: the mapping is read-only and dropped before this function
    // returns. A concurrent truncation of the module file by another process
    // is the only hazard, the same one every loader-side mapper accepts.
    let view = unsafe { Mmap::map(&file)? };
    inspect_image(&view, base)
}

fn read_virtual_layout(base: Address, size: u64, memory: &dyn MemoryReader) -> Result<ImageLayout>
{
    let len = usize::try_from(size)
        .map_err(|_| ProcmetaError::InvalidArgument(format!("virtual module size {size:#x} exceeds host memory")))?;
    let image = memory.read_bytes(base, len)?;
    inspect_image(&image, base)
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::memory::NoMemory;

    #[test]
    fn test_split_module_path_variants()
    {
        let (name, ext) = split_module_path("/usr/lib/libc.so.6");
        assert_eq!((name.as_str(), ext.as_str()), ("libc.so", ".6"));

        let (name, ext) = split_module_path("NoExtension");
        assert_eq!((name.as_str(), ext.as_str()), ("noextension", ""));

        let (name, ext) = split_module_path("virtual:\\Injected.DLL");
        assert_eq!((name.as_str(), ext.as_str()), ("injected", ".dll"));
    }

    #[test]
    fn test_hash_ignores_extension()
    {
        let registry = ModuleRegistry::new();
        let loaded = registry
            .load(Address::from(0x1000), 0x1000, "C:\\missing\\Foo.dll", &NoMemory)
            .unwrap();
        assert_eq!(loaded.info.hash, ModuleRegistry::hash_from_name("foo"));
    }

    #[test]
    fn test_guard_lookups_share_one_view()
    {
        let registry = ModuleRegistry::new();
        registry.load(Address::from(0x1000), 0x1000, "/lib/a.so", &NoMemory).unwrap();
        registry.load(Address::from(0x8000), 0x1000, "/lib/b.so", &NoMemory).unwrap();

        let view = registry.read();
        assert_eq!(view.len(), 2);
        assert_eq!(view.find_by_address(Address::from(0x8010)).map(|m| m.name.as_str()), Some("b"));
        assert_eq!(view.find_by_name("A.SO").map(|m| m.base), Some(Address::from(0x1000)));
        assert_eq!(view.iter().map(|m| m.base.value()).collect::<Vec<_>>(), [0x1000, 0x8000]);
    }
}
