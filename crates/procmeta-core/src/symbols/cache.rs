//! # Symbol Cache
//!
//! [`DwarfSymbols`] keeps one [`SymbolImage`] per loaded disk-backed module.
//! Images are parsed once when a module first appears in the module list and
//! dropped when it disappears. Virtual modules have no file and are skipped.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use procmeta_core::memory::NoMemory;
//! use procmeta_core::modules::ModuleRegistry;
//! use procmeta_core::symbols::{DwarfSymbols, SymbolProvider};
//! use procmeta_core::types::Address;
//!
//! let modules = ModuleRegistry::new();
//! modules.load(Address::from(0x5555_5555_4000), 0x2000, "/usr/bin/true", &NoMemory)?;
//!
//! let symbols = DwarfSymbols::new();
//! symbols.update_module_list(&modules.list());
//! if let Some(line) = symbols.source_line(Address::from(0x5555_5555_5010)) {
//!     println!("line {}", line.line);
//! }
//! # Ok::<(), procmeta_core::error::ProcmetaError>(())
//! ```

use std::io::ErrorKind;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use super::image::SymbolImage;
use super::{LineMatch, SymbolMatch, SymbolProvider};
use crate::error::ProcmetaError;
use crate::types::{Address, ModuleInfo};

/// [`SymbolProvider`] backed by symbol tables and DWARF on disk.
#[derive(Default)]
pub struct DwarfSymbols
{
    images: Mutex<Vec<SymbolImage>>,
}

impl DwarfSymbols
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Number of modules with loaded symbol data.
    #[must_use]
    pub fn image_count(&self) -> usize
    {
        self.images.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn with_image<T>(&self, address: Address, query: impl FnOnce(&SymbolImage) -> Option<T>) -> Option<T>
    {
        let images = self.images.lock().unwrap_or_else(PoisonError::into_inner);
        images.iter().find(|image| image.contains(address)).and_then(query)
    }
}

impl SymbolProvider for DwarfSymbols
{
    fn update_module_list(&self, modules: &[ModuleInfo])
    {
        let wanted: Vec<&ModuleInfo> = modules.iter().filter(|module| !module.is_virtual).collect();
        let missing: Vec<&ModuleInfo> = {
            let images = self.images.lock().unwrap_or_else(PoisonError::into_inner);
            wanted
                .iter()
                .copied()
                .filter(|module| !images.iter().any(|image| image.matches(module)))
                .collect()
        };

        // Parsing happens outside the lock; queries keep seeing the old images.
        let mut parsed = Vec::with_capacity(missing.len());
        for module in missing {
            match SymbolImage::load(module) {
                Ok(image) => parsed.push(image),
                Err(ProcmetaError::Io(err)) if err.kind() == ErrorKind::NotFound => {
                    debug!(path = %module.path, "module file missing, no symbols");
                }
                Err(err) => warn!(path = %module.path, %err, "failed to load symbols"),
            }
        }

        let mut images = self.images.lock().unwrap_or_else(PoisonError::into_inner);
        let mut previous = std::mem::take(&mut *images);
        previous.append(&mut parsed);
        for module in wanted {
            if let Some(index) = previous.iter().position(|image| image.matches(module)) {
                images.push(previous.swap_remove(index));
            }
        }
        debug!(count = images.len(), dropped = previous.len(), "symbol images updated");
    }

    fn nearest_symbol(&self, address: Address) -> Option<SymbolMatch>
    {
        self.with_image(address, |image| image.nearest_symbol(address))
    }

    fn source_line(&self, address: Address) -> Option<LineMatch>
    {
        self.with_image(address, |image| image.source_line(address))
    }
}
