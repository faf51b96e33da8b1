//! # Symbols
//!
//! The symbol provider seam used by address resolution, plus a DWARF/symbol
//! table backed implementation.
//!
//! A [`SymbolProvider`] is told whenever the module list changes and answers
//! two questions about an address: the nearest preceding symbol, and the
//! source line containing it. Both answers carry the displacement from the
//! start of the symbol or line-table row, so callers can decide whether a
//! match is exact.
//!
//! ## Implementations
//!
//! - [`DwarfSymbols`]: reads symbol tables and DWARF line programs from the
//!   module files on disk (`object`, `gimli`, `addr2line`)
//! - [`NoSymbols`]: answers nothing; used when symbol loading is disabled

mod cache;
mod demangle;
mod image;

pub use cache::DwarfSymbols;
pub use demangle::display_name;
pub use image::SymbolImage;

use crate::types::{Address, ModuleInfo};

/// Nearest symbol at or below an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMatch
{
    /// Demangled name when demangling succeeds, raw name otherwise.
    pub name: String,
    /// Distance from the symbol's start to the queried address.
    pub displacement: u64,
}

/// Source line containing an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch
{
    pub file: Option<String>,
    pub line: u32,
    /// Distance from the start of the line-table row to the queried address.
    pub displacement: u64,
}

/// External symbol source consulted by address resolution.
///
/// Implementations synchronise internally; every method takes `&self`.
pub trait SymbolProvider: Send + Sync
{
    /// The set of loaded modules changed. `modules` is the complete new list.
    fn update_module_list(&self, modules: &[ModuleInfo]);

    fn nearest_symbol(&self, address: Address) -> Option<SymbolMatch>;

    fn source_line(&self, address: Address) -> Option<LineMatch>;
}

/// Provider with no symbols.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSymbols;

impl SymbolProvider for NoSymbols
{
    fn update_module_list(&self, _modules: &[ModuleInfo]) {}

    fn nearest_symbol(&self, _address: Address) -> Option<SymbolMatch>
    {
        None
    }

    fn source_line(&self, _address: Address) -> Option<LineMatch>
    {
        None
    }
}
