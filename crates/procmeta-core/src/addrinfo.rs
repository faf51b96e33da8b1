//! # Address Info Resolver
//!
//! Turns a raw address into the module, label and comment a front end shows
//! next to it. Each facet is resolved independently, trying its sources in a
//! fixed order and stopping at the first one that answers:
//!
//! | Facet   | Sources, in order                                                         |
//! |---------|---------------------------------------------------------------------------|
//! | module  | module registry (name with extension)                                     |
//! | label   | annotation store, then the symbol provider's nearest symbol at offset 0   |
//! | comment | annotation store, then the symbol provider's source line at offset 0 (`line: N`) |
//!
//! Symbols and lines are only used when they start exactly at the queried
//! address. No `symbol+0x10` labels are synthesised.

use bitflags::bitflags;
use tracing::trace;

use crate::annotations::{AnnotationKind, AnnotationStore, Origin};
use crate::error::{ProcmetaError, Result};
use crate::modules::ModuleRegistry;
use crate::symbols::SymbolProvider;
use crate::types::{Address, BoundedString, MAX_COMMENT_SIZE, MAX_LABEL_SIZE, MAX_MODULE_SIZE};

bitflags! {
    /// Facets requested from, or written through, the resolver.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InfoFlags: u32 {
        const MODULE = 1;
        const LABEL = 2;
        const COMMENT = 4;
    }
}

/// Request and result buffers for one address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressInfo
{
    pub flags: InfoFlags,
    pub module: BoundedString<MAX_MODULE_SIZE>,
    pub label: BoundedString<MAX_LABEL_SIZE>,
    pub comment: BoundedString<MAX_COMMENT_SIZE>,
}

impl AddressInfo
{
    /// Empty buffers requesting `flags`.
    #[must_use]
    pub fn request(flags: InfoFlags) -> Self
    {
        Self {
            flags,
            ..Self::default()
        }
    }
}

/// Resolves and stores address facets against borrowed collaborators.
pub struct AddressInfoResolver<'a>
{
    modules: &'a ModuleRegistry,
    annotations: &'a dyn AnnotationStore,
    symbols: &'a dyn SymbolProvider,
}

impl<'a> AddressInfoResolver<'a>
{
    pub fn new(modules: &'a ModuleRegistry, annotations: &'a dyn AnnotationStore, symbols: &'a dyn SymbolProvider) -> Self
    {
        Self {
            modules,
            annotations,
            symbols,
        }
    }

    /// Fill the facets requested in `info.flags`.
    ///
    /// Returns `true` if at least one requested facet resolved. Buffers of
    /// facets that were not requested or did not resolve are left exactly as
    /// the caller passed them.
    pub fn get(&self, address: Address, info: &mut AddressInfo) -> bool
    {
        let mut resolved = false;

        if info.flags.contains(InfoFlags::MODULE) {
            if let Some(module) = self.modules.name_from_address(address, true) {
                info.module = module;
                resolved = true;
            } else {
                trace!(%address, "module facet unresolved");
            }
        }

        if info.flags.contains(InfoFlags::LABEL) {
            if let Some(label) = self.label_at(address) {
                info.label = label;
                resolved = true;
            }
        }

        if info.flags.contains(InfoFlags::COMMENT) {
            if let Some(comment) = self.comment_at(address) {
                info.comment = comment;
                resolved = true;
            }
        }

        resolved
    }

    fn label_at(&self, address: Address) -> Option<BoundedString<MAX_LABEL_SIZE>>
    {
        if let Some(label) = self.annotations.get(AnnotationKind::Label, address) {
            return Some(BoundedString::from_str_truncated(&label.text));
        }
        let symbol = self.symbols.nearest_symbol(address)?;
        if symbol.displacement != 0 {
            trace!(%address, name = %symbol.name, displacement = symbol.displacement, "symbol not exact");
            return None;
        }
        Some(BoundedString::from_str_truncated(&symbol.name))
    }

    fn comment_at(&self, address: Address) -> Option<BoundedString<MAX_COMMENT_SIZE>>
    {
        if let Some(comment) = self.annotations.get(AnnotationKind::Comment, address) {
            return Some(BoundedString::from_str_truncated(&comment.text));
        }
        let line = self.symbols.source_line(address)?;
        (line.displacement == 0).then(|| BoundedString::from_str_truncated(&format!("line: {}", line.line)))
    }

    /// Store the label or the comment carried by `info`.
    ///
    /// Only one facet is written. When both [`InfoFlags::LABEL`] and
    /// [`InfoFlags::COMMENT`] are set, the label is written and the comment is
    /// ignored.
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument`: neither a label nor a comment was requested
    /// - whatever the annotation store reports
    pub fn set(&self, address: Address, info: &AddressInfo) -> Result<()>
    {
        if info.flags.contains(InfoFlags::LABEL) {
            self.annotations
                .set(AnnotationKind::Label, address, info.label.as_str(), Origin::User)
        } else if info.flags.contains(InfoFlags::COMMENT) {
            self.annotations
                .set(AnnotationKind::Comment, address, info.comment.as_str(), Origin::User)
        } else {
            Err(ProcmetaError::InvalidArgument(
                "address info write needs a label or comment facet".to_owned(),
            ))
        }
    }
}
