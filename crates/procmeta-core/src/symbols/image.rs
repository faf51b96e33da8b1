//! Per-module symbol data: the symbol table and DWARF line information of
//! one image, relocated to where the image is loaded.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use addr2line::Context;
use gimli::{Dwarf, EndianArcSlice, RunTimeEndian, SectionId};
use object::{Object, ObjectSection, ObjectSymbol, SymbolKind};
use once_cell::sync::OnceCell;
use tracing::debug;

use super::demangle::display_name;
use super::{LineMatch, SymbolMatch};
use crate::error::{ProcmetaError, Result};
use crate::modules::header::preferred_base;
use crate::types::{Address, ModuleInfo};

type OwnedReader = EndianArcSlice<RunTimeEndian>;

const LINE_SECTIONS: &[(SectionId, &[&str])] = &[
    (SectionId::DebugAbbrev, &[".debug_abbrev", "__debug_abbrev"]),
    (SectionId::DebugAddr, &[".debug_addr", "__debug_addr"]),
    (SectionId::DebugInfo, &[".debug_info", "__debug_info"]),
    (SectionId::DebugLine, &[".debug_line", "__debug_line"]),
    (SectionId::DebugLineStr, &[".debug_line_str", "__debug_line_str"]),
    (SectionId::DebugRanges, &[".debug_ranges", "__debug_ranges"]),
    (SectionId::DebugRngLists, &[".debug_rnglists", "__debug_rnglists"]),
    (SectionId::DebugStr, &[".debug_str", "__debug_str"]),
    (SectionId::DebugStrOffsets, &[".debug_str_offsets", "__debug_str_offsets"]),
];

fn load_section_bytes(file: &object::File<'_>, names: &[&str]) -> Result<Option<Arc<[u8]>>>
{
    for name in names {
        if let Some(section) = file.section_by_name(name) {
            let data = section
                .uncompressed_data()
                .map_err(|err| ProcmetaError::Header(format!("failed to read {name}: {err}")))?;
            return Ok(Some(match data {
                Cow::Borrowed(bytes) => Arc::<[u8]>::from(bytes),
                Cow::Owned(vec) => vec.into(),
            }));
        }
    }
    Ok(None)
}

/// Symbol table and line information for one loaded module.
pub struct SymbolImage
{
    path: String,
    base: Address,
    size: u64,
    /// Load address minus the image's preferred base.
    slide: u64,
    endian: RunTimeEndian,
    /// Code symbols by file address, sorted ascending.
    symbols: Vec<(u64, String)>,
    debug_sections: HashMap<SectionId, Arc<[u8]>>,
    context: OnceCell<Option<Context<OwnedReader>>>,
}

impl SymbolImage
{
    /// Read symbol data for `module` from its file on disk.
    ///
    /// ## Errors
    ///
    /// - `Io`: the file cannot be read
    /// - `Header`: the file is not a recognised image or a debug section is corrupt
    pub fn load(module: &ModuleInfo) -> Result<Self>
    {
        let bytes = fs::read(&module.path)?;
        let file = object::File::parse(bytes.as_slice())
            .map_err(|err| ProcmetaError::Header(format!("failed to parse {}: {err}", module.path)))?;

        let endian = if file.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };

        let mut symbols: Vec<(u64, String)> = file
            .symbols()
            .chain(file.dynamic_symbols())
            .filter(|symbol| symbol.kind() == SymbolKind::Text && symbol.address() != 0)
            .filter_map(|symbol| {
                let name = symbol.name().ok()?;
                (!name.is_empty()).then(|| (symbol.address(), display_name(name)))
            })
            .collect();
        symbols.sort_by_key(|(address, _)| *address);
        symbols.dedup_by_key(|(address, _)| *address);

        let mut debug_sections = HashMap::new();
        for (id, aliases) in LINE_SECTIONS {
            if let Some(data) = load_section_bytes(&file, aliases)? {
                debug_sections.insert(*id, data);
            }
        }

        debug!(
            path = %module.path,
            symbols = symbols.len(),
            dwarf = !debug_sections.is_empty(),
            "symbol image loaded"
        );

        Ok(Self {
            path: module.path.clone(),
            base: module.base,
            size: module.size,
            slide: module.base.value().wrapping_sub(preferred_base(&file)),
            endian,
            symbols,
            debug_sections,
            context: OnceCell::new(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &str
    {
        &self.path
    }

    #[must_use]
    pub fn base(&self) -> Address
    {
        self.base
    }

    /// Whether this image was loaded for `module` at its current base.
    #[must_use]
    pub fn matches(&self, module: &ModuleInfo) -> bool
    {
        self.base == module.base && self.path == module.path
    }

    #[must_use]
    pub fn contains(&self, address: Address) -> bool
    {
        address.offset_from(self.base).is_some_and(|offset| offset < self.size)
    }

    fn file_address(&self, address: Address) -> Option<u64>
    {
        self.contains(address).then(|| address.value().wrapping_sub(self.slide))
    }

    fn section_reader(&self, id: SectionId) -> OwnedReader
    {
        let data = self
            .debug_sections
            .get(&id)
            .cloned()
            .unwrap_or_else(|| Arc::<[u8]>::from(Vec::new()));
        EndianArcSlice::new(data, self.endian)
    }

    fn line_context(&self) -> Option<&Context<OwnedReader>>
    {
        self.context
            .get_or_init(|| {
                if self.debug_sections.is_empty() {
                    return None;
                }
                let dwarf = Dwarf::load(|section| Ok::<_, gimli::Error>(self.section_reader(section))).ok()?;
                match Context::from_dwarf(dwarf) {
                    Ok(context) => Some(context),
                    Err(err) => {
                        debug!(path = %self.path, %err, "DWARF line information unusable");
                        None
                    }
                }
            })
            .as_ref()
    }

    /// Nearest code symbol at or below `address`.
    #[must_use]
    pub fn nearest_symbol(&self, address: Address) -> Option<SymbolMatch>
    {
        let file_addr = self.file_address(address)?;
        let index = self.symbols.partition_point(|(start, _)| *start <= file_addr);
        let (start, name) = self.symbols.get(index.checked_sub(1)?)?;
        Some(SymbolMatch {
            name: name.clone(),
            displacement: file_addr - start,
        })
    }

    /// Line-table row containing `address`.
    #[must_use]
    pub fn source_line(&self, address: Address) -> Option<LineMatch>
    {
        let file_addr = self.file_address(address)?;
        let context = self.line_context()?;
        let mut rows = context.find_location_range(file_addr, file_addr.saturating_add(1)).ok()?;
        let (row_start, _, location) = rows.next()?;
        Some(LineMatch {
            file: location.file.map(str::to_owned),
            line: location.line?,
            displacement: file_addr.checked_sub(row_start)?,
        })
    }
}
