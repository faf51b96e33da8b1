//! Shared fixtures: a minimal PE32+ image builder and in-memory debuggee fakes.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use procmeta_core::error::{ProcmetaError, Result};
use procmeta_core::memory::{BreakpointTraps, MemoryReader, RegionQuery};
use procmeta_core::registers::{ContextRegister, DebugContext};
use procmeta_core::symbols::{LineMatch, SymbolMatch, SymbolProvider};
use procmeta_core::types::{Address, MemoryState, ModuleInfo, RegionInfo, RegionKind};
use procmeta_core::Debuggee;

/// Size of every image produced by [`PeImage::build`]. File layout equals
/// memory layout, so the same bytes serve as a disk file and a memory image.
pub const IMAGE_SIZE: u64 = 0x3000;
pub const TEXT_RVA: u32 = 0x1000;
pub const TEXT_SIZE: u32 = 0x100;
pub const RDATA_RVA: u32 = 0x2000;
pub const RDATA_SIZE: u32 = 0x200;

const PE_OFFSET: usize = 0x80;
const OPTIONAL_HEADER_SIZE: usize = 240;

/// PE32+ image with `.text` and `.rdata` sections and an optional export table.
#[derive(Debug, Clone)]
pub struct PeImage
{
    pub dll: bool,
    pub entry_rva: u32,
    /// `(name, rva)` pairs placed in the export table.
    pub exports: Vec<(&'static str, u32)>,
}

impl PeImage
{
    pub fn exe(entry_rva: u32) -> Self
    {
        Self {
            dll: false,
            entry_rva,
            exports: Vec::new(),
        }
    }

    pub fn dll(entry_rva: u32, exports: &[(&'static str, u32)]) -> Self
    {
        Self {
            dll: true,
            entry_rva,
            exports: exports.to_vec(),
        }
    }

    pub fn build(&self) -> Vec<u8>
    {
        let mut image = vec![0u8; IMAGE_SIZE as usize];

        // DOS header
        image[0..2].copy_from_slice(b"MZ");
        put_u32(&mut image, 0x3c, PE_OFFSET as u32);

        // COFF header
        image[PE_OFFSET..PE_OFFSET + 4].copy_from_slice(b"PE\0\0");
        let coff = PE_OFFSET + 4;
        put_u16(&mut image, coff, 0x8664);
        put_u16(&mut image, coff + 2, 2);
        put_u16(&mut image, coff + 16, OPTIONAL_HEADER_SIZE as u16);
        let characteristics = if self.dll { 0x2022 } else { 0x0022 };
        put_u16(&mut image, coff + 18, characteristics);

        // Optional header
        let opt = coff + 20;
        put_u16(&mut image, opt, 0x20b);
        put_u32(&mut image, opt + 16, self.entry_rva);
        put_u64(&mut image, opt + 24, 0x1_8000_0000);
        put_u32(&mut image, opt + 32, 0x1000);
        put_u32(&mut image, opt + 36, 0x1000);
        put_u32(&mut image, opt + 56, IMAGE_SIZE as u32);
        put_u32(&mut image, opt + 60, 0x1000);
        put_u32(&mut image, opt + 108, 16);

        if !self.exports.is_empty() {
            let size = self.write_export_table(&mut image);
            put_u32(&mut image, opt + 112, RDATA_RVA);
            put_u32(&mut image, opt + 116, size);
        }

        // Section table
        let sections = opt + OPTIONAL_HEADER_SIZE;
        write_section(&mut image, sections, b".text", TEXT_RVA, TEXT_SIZE, 0x6000_0020);
        write_section(&mut image, sections + 40, b".rdata", RDATA_RVA, RDATA_SIZE, 0x4000_0040);

        image
    }

    /// Export directory at the start of `.rdata`. Returns its size.
    fn write_export_table(&self, image: &mut [u8]) -> u32
    {
        let dir = RDATA_RVA as usize;
        let count = self.exports.len() as u32;
        let functions = RDATA_RVA + 0x40;
        let names = functions + 4 * count;
        let ordinals = names + 4 * count;
        let mut strings = ordinals + 2 * count;

        let module_name = strings;
        strings = put_cstr(image, strings, "fixture.dll");

        put_u32(image, dir + 12, module_name);
        put_u32(image, dir + 16, 1);
        put_u32(image, dir + 20, count);
        put_u32(image, dir + 24, count);
        put_u32(image, dir + 28, functions);
        put_u32(image, dir + 32, names);
        put_u32(image, dir + 36, ordinals);

        for (index, (name, rva)) in self.exports.iter().enumerate() {
            let index = index as u32;
            put_u32(image, (functions + 4 * index) as usize, *rva);
            put_u32(image, (names + 4 * index) as usize, strings);
            put_u16(image, (ordinals + 2 * index) as usize, index as u16);
            strings = put_cstr(image, strings, name);
        }
        strings - RDATA_RVA
    }
}

fn write_section(image: &mut [u8], at: usize, name: &[u8], rva: u32, size: u32, characteristics: u32)
{
    image[at..at + name.len()].copy_from_slice(name);
    put_u32(image, at + 8, size);
    put_u32(image, at + 12, rva);
    put_u32(image, at + 16, 0x1000);
    put_u32(image, at + 20, rva);
    put_u32(image, at + 36, characteristics);
}

fn put_u16(image: &mut [u8], at: usize, value: u16)
{
    image[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(image: &mut [u8], at: usize, value: u32)
{
    image[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_u64(image: &mut [u8], at: usize, value: u64)
{
    image[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

fn put_cstr(image: &mut [u8], rva: u32, text: &str) -> u32
{
    let at = rva as usize;
    image[at..at + text.len()].copy_from_slice(text.as_bytes());
    image[at + text.len()] = 0;
    rva + text.len() as u32 + 1
}

/// Debuggee memory made of disjoint byte blocks.
#[derive(Debug, Default)]
pub struct FakeMemory
{
    blocks: Vec<(u64, Vec<u8>)>,
}

impl FakeMemory
{
    pub fn with_block(mut self, base: u64, bytes: Vec<u8>) -> Self
    {
        self.blocks.push((base, bytes));
        self
    }
}

impl MemoryReader for FakeMemory
{
    fn read_bytes(&self, address: Address, len: usize) -> Result<Vec<u8>>
    {
        let start = address.value();
        self.blocks
            .iter()
            .find_map(|(base, bytes)| {
                let offset = usize::try_from(start.checked_sub(*base)?).ok()?;
                bytes.get(offset..offset.checked_add(len)?).map(<[u8]>::to_vec)
            })
            .ok_or(ProcmetaError::MemoryRead { address, len })
    }
}

/// Counts trap lifting and re-insertion.
#[derive(Debug, Default)]
pub struct CountingTraps
{
    pub lifted: AtomicUsize,
    pub restored: AtomicUsize,
}

impl CountingTraps
{
    pub fn counts(&self) -> (usize, usize)
    {
        (self.lifted.load(Ordering::SeqCst), self.restored.load(Ordering::SeqCst))
    }
}

impl BreakpointTraps for CountingTraps
{
    fn disable_traps(&self)
    {
        self.lifted.fetch_add(1, Ordering::SeqCst);
    }

    fn enable_traps(&self)
    {
        self.restored.fetch_add(1, Ordering::SeqCst);
    }
}

/// Region list answering queries by containment. Addresses outside every
/// listed region have no answer.
#[derive(Debug, Default)]
pub struct FakeRegions(pub Vec<RegionInfo>);

impl RegionQuery for FakeRegions
{
    fn query(&self, address: Address) -> Option<RegionInfo>
    {
        self.0.iter().copied().find(|region| region.contains(address))
    }
}

pub fn region(base: u64, size: u64, allocation_base: u64, state: MemoryState) -> RegionInfo
{
    RegionInfo {
        base_address: Address::from(base),
        allocation_base: Address::from(allocation_base),
        allocation_protect: 0,
        region_size: size,
        state,
        protect: if state == MemoryState::Commit { 1 } else { 0 },
        kind: if state == MemoryState::Free {
            RegionKind::Unknown
        } else {
            RegionKind::Private
        },
    }
}

/// Thread context backed by a register table.
#[derive(Debug, Default)]
pub struct FakeContext
{
    pub attached: bool,
    pub values: HashMap<ContextRegister, u64>,
}

impl DebugContext for FakeContext
{
    fn is_attached(&self) -> bool
    {
        self.attached
    }

    fn context_value(&self, register: ContextRegister) -> u64
    {
        self.values.get(&register).copied().unwrap_or_default()
    }
}

/// A stopped process assembled from the fakes above.
#[derive(Debug, Default)]
pub struct FakeProcess
{
    pub memory: FakeMemory,
    pub regions: FakeRegions,
    pub traps: CountingTraps,
    pub context: FakeContext,
}

impl Debuggee for FakeProcess
{
    fn memory(&self) -> &dyn MemoryReader
    {
        &self.memory
    }

    fn regions(&self) -> &dyn RegionQuery
    {
        &self.regions
    }

    fn traps(&self) -> &dyn BreakpointTraps
    {
        &self.traps
    }

    fn context(&self) -> &dyn DebugContext
    {
        &self.context
    }
}

/// Symbol provider over fixed tables.
#[derive(Debug, Default)]
pub struct FakeSymbols
{
    /// `(address, name)`
    pub symbols: Vec<(u64, &'static str)>,
    /// `(address, line)`
    pub lines: Vec<(u64, u32)>,
    pub module_lists: Mutex<Vec<usize>>,
}

impl SymbolProvider for FakeSymbols
{
    fn update_module_list(&self, modules: &[ModuleInfo])
    {
        self.module_lists.lock().unwrap().push(modules.len());
    }

    fn nearest_symbol(&self, address: Address) -> Option<SymbolMatch>
    {
        self.symbols
            .iter()
            .filter(|(start, _)| *start <= address.value())
            .max_by_key(|(start, _)| *start)
            .map(|(start, name)| SymbolMatch {
                name: (*name).to_string(),
                displacement: address.value() - start,
            })
    }

    fn source_line(&self, address: Address) -> Option<LineMatch>
    {
        self.lines
            .iter()
            .filter(|(start, _)| *start <= address.value())
            .max_by_key(|(start, _)| *start)
            .map(|(start, line)| LineMatch {
                file: Some("src/main.c".to_string()),
                line: *line,
                displacement: address.value() - start,
            })
    }
}
