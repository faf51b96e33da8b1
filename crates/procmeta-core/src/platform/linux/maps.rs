//! `/proc/<pid>/maps` parsing.
//!
//! Linux has no "query the region containing this address" call, so the map
//! file is read and the query is answered from it. Mapped ranges are reported
//! as [`MemoryState::Commit`]; the gaps between them as [`MemoryState::Free`],
//! so a walk from address zero covers the whole address space.

use std::fs;

use crate::error::{ProcmetaError, Result};
use crate::memory::RegionQuery;
use crate::types::{Address, MemoryState, RegionInfo, RegionKind};

/// Protection bits reported in [`RegionInfo::protect`], as in `mmap(2)`.
pub const PROT_READ: u32 = 1;
pub const PROT_WRITE: u32 = 2;
pub const PROT_EXEC: u32 = 4;

/// One line of the map file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapsEntry
{
    pub start: u64,
    /// Exclusive end.
    pub end: u64,
    pub protect: u32,
    pub shared: bool,
    /// Backing file or pseudo-path (`[heap]`, `[stack]`), empty for anonymous memory.
    pub path: String,
}

impl MapsEntry
{
    /// Whether the mapping is backed by a file on disk.
    #[must_use]
    pub fn is_file(&self) -> bool
    {
        self.path.starts_with('/')
    }

    fn kind(&self) -> RegionKind
    {
        if !self.is_file() {
            RegionKind::Private
        } else if self.protect & PROT_EXEC != 0 {
            RegionKind::Image
        } else {
            RegionKind::Mapped
        }
    }
}

/// A file-backed image reconstructed from consecutive mappings of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedImage
{
    pub base: Address,
    pub size: u64,
    pub path: String,
}

/// Parsed snapshot of a process's map file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcMaps
{
    entries: Vec<MapsEntry>,
}

impl ProcMaps
{
    /// Read and parse `/proc/<pid>/maps`.
    ///
    /// ## Errors
    ///
    /// `Io` if the file cannot be read (no such process, or no permission).
    pub fn read(pid: i32) -> Result<Self>
    {
        let text = fs::read_to_string(format!("/proc/{pid}/maps"))?;
        Self::parse(&text)
    }

    /// Parse map file text.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` on a malformed line.
    pub fn parse(text: &str) -> Result<Self>
    {
        let mut entries = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(parse_line)
            .collect::<Result<Vec<_>>>()?;
        entries.sort_by_key(|entry| entry.start);
        Ok(Self { entries })
    }

    #[must_use]
    pub fn entries(&self) -> &[MapsEntry]
    {
        &self.entries
    }

    /// File-backed images, one per run of consecutive mappings of the same file.
    #[must_use]
    pub fn images(&self) -> Vec<MappedImage>
    {
        let mut images: Vec<MappedImage> = Vec::new();
        for entry in self.entries.iter().filter(|entry| entry.is_file()) {
            match images.last_mut() {
                Some(image) if image.path == entry.path => {
                    image.size = entry.end - image.base.value();
                }
                _ => images.push(MappedImage {
                    base: Address::from(entry.start),
                    size: entry.end - entry.start,
                    path: entry.path.clone(),
                }),
            }
        }
        images
    }

    /// Start of the run of same-file mappings that `index` belongs to.
    fn allocation_base(&self, index: usize) -> u64
    {
        let entry = &self.entries[index];
        if !entry.is_file() {
            return entry.start;
        }
        let mut first = index;
        while first > 0 {
            let previous = &self.entries[first - 1];
            if previous.path != entry.path || previous.end != self.entries[first].start {
                break;
            }
            first -= 1;
        }
        self.entries[first].start
    }
}

impl RegionQuery for ProcMaps
{
    fn query(&self, address: Address) -> Option<RegionInfo>
    {
        let addr = address.value();
        let index = self.entries.partition_point(|entry| entry.start <= addr);

        if let Some(entry) = index.checked_sub(1).map(|i| &self.entries[i]) {
            if addr < entry.end {
                let allocation_base = Address::from(self.allocation_base(index - 1));
                return Some(RegionInfo {
                    base_address: Address::from(entry.start),
                    allocation_base,
                    allocation_protect: entry.protect,
                    region_size: entry.end - entry.start,
                    state: MemoryState::Commit,
                    protect: entry.protect,
                    kind: entry.kind(),
                });
            }
        }

        let gap_start = index.checked_sub(1).map_or(0, |i| self.entries[i].end);
        let gap_end = self.entries.get(index).map_or(u64::MAX, |entry| entry.start);
        Some(RegionInfo {
            base_address: Address::from(gap_start),
            allocation_base: Address::ZERO,
            allocation_protect: 0,
            region_size: gap_end - gap_start,
            state: MemoryState::Free,
            protect: 0,
            kind: RegionKind::Unknown,
        })
    }
}

fn next_field(text: &str) -> (&str, &str)
{
    let text = text.trim_start();
    let end = text.find(char::is_whitespace).unwrap_or(text.len());
    text.split_at(end)
}

fn parse_line(line: &str) -> Result<MapsEntry>
{
    let malformed = || ProcmetaError::InvalidArgument(format!("malformed maps line: {line:?}"));

    // address perms offset dev inode [path]
    let (range, rest) = next_field(line);
    let (perms, rest) = next_field(rest);
    let (_offset, rest) = next_field(rest);
    let (_dev, rest) = next_field(rest);
    let (_inode, rest) = next_field(rest);
    let path = rest.trim();

    let (start, end) = range.split_once('-').ok_or_else(malformed)?;
    let start = u64::from_str_radix(start, 16).map_err(|_| malformed())?;
    let end = u64::from_str_radix(end, 16).map_err(|_| malformed())?;
    let perms = perms.as_bytes();
    if end < start || perms.len() < 4 {
        return Err(malformed());
    }

    let mut protect = 0;
    if perms[0] == b'r' {
        protect |= PROT_READ;
    }
    if perms[1] == b'w' {
        protect |= PROT_WRITE;
    }
    if perms[2] == b'x' {
        protect |= PROT_EXEC;
    }

    Ok(MapsEntry {
        start,
        end,
        protect,
        shared: perms[3] == b's',
        path: path.to_owned(),
    })
}
