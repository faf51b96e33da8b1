//! Binary header inspection.
//!
//! Extracts the entry point, section table and export table of an image from
//! its raw bytes. The bytes are either a read-only mapping of the module file
//! or a copy of the image read out of debuggee memory; the inspector does not
//! care which. Format parsing is delegated to the `object` crate.
//!
//! ## Entry point policy
//!
//! A zero entry offset is valid for an executable (its code starts at the
//! image base) but means "no entry point" for a library. When the header
//! reports a zero offset and the image is flagged as a DLL / shared object,
//! the effective entry point is [`Address::ZERO`].

use object::{BinaryFormat, FileFlags, Object, ObjectKind, ObjectSection, ObjectSegment};
use smallvec::SmallVec;

use crate::error::{ProcmetaError, Result};
use crate::types::{Address, BoundedString, ModuleSection, SectionList};

/// An exported symbol, relocated to the module's load address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageExport
{
    pub name: String,
    pub address: Address,
}

/// Everything the registry needs from an image header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageLayout
{
    /// Absolute entry point, or [`Address::ZERO`] if the image has none.
    pub entry: Address,
    /// Whether the header flags the image as a library.
    pub is_dll: bool,
    /// Sections in header order, relocated to the load address.
    pub sections: SectionList,
    /// Named exports, relocated to the load address.
    pub exports: Vec<ImageExport>,
}

/// Inspect the image in `data` as if it were loaded at `base`.
///
/// ## Errors
///
/// Returns [`ProcmetaError::Header`] when `data` is not a recognised image
/// format.
pub fn inspect_image(data: &[u8], base: Address) -> Result<ImageLayout>
{
    let file = object::File::parse(data).map_err(|err| ProcmetaError::Header(err.to_string()))?;
    let image_base = preferred_base(&file);

    let is_dll = match file.flags() {
        FileFlags::Coff { characteristics } => characteristics & object::pe::IMAGE_FILE_DLL != 0,
        _ => file.kind() == ObjectKind::Dynamic,
    };

    let entry_offset = file.entry().wrapping_sub(image_base);
    let entry = if entry_offset == 0 && is_dll {
        Address::ZERO
    } else {
        base + entry_offset
    };

    let sections: SectionList = file
        .sections()
        .map(|section| {
            let name = section.name_bytes().unwrap_or_default();
            ModuleSection {
                addr: base + section.address().wrapping_sub(image_base),
                size: section.size(),
                name: BoundedString::from_str_truncated(&escape_section_name(name)),
            }
        })
        .collect::<SmallVec<_>>();

    let exports = match file.exports() {
        Ok(exports) => exports
            .iter()
            .filter(|export| !export.name().is_empty())
            .map(|export| ImageExport {
                name: String::from_utf8_lossy(export.name()).into_owned(),
                address: base + export.address().wrapping_sub(image_base),
            })
            .collect(),
        Err(err) => {
            tracing::debug!(%err, "export table unreadable, continuing without exports");
            Vec::new()
        }
    };

    Ok(ImageLayout {
        entry,
        is_dll,
        sections,
        exports,
    })
}

/// Address the image's own header-relative addresses are measured from.
pub(crate) fn preferred_base(file: &object::File<'_>) -> u64
{
    match file.format() {
        BinaryFormat::Pe | BinaryFormat::Coff => file.relative_address_base(),
        // ELF/Mach-O addresses are absolute link-time addresses; the lowest
        // segment is where the image starts.
        _ => file.segments().map(|segment| segment.address()).min().unwrap_or(0),
    }
}

/// Escape control and non-printable bytes for display.
///
/// ```rust
/// use procmeta_core::modules::header::escape_section_name;
///
/// assert_eq!(escape_section_name(b".text"), ".text");
/// assert_eq!(escape_section_name(b"a\tb\x01"), "a\\tb\\x01");
/// ```
#[must_use]
pub fn escape_section_name(raw: &[u8]) -> String
{
    let mut escaped = String::with_capacity(raw.len());
    for &byte in raw {
        match byte {
            0 => escaped.push_str("\\0"),
            b'\t' => escaped.push_str("\\t"),
            b'\n' => escaped.push_str("\\n"),
            b'\r' => escaped.push_str("\\r"),
            0x0b => escaped.push_str("\\v"),
            0x0c => escaped.push_str("\\f"),
            b'\\' => escaped.push_str("\\\\"),
            b'"' => escaped.push_str("\\\""),
            b' '..=b'~' => escaped.push(char::from(byte)),
            _ => escaped.push_str(&format!("\\x{byte:02X}")),
        }
    }
    escaped
}
