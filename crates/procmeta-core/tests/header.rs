//! Tests for binary header inspection

mod common;

use common::{PeImage, RDATA_RVA, RDATA_SIZE, TEXT_RVA, TEXT_SIZE};
use procmeta_core::error::ProcmetaError;
use procmeta_core::modules::header::inspect_image;
use procmeta_core::types::Address;

const BASE: u64 = 0x7ff6_1000_0000;

#[test]
fn test_exe_entry_is_relocated_to_load_base()
{
    let layout = inspect_image(&PeImage::exe(0x1010).build(), Address::from(BASE)).unwrap();
    assert!(!layout.is_dll);
    assert_eq!(layout.entry, Address::from(BASE + 0x1010));
}

#[test]
fn test_exe_with_zero_entry_starts_at_base()
{
    let layout = inspect_image(&PeImage::exe(0).build(), Address::from(BASE)).unwrap();
    assert_eq!(layout.entry, Address::from(BASE));
}

#[test]
fn test_dll_without_entry_has_none()
{
    let layout = inspect_image(&PeImage::dll(0, &[]).build(), Address::from(BASE)).unwrap();
    assert!(layout.is_dll);
    assert_eq!(layout.entry, Address::ZERO);
}

#[test]
fn test_dll_entry_is_kept_when_present()
{
    let layout = inspect_image(&PeImage::dll(0x1080, &[]).build(), Address::from(BASE)).unwrap();
    assert_eq!(layout.entry, Address::from(BASE + 0x1080));
}

#[test]
fn test_sections_in_header_order()
{
    let layout = inspect_image(&PeImage::exe(0x1010).build(), Address::from(BASE)).unwrap();
    assert_eq!(layout.sections.len(), 2);

    let text = &layout.sections[0];
    assert_eq!(text.name.as_str(), ".text");
    assert_eq!(text.addr, Address::from(BASE + u64::from(TEXT_RVA)));
    assert_eq!(text.size, u64::from(TEXT_SIZE));

    let rdata = &layout.sections[1];
    assert_eq!(rdata.name.as_str(), ".rdata");
    assert_eq!(rdata.addr, Address::from(BASE + u64::from(RDATA_RVA)));
    assert_eq!(rdata.size, u64::from(RDATA_SIZE));
}

#[test]
fn test_exports_are_relocated()
{
    let image = PeImage::dll(0x1010, &[("Alpha", 0x1020), ("Beta", 0x1040)]).build();
    let layout = inspect_image(&image, Address::from(BASE)).unwrap();

    let mut exports: Vec<_> = layout
        .exports
        .iter()
        .map(|export| (export.name.as_str(), export.address))
        .collect();
    exports.sort();
    assert_eq!(
        exports,
        [
            ("Alpha", Address::from(BASE + 0x1020)),
            ("Beta", Address::from(BASE + 0x1040))
        ]
    );
}

#[test]
fn test_image_without_export_table_has_no_exports()
{
    let layout = inspect_image(&PeImage::exe(0x1010).build(), Address::from(BASE)).unwrap();
    assert!(layout.exports.is_empty());
}

#[test]
fn test_truncated_image_is_a_header_error()
{
    let image = PeImage::exe(0x1010).build();
    let err = inspect_image(&image[..0x40], Address::from(BASE)).unwrap_err();
    assert!(matches!(err, ProcmetaError::Header(_)));
}

#[cfg(target_os = "linux")]
#[test]
fn test_inspects_own_executable()
{
    let data = std::fs::read(std::env::current_exe().unwrap()).unwrap();
    let layout = inspect_image(&data, Address::from(0x5555_0000_0000)).unwrap();

    assert!(!layout.entry.is_null());
    assert!(layout.sections.iter().any(|section| section.name.as_str() == ".text"));

    let names: Vec<&str> = layout.sections.iter().map(|section| section.name.as_str()).collect();
    assert!(names.contains(&".eh_frame"), "{names:?}");
    assert!(names.contains(&".eh_frame_hdr"), "{names:?}");
}
