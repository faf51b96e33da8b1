//! Symbol demangling.
//!
//! Rust symbols (legacy `_ZN...` and v0 `_R...`) are demangled with
//! `rustc-demangle`, without the trailing hash. Anything else is returned
//! unchanged.

use rustc_demangle::try_demangle;

/// Human-readable form of a raw linkage name.
///
/// ```rust
/// use procmeta_core::symbols::display_name;
///
/// assert_eq!(display_name("_ZN4core3fmt5write17h0123456789abcdefE"), "core::fmt::write");
/// assert_eq!(display_name("CreateFileW"), "CreateFileW");
/// ```
#[must_use]
pub fn display_name(raw: &str) -> String
{
    match try_demangle(raw) {
        Ok(demangled) => format!("{demangled:#}"),
        Err(_) => raw.to_owned(),
    }
}
