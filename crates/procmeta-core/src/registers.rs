//! # Register Snapshot Builder
//!
//! Captures the current thread's registers from a [`DebugContext`] into a
//! [`RegisterSnapshot`] and decodes the flags word into named bits.
//!
//! ## Flags
//!
//! | Name | Bit | Meaning           |
//! |------|-----|-------------------|
//! | `cf` | 0   | carry             |
//! | `pf` | 2   | parity            |
//! | `af` | 4   | auxiliary carry   |
//! | `zf` | 6   | zero              |
//! | `sf` | 7   | sign              |
//! | `tf` | 8   | trap              |
//! | `if` | 9   | interrupt enable  |
//! | `df` | 10  | direction         |
//! | `of` | 11  | overflow          |

use crate::types::{FlagBits, RegisterSnapshot};

/// Registers a [`DebugContext`] can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextRegister
{
    Cax,
    Ccx,
    Cdx,
    Cbx,
    Csp,
    Cbp,
    Csi,
    Cdi,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
    Cip,
    Eflags,
    Gs,
    Fs,
    Es,
    Ds,
    Cs,
    Ss,
    Dr0,
    Dr1,
    Dr2,
    Dr3,
    Dr6,
    Dr7,
}

/// Thread context of the debuggee's current thread.
pub trait DebugContext
{
    /// Whether a debuggee is attached and stopped.
    fn is_attached(&self) -> bool;

    /// Raw value of `register` in the current thread.
    fn context_value(&self, register: ContextRegister) -> u64;
}

const FLAG_BITS: [(&str, u32); 9] = [
    ("cf", 0),
    ("pf", 2),
    ("af", 4),
    ("zf", 6),
    ("sf", 7),
    ("tf", 8),
    ("if", 9),
    ("df", 10),
    ("of", 11),
];

/// Test the flag called `name` (`"zf"`, `"cf"`, ...) in `eflags`.
///
/// Unknown names read as clear.
///
/// ```rust
/// use procmeta_core::registers::flag_from_name;
///
/// assert!(flag_from_name(0x40, "zf"));
/// assert!(!flag_from_name(0x40, "cf"));
/// assert!(!flag_from_name(u64::MAX, "xf"));
/// ```
#[must_use]
pub fn flag_from_name(eflags: u64, name: &str) -> bool
{
    FLAG_BITS
        .iter()
        .find(|(flag, _)| *flag == name)
        .is_some_and(|(_, bit)| eflags & (1 << bit) != 0)
}

/// Decode every named bit of `eflags`.
#[must_use]
pub fn decode_flags(eflags: u64) -> FlagBits
{
    FlagBits {
        c: flag_from_name(eflags, "cf"),
        p: flag_from_name(eflags, "pf"),
        a: flag_from_name(eflags, "af"),
        z: flag_from_name(eflags, "zf"),
        s: flag_from_name(eflags, "sf"),
        t: flag_from_name(eflags, "tf"),
        i: flag_from_name(eflags, "if"),
        d: flag_from_name(eflags, "df"),
        o: flag_from_name(eflags, "of"),
    }
}

#[cfg(target_pointer_width = "64")]
const fn native(value: u64) -> u64
{
    value
}

#[cfg(not(target_pointer_width = "64"))]
const fn native(value: u64) -> u64
{
    value & 0xffff_ffff
}

/// Capture the current thread's registers.
///
/// Returns the all-zero snapshot when no debuggee is attached.
#[must_use]
pub fn capture(context: &dyn DebugContext) -> RegisterSnapshot
{
    if !context.is_attached() {
        return RegisterSnapshot::default();
    }

    let reg = |register| native(context.context_value(register));
    #[allow(clippy::cast_possible_truncation)]
    let segment = |register| (context.context_value(register) & 0xffff) as u16;

    let eflags = reg(ContextRegister::Eflags);
    RegisterSnapshot {
        cax: reg(ContextRegister::Cax),
        ccx: reg(ContextRegister::Ccx),
        cdx: reg(ContextRegister::Cdx),
        cbx: reg(ContextRegister::Cbx),
        csp: reg(ContextRegister::Csp),
        cbp: reg(ContextRegister::Cbp),
        csi: reg(ContextRegister::Csi),
        cdi: reg(ContextRegister::Cdi),
        #[cfg(target_pointer_width = "64")]
        r8: reg(ContextRegister::R8),
        #[cfg(target_pointer_width = "64")]
        r9: reg(ContextRegister::R9),
        #[cfg(target_pointer_width = "64")]
        r10: reg(ContextRegister::R10),
        #[cfg(target_pointer_width = "64")]
        r11: reg(ContextRegister::R11),
        #[cfg(target_pointer_width = "64")]
        r12: reg(ContextRegister::R12),
        #[cfg(target_pointer_width = "64")]
        r13: reg(ContextRegister::R13),
        #[cfg(target_pointer_width = "64")]
        r14: reg(ContextRegister::R14),
        #[cfg(target_pointer_width = "64")]
        r15: reg(ContextRegister::R15),
        cip: reg(ContextRegister::Cip),
        eflags,
        flags: decode_flags(eflags),
        gs: segment(ContextRegister::Gs),
        fs: segment(ContextRegister::Fs),
        es: segment(ContextRegister::Es),
        ds: segment(ContextRegister::Ds),
        cs: segment(ContextRegister::Cs),
        ss: segment(ContextRegister::Ss),
        dr0: reg(ContextRegister::Dr0),
        dr1: reg(ContextRegister::Dr1),
        dr2: reg(ContextRegister::Dr2),
        dr3: reg(ContextRegister::Dr3),
        dr6: reg(ContextRegister::Dr6),
        dr7: reg(ContextRegister::Dr7),
    }
}
