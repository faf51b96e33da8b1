//! Architecture-normalised register snapshot.

/// Condition flags decoded from the flags register.
///
/// Each field is one named bit of `EFLAGS`/`RFLAGS`, decoded by
/// [`crate::registers::flag_from_name`] so consumers never deal with bit
/// positions themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagBits
{
    /// Carry flag (`cf`)
    pub c: bool,
    /// Parity flag (`pf`)
    pub p: bool,
    /// Auxiliary carry flag (`af`)
    pub a: bool,
    /// Zero flag (`zf`)
    pub z: bool,
    /// Sign flag (`sf`)
    pub s: bool,
    /// Trap flag (`tf`)
    pub t: bool,
    /// Interrupt enable flag (`if`)
    pub i: bool,
    /// Direction flag (`df`)
    pub d: bool,
    /// Overflow flag (`of`)
    pub o: bool,
}

/// Snapshot of the debuggee's register state.
///
/// General-purpose registers are widened to `u64`. On 32-bit builds values are
/// masked to 32 bits when captured, and the extended registers `r8`-`r15` only
/// exist on 64-bit builds.
///
/// [`RegisterSnapshot::default`] is the all-zero value returned when no
/// debuggee is attached. It is a valid observable state, not an error.
///
/// ## Example
///
/// ```rust
/// use procmeta_core::types::RegisterSnapshot;
///
/// let snapshot = RegisterSnapshot::default();
/// assert!(snapshot.is_zero());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterSnapshot
{
    pub cax: u64,
    pub ccx: u64,
    pub cdx: u64,
    pub cbx: u64,
    pub csp: u64,
    pub cbp: u64,
    pub csi: u64,
    pub cdi: u64,
    #[cfg(target_pointer_width = "64")]
    pub r8: u64,
    #[cfg(target_pointer_width = "64")]
    pub r9: u64,
    #[cfg(target_pointer_width = "64")]
    pub r10: u64,
    #[cfg(target_pointer_width = "64")]
    pub r11: u64,
    #[cfg(target_pointer_width = "64")]
    pub r12: u64,
    #[cfg(target_pointer_width = "64")]
    pub r13: u64,
    #[cfg(target_pointer_width = "64")]
    pub r14: u64,
    #[cfg(target_pointer_width = "64")]
    pub r15: u64,
    /// Instruction pointer
    pub cip: u64,
    /// Raw flags word
    pub eflags: u64,
    /// Individual bits of `eflags`
    pub flags: FlagBits,
    pub gs: u16,
    pub fs: u16,
    pub es: u16,
    pub ds: u16,
    pub cs: u16,
    pub ss: u16,
    pub dr0: u64,
    pub dr1: u64,
    pub dr2: u64,
    pub dr3: u64,
    pub dr6: u64,
    pub dr7: u64,
}

impl RegisterSnapshot
{
    /// Whether every field holds its zero value.
    #[must_use]
    pub fn is_zero(&self) -> bool
    {
        *self == Self::default()
    }
}
