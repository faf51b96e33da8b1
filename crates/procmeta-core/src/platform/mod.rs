//! # Platform-Specific Implementations
//!
//! Process backends implementing [`Debuggee`](crate::debugger::Debuggee)
//! with a platform's native APIs:
//!
//! - **Linux**: `process_vm_readv` for memory and `/proc/<pid>/maps` for the
//!   region layout
//!   - See: [process_vm_readv(2) man page](https://man7.org/linux/man-pages/man2/process_vm_readv.2.html)
//!   - See: [proc_pid_maps(5) man page](https://man7.org/linux/man-pages/man5/proc_pid_maps.5.html)
//!
//! Backends only observe the target; stopping, stepping and patching it
//! belong to the debugger engine driving the session.

#[cfg(target_os = "linux")]
pub mod linux;
