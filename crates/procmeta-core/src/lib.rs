//! # procmeta-core
//!
//! Live-process metadata for a native debugger.
//!
//! This crate tracks what is mapped into a debuggee and turns raw addresses
//! into something a person can read:
//! - Module registry keyed by address range, with stable per-module hashes
//! - Binary header inspection (entry point, sections, exports)
//! - Address info resolution (module, label, comment) with symbol fallbacks
//! - Breakpoint classification, register snapshots and memory maps
//!
//! [`DebugSession`] ties these together and is the surface front ends call.
//!
//! ## Platform Support
//!
//! - **Linux**: `process_vm_readv` and `/proc/<pid>/maps` ([`platform::linux`])
//! - Other platforms plug in through the [`Debuggee`] trait
//!
//! ## Why unsafe code is needed
//!
//! Two operations cross the safe boundary: mapping module files read-only
//! (`memmap2`) and reading another process's memory (`process_vm_readv`).
//! Both are wrapped in safe functions next to the call.

#![allow(unsafe_code)] // Required for file mapping and process_vm_readv

pub mod addrinfo;
pub mod annotations;
pub mod breakpoints;
pub mod debugger;
pub mod error;
pub mod events;
pub mod hash;
pub mod memory;
pub mod modules;
pub mod platform;
pub mod prelude;
pub mod range_map;
pub mod registers;
pub mod session;
pub mod symbols;
pub mod types;

pub use debugger::Debuggee;
// Re-export commonly used types
pub use error::{ProcmetaError, Result};
#[cfg(target_os = "linux")]
pub use platform::linux::LinuxProcess;
pub use session::{DebugSession, SessionOptions};
pub use types::{Address, ModuleInfo};
