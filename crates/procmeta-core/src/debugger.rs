//! # Debuggee Trait
//!
//! The process backend a [`DebugSession`](crate::session::DebugSession) talks
//! to once attached.
//!
//! A backend bundles the four per-process seams the core needs. Each accessor
//! usually returns `self`, with the backend type implementing every seam
//! trait directly:
//!
//! - [`MemoryReader`]: raw memory reads
//! - [`RegionQuery`]: virtual memory layout
//! - [`BreakpointTraps`]: lifting breakpoint bytes around reads
//! - [`DebugContext`]: the current thread's registers
//!
//! Test suites implement this trait with in-memory fakes.

use crate::memory::{BreakpointTraps, MemoryReader, RegionQuery};
use crate::registers::DebugContext;

/// An attached debuggee.
pub trait Debuggee: Send + Sync
{
    fn memory(&self) -> &dyn MemoryReader;

    fn regions(&self) -> &dyn RegionQuery;

    fn traps(&self) -> &dyn BreakpointTraps;

    fn context(&self) -> &dyn DebugContext;
}
