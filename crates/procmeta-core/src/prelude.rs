//! Common module for library exports

pub use crate::addrinfo::{AddressInfo, InfoFlags};
pub use crate::annotations::{AnnotationKind, AnnotationStore, Origin};
pub use crate::breakpoints::{BreakpointKind, BreakpointKindMask};
pub use crate::debugger::Debuggee;
pub use crate::error::{ProcmetaError, Result};
pub use crate::memory::{BreakpointTraps, MemoryReader, RegionQuery};
pub use crate::modules::ModuleRegistry;
pub use crate::registers::{ContextRegister, DebugContext};
pub use crate::session::{DebugSession, SessionOptions};
pub use crate::symbols::SymbolProvider;
pub use crate::types::{Address, MemoryMap, ModuleInfo, RegisterSnapshot};
