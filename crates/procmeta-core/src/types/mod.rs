//! # Types
//!
//! Plain data shared by every component: addresses, bounded text fields,
//! module records, register snapshots and memory regions.

pub mod address;
pub mod bounded;
pub mod memory;
pub mod module;
pub mod registers;

pub use address::Address;
pub use bounded::{BoundedString, MAX_COMMENT_SIZE, MAX_LABEL_SIZE, MAX_MODULE_SIZE, MAX_SECTION_SIZE};
pub use memory::{MemoryMap, MemoryPage, MemoryState, RegionInfo, RegionKind};
pub use module::{ModuleInfo, ModuleSection, ModuleSummary, SectionList};
pub use registers::{FlagBits, RegisterSnapshot};
