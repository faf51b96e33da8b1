//! # Error Types
//!
//! Errors raised by the components of the metadata core.
//!
//! We use `thiserror` to derive `Error` implementations and messages.
//!
//! Component APIs return [`Result`]. The export boundary
//! ([`DebugSession`](crate::session::DebugSession)) absorbs every error, logs
//! it and reports the boolean or sentinel value its callers expect, so these
//! values never reach the front end as faults.

use thiserror::Error;

use crate::types::Address;

/// Main error type for metadata core operations
///
/// ## Error Categories
///
/// 1. **Lookup errors**: NotFound
/// 2. **Input errors**: InvalidArgument, Overlap
/// 3. **Source errors**: NotAttached, Header, MemoryRead
/// 4. **I/O errors**: Io
#[derive(Error, Debug)]
pub enum ProcmetaError
{
    /// The address or name has no mapping
    #[error("Not found: {0}")]
    NotFound(String),

    /// Null, zero or oversized input, rejected before any state changes
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An insert would overlap an extent that is already registered
    ///
    /// The existing extent has to be removed explicitly before a new one can
    /// take its place.
    #[error("Range {start}..={end} overlaps an existing entry")]
    Overlap
    {
        /// First address of the rejected range
        start: u64,
        /// Last address of the rejected range (inclusive)
        end: u64,
    },

    /// Operation requires an attached debuggee
    #[error("Not attached to a process")]
    NotAttached,

    /// The binary header of an image could not be parsed
    #[error("Failed to read image header: {0}")]
    Header(String),

    /// Debuggee memory could not be read
    #[error("Failed to read {len} bytes at {address}")]
    MemoryRead
    {
        /// Start of the failed read
        address: Address,
        /// Requested length
        len: usize,
    },

    /// I/O error (mapping module files, reading `/proc`, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcmetaError
{
    /// Whether this error is an expected "nothing there" outcome rather than a failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool
    {
        matches!(self, Self::NotFound(_))
    }
}

/// Convenience type alias for `Result<T, ProcmetaError>`
///
/// ```rust
/// use procmeta_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, ProcmetaError>;
