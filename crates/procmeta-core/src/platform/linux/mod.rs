//! # Linux Process Backend
//!
//! Observes a running process without stopping it:
//!
//! - memory is read with `process_vm_readv(2)`, which needs the same
//!   permission as `ptrace` attach (same user and a permissive
//!   `kernel.yama.ptrace_scope`, or `CAP_SYS_PTRACE`)
//! - the region layout comes from `/proc/<pid>/maps`, see [`ProcMaps`]
//!
//! The backend never stops the target, so it has no thread context:
//! [`DebugContext::is_attached`] reports `false` and register dumps are the
//! all-zero snapshot. It inserts no breakpoints, so trap lifting is a no-op.

mod maps;

use std::path::Path;

pub use maps::{MappedImage, MapsEntry, ProcMaps, PROT_EXEC, PROT_READ, PROT_WRITE};
use tracing::{debug, trace};

use crate::debugger::Debuggee;
use crate::error::{ProcmetaError, Result};
use crate::memory::{BreakpointTraps, MemoryReader, RegionQuery};
use crate::registers::{ContextRegister, DebugContext};
use crate::types::{Address, RegionInfo};

/// A live process identified by pid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinuxProcess
{
    pid: libc::pid_t,
}

impl LinuxProcess
{
    /// Open process `pid` for observation.
    ///
    /// ## Errors
    ///
    /// `NotFound` if no such process exists.
    pub fn open(pid: libc::pid_t) -> Result<Self>
    {
        if pid <= 0 || !Path::new(&format!("/proc/{pid}")).exists() {
            return Err(ProcmetaError::NotFound(format!("process {pid}")));
        }
        Ok(Self { pid })
    }

    #[must_use]
    pub fn pid(&self) -> libc::pid_t
    {
        self.pid
    }

    /// Current memory map of the process.
    ///
    /// ## Errors
    ///
    /// See [`ProcMaps::read`].
    pub fn maps(&self) -> Result<ProcMaps>
    {
        ProcMaps::read(self.pid)
    }
}

impl MemoryReader for LinuxProcess
{
    fn read_bytes(&self, address: Address, len: usize) -> Result<Vec<u8>>
    {
        let failed = || ProcmetaError::MemoryRead { address, len };
        let remote_base = usize::try_from(address.value()).map_err(|_| failed())?;

        let mut buffer = vec![0u8; len];
        let local = libc::iovec {
            iov_base: buffer.as_mut_ptr().cast(),
            iov_len: len,
        };
        let remote = libc::iovec {
            iov_base: remote_base as *mut libc::c_void,
            iov_len: len,
        };

        // SAFETY: `local` describes `buffer`, which is valid for `len` bytes
        // of writes and outlives the call. `remote` is only interpreted in the
        // target's address space by the kernel.
        let read = unsafe { libc::process_vm_readv(self.pid, &local, 1, &remote, 1, 0) };

        match usize::try_from(read) {
            Ok(read) if read == len => Ok(buffer),
            Ok(read) => {
                trace!(%address, len, read, "partial process_vm_readv");
                Err(failed())
            }
            Err(_) => {
                trace!(%address, len, err = %std::io::Error::last_os_error(), "process_vm_readv failed");
                Err(failed())
            }
        }
    }
}

impl RegionQuery for LinuxProcess
{
    fn query(&self, address: Address) -> Option<RegionInfo>
    {
        self.maps().ok()?.query(address)
    }

    fn snapshot(&self) -> Option<Box<dyn RegionQuery + '_>>
    {
        match self.maps() {
            Ok(maps) => Some(Box::new(maps)),
            Err(err) => {
                debug!(pid = self.pid, %err, "cannot snapshot memory map");
                None
            }
        }
    }
}

impl BreakpointTraps for LinuxProcess
{
    fn disable_traps(&self) {}

    fn enable_traps(&self) {}
}

impl DebugContext for LinuxProcess
{
    fn is_attached(&self) -> bool
    {
        false
    }

    fn context_value(&self, _register: ContextRegister) -> u64
    {
        0
    }
}

impl Debuggee for LinuxProcess
{
    fn memory(&self) -> &dyn MemoryReader
    {
        self
    }

    fn regions(&self) -> &dyn RegionQuery
    {
        self
    }

    fn traps(&self) -> &dyn BreakpointTraps
    {
        self
    }

    fn context(&self) -> &dyn DebugContext
    {
        self
    }
}
