//! # Debug Session
//!
//! The coordinator that ties the registry, annotations, symbols, breakpoints
//! and the attached [`Debuggee`] together, and the boundary front ends call.
//!
//! ## Boundary contract
//!
//! Every method here reports the plain value a front end expects: `bool` for
//! success, an empty collection, a zero address or an all-zero snapshot for
//! "nothing there". Component errors are logged with `tracing` and absorbed;
//! none of them escape as a panic. [`DebugSession::read_memory`] is the one
//! `Result`-returning call, for Rust callers that want the reason.
//!
//! ## Module load
//!
//! Loading is two explicit steps. The registry records the module, then the
//! session applies the side effects:
//!
//! 1. For a virtual module (and with [`SessionOptions::label_virtual_modules`]),
//!    an `EntryPoint` label at the entry point if it lies inside the image,
//!    and one label per export. These labels carry [`Origin::Auto`].
//! 2. The symbol provider receives the new module list.
//! 3. Subscribers receive [`ModuleEvent::ModuleListUpdated`].
//!
//! ## Example
//!
//! ```rust
//! use procmeta_core::addrinfo::{AddressInfo, InfoFlags};
//! use procmeta_core::session::{DebugSession, SessionOptions};
//! use procmeta_core::types::Address;
//!
//! let session = DebugSession::new(SessionOptions {
//!     load_debug_symbols: false,
//!     ..SessionOptions::default()
//! });
//! assert!(session.on_module_load(Address::from(0x40_0000), 0x1000, "C:\\app\\Game.exe"));
//!
//! let mut info = AddressInfo::request(InfoFlags::MODULE);
//! assert!(session.address_info_get(Address::from(0x40_0123), &mut info));
//! assert_eq!(info.module.as_str(), "game.exe");
//! ```

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::addrinfo::{AddressInfo, AddressInfoResolver};
use crate::annotations::{AnnotationKind, AnnotationStore, Annotations, Origin};
use crate::breakpoints::{classify, BreakpointKindMask, BreakpointStore};
use crate::debugger::Debuggee;
use crate::error::{ProcmetaError, Result};
use crate::events::{event_channel, ModuleEvent, ModuleEventReceiver, ModuleEventSender};
use crate::memory::{self, GuardedReader, NoMemory};
use crate::modules::{LoadedModule, ModuleRegistry};
use crate::registers;
use crate::symbols::{DwarfSymbols, NoSymbols, SymbolProvider};
use crate::types::{Address, MemoryMap, ModuleInfo, RegisterSnapshot};

/// Label placed at the entry point of virtual modules.
pub const ENTRY_POINT_LABEL: &str = "EntryPoint";

/// Library-side session configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions
{
    /// Label the entry point and exports of modules injected into memory.
    pub label_virtual_modules: bool,
    /// Parse symbol tables and DWARF of disk-backed modules.
    pub load_debug_symbols: bool,
}

impl Default for SessionOptions
{
    fn default() -> Self
    {
        Self {
            label_virtual_modules: true,
            load_debug_symbols: true,
        }
    }
}

/// Live-process metadata for one debugging session.
pub struct DebugSession
{
    options: SessionOptions,
    modules: Arc<ModuleRegistry>,
    annotations: Annotations,
    symbols: Arc<dyn SymbolProvider>,
    breakpoints: RwLock<BreakpointStore>,
    debuggee: RwLock<Option<Arc<dyn Debuggee>>>,
    subscribers: Mutex<Vec<ModuleEventSender>>,
}

impl DebugSession
{
    /// Create a detached session.
    ///
    /// The symbol provider is [`DwarfSymbols`] or [`NoSymbols`] depending on
    /// [`SessionOptions::load_debug_symbols`].
    #[must_use]
    pub fn new(options: SessionOptions) -> Self
    {
        let symbols: Arc<dyn SymbolProvider> = if options.load_debug_symbols {
            Arc::new(DwarfSymbols::new())
        } else {
            Arc::new(NoSymbols)
        };
        Self::with_symbols(options, symbols)
    }

    /// Create a detached session with a caller-supplied symbol provider.
    #[must_use]
    pub fn with_symbols(options: SessionOptions, symbols: Arc<dyn SymbolProvider>) -> Self
    {
        let modules = Arc::new(ModuleRegistry::new());
        Self {
            options,
            annotations: Annotations::new(Arc::clone(&modules)),
            modules,
            symbols,
            breakpoints: RwLock::new(BreakpointStore::new()),
            debuggee: RwLock::new(None),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn options(&self) -> SessionOptions
    {
        self.options
    }

    /// The module registry, for direct queries.
    #[must_use]
    pub fn modules(&self) -> &ModuleRegistry
    {
        &self.modules
    }

    #[must_use]
    pub fn annotations(&self) -> &Annotations
    {
        &self.annotations
    }

    /// Breakpoint bookkeeping consulted by [`breakpoint_type_at`](Self::breakpoint_type_at).
    #[must_use]
    pub fn breakpoints(&self) -> &RwLock<BreakpointStore>
    {
        &self.breakpoints
    }

    /// Receive a [`ModuleEvent`] for every module list change from now on.
    pub fn subscribe(&self) -> ModuleEventReceiver
    {
        let (sender, receiver) = event_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        receiver
    }

    /// Start using `debuggee` as the process backend.
    pub fn attach(&self, debuggee: Arc<dyn Debuggee>)
    {
        *self.debuggee.write().unwrap_or_else(PoisonError::into_inner) = Some(debuggee);
        debug!("debuggee attached");
    }

    /// Stop using the current process backend. Module state is kept until
    /// [`on_process_exit`](Self::on_process_exit).
    pub fn detach(&self)
    {
        *self.debuggee.write().unwrap_or_else(PoisonError::into_inner) = None;
        debug!("debuggee detached");
    }

    fn debuggee(&self) -> Option<Arc<dyn Debuggee>>
    {
        self.debuggee.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Whether a debuggee is attached.
    #[must_use]
    pub fn is_debugging(&self) -> bool
    {
        self.debuggee.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    fn publish_module_list(&self, modules: &[ModuleInfo])
    {
        self.symbols.update_module_list(modules);

        let event = ModuleEvent::ModuleListUpdated(modules.iter().map(ModuleInfo::summary).collect());
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        // Dropped receivers unsubscribe
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
    }

    /// Module load notification from the debug event loop.
    pub fn on_module_load(&self, base: Address, size: u64, full_path: &str) -> bool
    {
        let debuggee = self.debuggee();
        let loaded = match &debuggee {
            Some(debuggee) => {
                let reader = GuardedReader::new(debuggee.memory(), debuggee.traps());
                self.modules.load(base, size, full_path, &reader)
            }
            None => self.modules.load(base, size, full_path, &NoMemory),
        };

        let loaded = match loaded {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!(%base, size, path = full_path, %err, "module load rejected");
                return false;
            }
        };

        if loaded.info.is_virtual && self.options.label_virtual_modules {
            self.label_virtual_module(&loaded);
        }
        self.publish_module_list(&self.modules.list());
        true
    }

    fn label_virtual_module(&self, loaded: &LoadedModule)
    {
        let info = &loaded.info;
        if !info.entry.is_null() && info.contains(info.entry) {
            self.set_auto_label(info.entry, ENTRY_POINT_LABEL);
        }
        for export in &loaded.exports {
            self.set_auto_label(export.address, &export.name);
        }
        debug!(module = %info.file_name(), exports = loaded.exports.len(), "virtual module labelled");
    }

    fn set_auto_label(&self, address: Address, text: &str)
    {
        if let Err(err) = self.annotations.set(AnnotationKind::Label, address, text, Origin::Auto) {
            warn!(%address, text, %err, "automatic label rejected");
        }
    }

    /// Module unload notification. `false` if no module contains `base`.
    pub fn on_module_unload(&self, base: Address) -> bool
    {
        match self.modules.unload(base) {
            Ok(_) => {
                self.publish_module_list(&self.modules.list());
                true
            }
            Err(err) => {
                debug!(%base, %err, "module unload ignored");
                false
            }
        }
    }

    /// Process exit or restart: drop every module and automatic label, and
    /// publish the empty module list.
    pub fn on_process_exit(&self)
    {
        let modules = self.modules.clear();
        let labels = self.annotations.clear_auto();
        debug!(modules, labels, "session state cleared");
        self.publish_module_list(&[]);
    }

    /// Resolve the facets requested in `info.flags`. See
    /// [`AddressInfoResolver::get`].
    pub fn address_info_get(&self, address: Address, info: &mut AddressInfo) -> bool
    {
        AddressInfoResolver::new(&self.modules, &self.annotations, self.symbols.as_ref()).get(address, info)
    }

    /// Store the label, or else the comment, carried by `info`.
    pub fn address_info_set(&self, address: Address, info: &AddressInfo) -> bool
    {
        match AddressInfoResolver::new(&self.modules, &self.annotations, self.symbols.as_ref()).set(address, info) {
            Ok(()) => true,
            Err(err) => {
                warn!(%address, %err, "address info not stored");
                false
            }
        }
    }

    /// Kinds of enabled breakpoints at exactly `address`.
    #[must_use]
    pub fn breakpoint_type_at(&self, address: Address) -> BreakpointKindMask
    {
        classify(&self.breakpoints, address)
    }

    /// Registers of the current thread; all zero when not attached.
    #[must_use]
    pub fn register_dump(&self) -> RegisterSnapshot
    {
        self.debuggee()
            .map(|debuggee| registers::capture(debuggee.context()))
            .unwrap_or_default()
    }

    /// Committed regions of the debuggee; empty when not attached.
    #[must_use]
    pub fn memory_map(&self) -> MemoryMap
    {
        self.debuggee()
            .map(|debuggee| memory::build_memory_map(debuggee.regions(), &self.modules))
            .unwrap_or_default()
    }

    /// Read `len` bytes of debuggee memory at `address` with breakpoint bytes
    /// lifted. May return fewer bytes than asked for.
    ///
    /// ## Errors
    ///
    /// - `NotAttached`: no debuggee is attached
    /// - `InvalidArgument`: `len` is zero
    /// - whatever the debuggee's reader reports for an unreadable span
    pub fn read_memory(&self, address: Address, len: usize) -> Result<Vec<u8>>
    {
        let debuggee = self.debuggee().ok_or(ProcmetaError::NotAttached)?;
        memory::read_guarded(debuggee.memory(), debuggee.traps(), address, len)
    }

    /// Fill `buffer` from debuggee memory at `address`, without breakpoint bytes.
    pub fn mem_read(&self, address: Address, buffer: &mut [u8]) -> bool
    {
        match self.read_memory(address, buffer.len()) {
            Ok(bytes) if bytes.len() == buffer.len() => {
                buffer.copy_from_slice(&bytes);
                true
            }
            Ok(bytes) => {
                warn!(%address, wanted = buffer.len(), got = bytes.len(), "short memory read");
                false
            }
            Err(ProcmetaError::NotAttached) => false,
            Err(err) => {
                debug!(%address, len = buffer.len(), %err, "memory read failed");
                false
            }
        }
    }

    /// Base and size of the allocation containing `address`; `(0, 0)` if none.
    #[must_use]
    pub fn mem_find_base(&self, address: Address) -> (Address, u64)
    {
        self.debuggee()
            .and_then(|debuggee| memory::find_base(debuggee.regions(), address))
            .unwrap_or((Address::ZERO, 0))
    }

    /// Whether one byte at `address` is readable.
    #[must_use]
    pub fn mem_is_valid_read_ptr(&self, address: Address) -> bool
    {
        self.debuggee()
            .is_some_and(|debuggee| memory::is_valid_read_ptr(debuggee.memory(), address))
    }
}
