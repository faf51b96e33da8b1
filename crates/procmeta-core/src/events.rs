//! Module list events.
//!
//! Front ends (CLI, UI) consume these events to refresh their module views
//! without polling the registry. The session publishes one whenever the set
//! of loaded modules changes.

use std::sync::mpsc;

use crate::types::ModuleSummary;

/// Event emitted by a [`DebugSession`](crate::session::DebugSession).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleEvent
{
    /// The complete module list after a change. Empty after a clear.
    ModuleListUpdated(Vec<ModuleSummary>),
}

impl ModuleEvent
{
    /// Human-readable description of the event.
    #[must_use]
    pub fn describe(&self) -> String
    {
        match self {
            Self::ModuleListUpdated(modules) if modules.is_empty() => "Module list cleared".to_string(),
            Self::ModuleListUpdated(modules) => format!("{} modules loaded", modules.len()),
        }
    }
}

/// Sender side of the module event channel.
pub type ModuleEventSender = mpsc::Sender<ModuleEvent>;
/// Receiver side of the module event channel.
pub type ModuleEventReceiver = mpsc::Receiver<ModuleEvent>;

/// Create a new module event channel.
#[must_use]
pub fn event_channel() -> (ModuleEventSender, ModuleEventReceiver)
{
    mpsc::channel()
}
