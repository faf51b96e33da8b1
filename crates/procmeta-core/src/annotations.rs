//! # Labels and comments
//!
//! User and automatic annotations attached to addresses.
//!
//! [`Annotations`] keys every entry by
//! [`ModuleRegistry::hash_from_address`], so an annotation inside a module is
//! found again after the module is reloaded at a different base. Addresses
//! outside every module are keyed by their raw value.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::trace;

use crate::error::{ProcmetaError, Result};
use crate::modules::ModuleRegistry;
use crate::types::{Address, BoundedString, MAX_COMMENT_SIZE, MAX_LABEL_SIZE};

/// What an annotation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationKind
{
    Label,
    Comment,
}

impl AnnotationKind
{
    /// Longest text accepted for this kind, in bytes.
    #[must_use]
    pub const fn max_len(self) -> usize
    {
        match self {
            Self::Label => BoundedString::<MAX_LABEL_SIZE>::MAX_LEN,
            Self::Comment => BoundedString::<MAX_COMMENT_SIZE>::MAX_LEN,
        }
    }
}

/// Who created an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin
{
    /// Entered by the user.
    User,
    /// Derived by the debugger, e.g. from a module's export table.
    Auto,
}

/// A stored annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation
{
    pub text: String,
    pub origin: Origin,
    /// Address the annotation was set at, for display.
    pub address: Address,
}

/// Label and comment storage.
pub trait AnnotationStore: Send + Sync
{
    /// Exact-address lookup.
    fn get(&self, kind: AnnotationKind, address: Address) -> Option<Annotation>;

    /// Store `text` at `address`. Empty text removes the annotation.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if `text` is longer than [`AnnotationKind::max_len`].
    fn set(&self, kind: AnnotationKind, address: Address, text: &str, origin: Origin) -> Result<()>;

    /// Remove the annotation at `address`, returning it.
    fn delete(&self, kind: AnnotationKind, address: Address) -> Option<Annotation>;
}

/// In-memory [`AnnotationStore`] with load-address independent keys.
#[derive(Debug)]
pub struct Annotations
{
    modules: Arc<ModuleRegistry>,
    entries: RwLock<HashMap<(AnnotationKind, u64), Annotation>>,
}

impl Annotations
{
    #[must_use]
    pub fn new(modules: Arc<ModuleRegistry>) -> Self
    {
        Self {
            modules,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn key(&self, kind: AnnotationKind, address: Address) -> (AnnotationKind, u64)
    {
        (kind, self.modules.hash_from_address(address))
    }

    /// Remove every automatic annotation, keeping user entries.
    pub fn clear_auto(&self) -> usize
    {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, annotation| annotation.origin == Origin::User);
        before - entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize
    {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.len() == 0
    }
}

impl AnnotationStore for Annotations
{
    fn get(&self, kind: AnnotationKind, address: Address) -> Option<Annotation>
    {
        let key = self.key(kind, address);
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    fn set(&self, kind: AnnotationKind, address: Address, text: &str, origin: Origin) -> Result<()>
    {
        if text.len() > kind.max_len() {
            return Err(ProcmetaError::InvalidArgument(format!(
                "{kind:?} of {} bytes exceeds {} bytes",
                text.len(),
                kind.max_len()
            )));
        }
        if text.is_empty() {
            self.delete(kind, address);
            return Ok(());
        }

        let key = self.key(kind, address);
        trace!(?kind, %address, ?origin, text, "annotation set");
        self.entries.write().unwrap_or_else(PoisonError::into_inner).insert(
            key,
            Annotation {
                text: text.to_owned(),
                origin,
                address,
            },
        );
        Ok(())
    }

    fn delete(&self, kind: AnnotationKind, address: Address) -> Option<Annotation>
    {
        let key = self.key(kind, address);
        self.entries.write().unwrap_or_else(PoisonError::into_inner).remove(&key)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::memory::NoMemory;

    #[test]
    fn test_label_follows_module_across_reload()
    {
        let modules = Arc::new(ModuleRegistry::new());
        let store = Annotations::new(Arc::clone(&modules));

        modules.load(Address::from(0x10000), 0x1000, "/opt/app/libfoo.so", &NoMemory).unwrap();
        store
            .set(AnnotationKind::Label, Address::from(0x10010), "start", Origin::User)
            .unwrap();

        modules.unload(Address::from(0x10000)).unwrap();
        modules.load(Address::from(0x50000), 0x1000, "/opt/app/libfoo.so", &NoMemory).unwrap();

        let label = store.get(AnnotationKind::Label, Address::from(0x50010)).unwrap();
        assert_eq!(label.text, "start");
    }

    #[test]
    fn test_empty_text_deletes_and_oversized_is_rejected()
    {
        let store = Annotations::new(Arc::new(ModuleRegistry::new()));
        let at = Address::from(0x1234);
        store.set(AnnotationKind::Comment, at, "note", Origin::User).unwrap();
        store.set(AnnotationKind::Comment, at, "", Origin::User).unwrap();
        assert!(store.get(AnnotationKind::Comment, at).is_none());

        let long = "x".repeat(AnnotationKind::Label.max_len() + 1);
        let err = store.set(AnnotationKind::Label, at, &long, Origin::User).unwrap_err();
        assert!(matches!(err, ProcmetaError::InvalidArgument(_)));
    }

    #[test]
    fn test_clear_auto_keeps_user_entries()
    {
        let store = Annotations::new(Arc::new(ModuleRegistry::new()));
        store.set(AnnotationKind::Label, Address::from(1), "mine", Origin::User).unwrap();
        store.set(AnnotationKind::Label, Address::from(2), "export", Origin::Auto).unwrap();
        assert_eq!(store.clear_auto(), 1);
        assert_eq!(store.len(), 1);
    }
}
