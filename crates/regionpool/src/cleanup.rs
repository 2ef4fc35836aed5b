//! Caller-registered teardown actions.
//!
//! Registration is two-phase: [`Pool::register_cleanup`](crate::Pool::register_cleanup)
//! reserves an entry (and optionally a payload buffer) and guarantees it is
//! visited at teardown; the handler and any external context are attached
//! afterwards. Entries run newest-first, exactly once, and only at teardown.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::handle::{AllocHandle, CleanupHandle};

/// Action run at teardown with the entry's context.
pub type CleanupHandler = Box<dyn FnOnce(CleanupData<'_>)>;

/// What a cleanup entry carries for its handler.
pub enum CleanupContext {
    /// Nothing attached.
    None,
    /// A payload buffer allocated from the pool at registration.
    Payload(AllocHandle),
    /// A resource owned by the caller, handed back to the handler at teardown.
    External(Box<dyn Any>),
}

impl fmt::Debug for CleanupContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Payload(handle) => write!(f, "Payload({handle})"),
            Self::External(_) => write!(f, "External(..)"),
        }
    }
}

/// The context as seen by a running handler.
pub enum CleanupData<'a> {
    /// Nothing attached, or the payload no longer resolves.
    None,
    /// The payload bytes, still owned by the pool.
    Payload(&'a mut [u8]),
    /// The external resource, now owned by the handler.
    External(Box<dyn Any>),
}

impl CleanupData<'_> {
    /// Take the external resource if it has type `T`.
    pub fn into_external<T: Any>(self) -> Option<Box<T>> {
        match self {
            Self::External(value) => value.downcast::<T>().ok(),
            _ => None,
        }
    }

    /// The payload bytes, if any.
    pub fn payload(&mut self) -> Option<&mut [u8]> {
        match self {
            Self::Payload(bytes) => Some(&mut **bytes),
            _ => None,
        }
    }
}

/// How a single entry fared at teardown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CleanupOutcome {
    Ran,
    Panicked,
    Unset,
}

pub(crate) struct CleanupEntry {
    handler: Option<CleanupHandler>,
    pub(crate) context: CleanupContext,
}

impl CleanupEntry {
    /// Run the handler, containing any panic it raises.
    pub(crate) fn invoke(
        handler: Option<CleanupHandler>,
        data: CleanupData<'_>,
    ) -> CleanupOutcome {
        let Some(handler) = handler else {
            return CleanupOutcome::Unset;
        };
        match catch_unwind(AssertUnwindSafe(move || handler(data))) {
            Ok(()) => CleanupOutcome::Ran,
            Err(_) => CleanupOutcome::Panicked,
        }
    }

    pub(crate) fn into_parts(self) -> (Option<CleanupHandler>, CleanupContext) {
        (self.handler, self.context)
    }
}

/// Registered entries in registration order.
pub(crate) struct CleanupChain {
    entries: Vec<CleanupEntry>,
}

impl CleanupChain {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn register(&mut self, pool_id: u64, context: CleanupContext) -> CleanupHandle {
        self.entries.push(CleanupEntry {
            handler: None,
            context,
        });
        CleanupHandle {
            pool_id,
            index: self.entries.len() - 1,
        }
    }

    pub(crate) fn get_mut(&mut self, handle: CleanupHandle) -> Option<&mut CleanupEntry> {
        self.entries.get_mut(handle.index)
    }

    pub(crate) fn set_handler(&mut self, handle: CleanupHandle, handler: CleanupHandler) -> bool {
        match self.get_mut(handle) {
            Some(entry) => {
                entry.handler = Some(handler);
                true
            }
            None => false,
        }
    }

    /// Remove every entry, newest first.
    pub(crate) fn drain_newest_first(&mut self) -> impl Iterator<Item = CleanupEntry> {
        std::mem::take(&mut self.entries).into_iter().rev()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
