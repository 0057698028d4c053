//! Closable slot holding a backend's transport handle

use std::sync::Arc;

use parking_lot::RwLock;

use chartfleet_common::{Error, Result};

use crate::BackendKind;

pub(crate) struct Handle<A> {
    kind: BackendKind,
    slot: RwLock<Option<Arc<A>>>,
}

impl<A> Handle<A> {
    pub(crate) fn new(kind: BackendKind, api: A) -> Self {
        Self {
            kind,
            slot: RwLock::new(Some(Arc::new(api))),
        }
    }

    /// The live handle, or [`Error::Closed`] once closed
    pub(crate) fn get(&self) -> Result<Arc<A>> {
        self.slot
            .read()
            .clone()
            .ok_or_else(|| Error::closed(self.kind.to_string()))
    }

    /// Returns whether this call did the closing
    pub(crate) fn close(&self) -> bool {
        self.slot.write().take().is_some()
    }
}
