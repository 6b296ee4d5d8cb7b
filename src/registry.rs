//! Handle registry.
//!
//! Explicit arena for the live negotiation handles of one session. Entries
//! are inserted when the gateway announces a party and removed when that
//! party leaves or the session tears down; lookups of absent handles return
//! [`SessionError::HandleNotFound`] rather than a nullable reference.
//!
//! The coordinator's event loop is the only mutator. Storage is a `DashMap`
//! so read-only inspection (handle listings, state snapshots) stays available
//! outside the loop without locking the loop out.

use dashmap::DashMap;

use crate::errors::{Result, SessionError};
use crate::negotiation::{NegotiationState, NegotiationStateMachine};
use crate::types::HandleId;

#[derive(Debug, Default)]
pub struct HandleRegistry {
    handles: DashMap<HandleId, NegotiationStateMachine>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self {
            handles: DashMap::new(),
        }
    }

    /// Insert a newly announced handle. Re-announcing a live handle is a
    /// gateway protocol violation.
    pub fn insert(&self, machine: NegotiationStateMachine) -> Result<()> {
        let handle = machine.handle();
        if self.handles.contains_key(&handle) {
            return Err(SessionError::SignalingProtocol(format!(
                "gateway announced already-registered {}",
                handle
            )));
        }
        tracing::debug!(%handle, "registered handle");
        self.handles.insert(handle, machine);
        Ok(())
    }

    /// Run `f` against the handle's state machine.
    ///
    /// The closure is synchronous on purpose: the map guard must not be held
    /// across an await point, so callers collect commands here and dispatch
    /// them afterwards.
    pub fn with_machine_mut<F, R>(&self, handle: HandleId, f: F) -> Result<R>
    where
        F: FnOnce(&mut NegotiationStateMachine) -> Result<R>,
    {
        match self.handles.get_mut(&handle) {
            Some(mut machine) => f(machine.value_mut()),
            None => Err(SessionError::HandleNotFound(handle)),
        }
    }

    pub fn remove(&self, handle: HandleId) -> Option<NegotiationStateMachine> {
        let removed = self.handles.remove(&handle).map(|(_, machine)| machine);
        if removed.is_some() {
            tracing::debug!(%handle, "unregistered handle");
        }
        removed
    }

    pub fn contains(&self, handle: HandleId) -> bool {
        self.handles.contains_key(&handle)
    }

    pub fn handles(&self) -> Vec<HandleId> {
        self.handles.iter().map(|entry| *entry.key()).collect()
    }

    /// Snapshot of one handle's negotiation state.
    pub fn state_of(&self, handle: HandleId) -> Option<NegotiationState> {
        self.handles
            .get(&handle)
            .map(|machine| machine.state().clone())
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Remove and return every handle, for session teardown.
    pub fn drain(&self) -> Vec<HandleId> {
        let handles = self.handles();
        for handle in &handles {
            self.handles.remove(handle);
        }
        handles
    }
}
