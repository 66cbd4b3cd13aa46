//! In-process membership source.
//!
//! `LocalGraph` tracks which participant names are currently visible inside
//! one process. Participants join with [`LocalGraph::join`] and stay visible
//! until the returned [`Participant`] is dropped. The graph implements
//! [`DiscoveryTransport`], so wait sessions can poll it directly; it is what
//! the demo harness and the test suites run against.

use crate::SessionIdentity;
use crate::transport::{DiscoveryHandle, DiscoveryTransport, Result, TransportError};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, Weak};
use tracing::debug;

/// Handle accounting, for checking that sessions release what they acquire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleStats {
    pub created: u64,
    pub destroyed: u64,
}

impl HandleStats {
    pub fn live(&self) -> u64 {
        self.created - self.destroyed
    }
}

#[derive(Default)]
struct GraphState {
    /// Name -> number of live registrations. Several participants may share a name.
    names: BTreeMap<String, usize>,
    handles: HandleStats,
    unavailable: Option<String>,
}

impl GraphState {
    fn add(&mut self, name: &str) {
        *self.names.entry(name.to_string()).or_default() += 1;
    }

    fn remove(&mut self, name: &str) {
        if let Some(count) = self.names.get_mut(name) {
            *count -= 1;
            if *count == 0 {
                self.names.remove(name);
            }
        }
    }
}

/// Shared, cloneable in-process participant graph.
#[derive(Clone, Default)]
pub struct LocalGraph {
    state: Arc<RwLock<GraphState>>,
}

impl LocalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `name` visible. It stays visible until the returned guard is dropped.
    pub fn join(&self, name: impl Into<String>) -> Participant {
        let name = name.into();
        self.write().add(&name);
        debug!("Participant joined: {}", name);
        Participant {
            graph: Arc::downgrade(&self.state),
            name,
        }
    }

    /// Snapshot of the visible names.
    pub fn participants(&self) -> BTreeSet<String> {
        self.read().names.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().names.contains_key(name)
    }

    pub fn handle_stats(&self) -> HandleStats {
        self.read().handles
    }

    /// Make every subsequent `create_handle` fail with `reason`, or succeed again with `None`.
    pub fn set_unavailable(&self, reason: Option<String>) {
        self.write().unavailable = reason;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, GraphState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, GraphState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// A visible participant. Leaves the graph when dropped.
pub struct Participant {
    graph: Weak<RwLock<GraphState>>,
    name: String,
}

impl Participant {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Participant {
    fn drop(&mut self) {
        if let Some(state) = self.graph.upgrade() {
            state
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&self.name);
            debug!("Participant left: {}", self.name);
        }
    }
}

/// Discovery handle onto a [`LocalGraph`]; registered as a participant itself.
pub struct LocalHandle {
    graph: LocalGraph,
    registration: Option<Participant>,
}

#[async_trait]
impl DiscoveryHandle for LocalHandle {
    async fn list_participants(&self) -> BTreeSet<String> {
        self.graph.participants()
    }

    fn destroy(&mut self) {
        if let Some(registration) = self.registration.take() {
            drop(registration);
            self.graph.write().handles.destroyed += 1;
        }
    }
}

#[async_trait]
impl DiscoveryTransport for LocalGraph {
    type Handle = LocalHandle;

    async fn create_handle(&self, identity: &SessionIdentity) -> Result<LocalHandle> {
        if let Some(reason) = self.read().unavailable.clone() {
            return Err(TransportError::Init(reason));
        }
        let registration = self.join(identity.as_str());
        self.write().handles.created += 1;
        Ok(LocalHandle {
            graph: self.clone(),
            registration: Some(registration),
        })
    }
}
