//! Consumer-side view of the membership transport.
//!
//! The core never discovers participants itself. It asks a transport for a
//! handle registered under a unique identity, polls the handle for the names
//! currently visible, and destroys the handle when the session ends.

use crate::SessionIdentity;
use async_trait::async_trait;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport initialization failed: {0}")]
    Init(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// A live discovery connection, exclusively owned by one session.
#[async_trait]
pub trait DiscoveryHandle: Send + Sync {
    /// Names currently visible to this handle, including its own identity
    /// once the transport has registered it.
    async fn list_participants(&self) -> BTreeSet<String>;

    /// Release every resource held by the handle.
    ///
    /// Synchronous so it can run from `Drop`. Called at most once per handle.
    fn destroy(&mut self);
}

/// Factory for discovery handles.
#[async_trait]
pub trait DiscoveryTransport: Send + Sync {
    type Handle: DiscoveryHandle;

    /// Establish a discovery connection under `identity`.
    ///
    /// On error nothing may be left alive on the transport side.
    async fn create_handle(&self, identity: &SessionIdentity) -> Result<Self::Handle>;
}
