//! wait-core: bounded wait for a set of participants to become discoverable.
//!
//! This crate provides:
//! - `WaitSession`: poll a membership source until every expected name is
//!   visible or a timeout elapses, then report found / missing names
//! - `with_nodes`: scoped form that fails loudly on timeout and always
//!   releases the discovery handle
//! - `DiscoveryTransport` / `DiscoveryHandle` trait abstractions over the
//!   membership source, and `LocalGraph`, an in-process implementation

pub mod config;
pub mod error;
pub mod identity;
pub mod local;
pub mod scoped;
pub mod session;
pub mod transport;

pub use config::{ConfigError, WaitConfig};
pub use error::{UsageError, WaitError};
pub use identity::{IdentityError, SessionIdentity};
pub use local::{HandleStats, LocalGraph, LocalHandle, Participant};
pub use scoped::{with_nodes, with_nodes_cancellable};
pub use session::{WaitOutcome, WaitSession};
pub use transport::{DiscoveryHandle, DiscoveryTransport, TransportError};
