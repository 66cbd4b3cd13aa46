//! Error taxonomy for wait sessions.

use crate::config::ConfigError;
use crate::transport::TransportError;
use std::collections::BTreeSet;
use thiserror::Error;

/// Lifecycle contract violations.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("No result yet: wait() has not completed on this session")]
    NoResultYet,
    #[error("wait() called after shutdown")]
    WaitAfterShutdown,
    #[error("shutdown() called twice")]
    AlreadyShutDown,
}

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("Invalid wait configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    TransportInit(#[from] TransportError),

    /// Raised by the scoped form only; the plain API reports a timeout as `false`.
    #[error("Did not find all nodes, missing: {}", join_names(.missing))]
    Timeout { missing: BTreeSet<String> },

    #[error("Wait cancelled, still missing: {}", join_names(.missing))]
    Cancelled { missing: BTreeSet<String> },

    #[error(transparent)]
    Usage(#[from] UsageError),
}

impl WaitError {
    /// Names that were still missing, for timeout and cancellation errors.
    pub fn missing(&self) -> Option<&BTreeSet<String>> {
        match self {
            WaitError::Timeout { missing } | WaitError::Cancelled { missing } => Some(missing),
            _ => None,
        }
    }
}

fn join_names(names: &BTreeSet<String>) -> String {
    names.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}
