//! Shared helpers for wait-core integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wait_core::transport::Result;
use wait_core::{DiscoveryHandle, DiscoveryTransport, SessionIdentity, TransportError};

pub fn names(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Counters shared between a [`ScriptedTransport`] and the handles it creates.
#[derive(Debug, Default)]
pub struct Calls {
    pub created: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub polls: AtomicUsize,
}

impl Calls {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

/// Transport whose handles replay a fixed sequence of snapshots, one per poll.
/// The last snapshot repeats forever. Handles never report their own identity.
pub struct ScriptedTransport {
    script: Vec<BTreeSet<String>>,
    fail_init: Option<String>,
    pub calls: Arc<Calls>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<BTreeSet<String>>) -> Self {
        Self {
            script,
            fail_init: None,
            calls: Arc::default(),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            script: Vec::new(),
            fail_init: Some(reason.to_string()),
            calls: Arc::default(),
        }
    }
}

pub struct ScriptedHandle {
    script: Vec<BTreeSet<String>>,
    cursor: Mutex<usize>,
    calls: Arc<Calls>,
}

#[async_trait]
impl DiscoveryHandle for ScriptedHandle {
    async fn list_participants(&self) -> BTreeSet<String> {
        self.calls.polls.fetch_add(1, Ordering::SeqCst);
        let mut cursor = self.cursor.lock().unwrap();
        let snapshot = self
            .script
            .get(*cursor)
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or_default();
        *cursor += 1;
        snapshot
    }

    fn destroy(&mut self) {
        self.calls.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DiscoveryTransport for ScriptedTransport {
    type Handle = ScriptedHandle;

    async fn create_handle(&self, _identity: &SessionIdentity) -> Result<ScriptedHandle> {
        if let Some(reason) = &self.fail_init {
            return Err(TransportError::Init(reason.clone()));
        }
        self.calls.created.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedHandle {
            script: self.script.clone(),
            cursor: Mutex::new(0),
            calls: self.calls.clone(),
        })
    }
}
