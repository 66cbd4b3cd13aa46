//! Delayed launch of demo participants into a `LocalGraph`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wait_core::LocalGraph;

/// A participant to launch: its name and how long after launch it becomes visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSpec {
    pub name: String,
    /// Delay before the participant joins (default: immediately)
    #[serde(default)]
    pub delay_ms: u64,
}

impl ParticipantSpec {
    pub fn new(name: impl Into<String>, delay_ms: u64) -> Self {
        Self {
            name: name.into(),
            delay_ms,
        }
    }
}

impl fmt::Display for ParticipantSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.delay_ms)
    }
}

/// Parses `name` or `name@delay_ms`.
impl FromStr for ParticipantSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, delay_ms) = match s.rsplit_once('@') {
            Some((name, delay)) => {
                let delay_ms = delay
                    .parse()
                    .map_err(|_| format!("invalid delay in {:?}: expected milliseconds", s))?;
                (name, delay_ms)
            }
            None => (s, 0),
        };
        if name.is_empty() {
            return Err(format!("empty participant name in {:?}", s));
        }
        Ok(Self::new(name, delay_ms))
    }
}

/// Running participants. Each stays visible until [`Launched::stop`].
pub struct Launched {
    stop: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Launched {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Remove every participant from the graph and wait for the tasks to finish.
    pub async fn stop(mut self) {
        self.stop.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!("Participant task failed: {}", e);
            }
        }
        debug!("All participants stopped");
    }
}

impl Drop for Launched {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// Spawn one task per participant. Must be called within a tokio runtime.
pub fn launch(graph: &LocalGraph, participants: &[ParticipantSpec]) -> Launched {
    let stop = CancellationToken::new();
    let tasks = participants
        .iter()
        .cloned()
        .map(|spec| {
            let graph = graph.clone();
            let stop = stop.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = stop.cancelled() => return,
                    _ = tokio::time::sleep(Duration::from_millis(spec.delay_ms)) => {}
                }
                let participant = graph.join(spec.name.as_str());
                info!("Launched {}", spec.name);
                stop.cancelled().await;
                drop(participant);
            })
        })
        .collect();

    Launched { stop, tasks }
}
