//! One launch check: wait for the expected names, collect a report, release.

use std::collections::BTreeSet;

use anyhow::Result;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::info;
use wait_core::{
    LocalGraph, WaitConfig, WaitError, WaitOutcome, WaitSession, with_nodes_cancellable,
};

/// Which session API drives the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CheckMode {
    /// wait(), inspect the result, shutdown()
    #[default]
    Plain,
    /// Scoped form: timeout is an error, release is automatic
    Scoped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub success: bool,
    pub found: BTreeSet<String>,
    pub missing: BTreeSet<String>,
}

/// Wait for `expected` on `graph`.
///
/// In plain mode a timeout yields `Ok(Report { success: false, .. })`;
/// in scoped mode it yields the `WaitError::Timeout` as an error.
/// Cancellation is an error in both modes.
pub async fn run_check(
    graph: &LocalGraph,
    expected: &[String],
    config: &WaitConfig,
    mode: CheckMode,
    cancel: &CancellationToken,
) -> Result<Report> {
    match mode {
        CheckMode::Plain => {
            let mut session = WaitSession::connect(graph, expected.iter().cloned(), config).await?;
            let outcome = session.wait_cancellable(cancel).await?;
            let report = Report {
                success: outcome.is_found(),
                found: session.nodes_found()?,
                missing: session.nodes_not_found()?,
            };
            session.shutdown()?;
            if outcome == WaitOutcome::Cancelled {
                return Err(WaitError::Cancelled {
                    missing: report.missing,
                }
                .into());
            }
            Ok(report)
        }
        CheckMode::Scoped => {
            with_nodes_cancellable(graph, expected.iter().cloned(), config, cancel, |session| {
                async move {
                    info!("All nodes were found!");
                    Ok::<_, anyhow::Error>(Report {
                        success: true,
                        found: session.nodes_found()?,
                        missing: session.nodes_not_found()?,
                    })
                }
                .boxed()
            })
            .await
        }
    }
}
