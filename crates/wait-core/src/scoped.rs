//! Scoped use of a wait session: discover, run a body, always release.
//!
//! ```no_run
//! use futures::FutureExt;
//! use wait_core::{LocalGraph, WaitConfig, with_nodes};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let graph = LocalGraph::new();
//! let config = WaitConfig::default();
//! with_nodes(&graph, ["foo", "bar"], &config, |session| {
//!     async move {
//!         assert!(session.nodes_not_found()?.is_empty());
//!         println!("Nodes found!");
//!         Ok::<_, anyhow::Error>(())
//!     }
//!     .boxed()
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::WaitConfig;
use crate::error::WaitError;
use crate::session::{WaitOutcome, WaitSession};
use crate::transport::DiscoveryTransport;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

/// Wait for `expected`, then run `body` with the session.
///
/// - If the wait times out, the handle is released and
///   [`WaitError::Timeout`] (carrying the missing names) is returned.
/// - Otherwise `body` runs and its result is returned as-is, after the
///   handle has been released. Errors from `body` are never rewrapped.
/// - If `body` panics or the returned future is dropped early, the
///   session's `Drop` releases the handle during unwinding.
pub async fn with_nodes<T, I, S, R, E, F>(
    transport: &T,
    expected: I,
    config: &WaitConfig,
    body: F,
) -> Result<R, E>
where
    T: DiscoveryTransport,
    I: IntoIterator<Item = S>,
    S: Into<String>,
    E: From<WaitError>,
    F: for<'s> FnOnce(&'s WaitSession<T::Handle>) -> BoxFuture<'s, Result<R, E>>,
{
    let never = CancellationToken::new();
    with_nodes_cancellable(transport, expected, config, &never, body).await
}

/// [`with_nodes`] with early abort: cancellation yields [`WaitError::Cancelled`].
pub async fn with_nodes_cancellable<T, I, S, R, E, F>(
    transport: &T,
    expected: I,
    config: &WaitConfig,
    cancel: &CancellationToken,
    body: F,
) -> Result<R, E>
where
    T: DiscoveryTransport,
    I: IntoIterator<Item = S>,
    S: Into<String>,
    E: From<WaitError>,
    F: for<'s> FnOnce(&'s WaitSession<T::Handle>) -> BoxFuture<'s, Result<R, E>>,
{
    let mut session = WaitSession::connect(transport, expected, config).await?;

    let outcome = session.wait_cancellable(cancel).await?;
    if outcome != WaitOutcome::Found {
        let missing = session.nodes_not_found().map_err(WaitError::from)?;
        session.shutdown().map_err(WaitError::from)?;
        return Err(match outcome {
            WaitOutcome::Cancelled => WaitError::Cancelled { missing },
            _ => WaitError::Timeout { missing },
        }
        .into());
    }

    let result = body(&session).await;
    session.shutdown().map_err(WaitError::from)?;
    result
}
