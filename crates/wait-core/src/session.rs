//! WaitSession: bounded wait until a set of participant names is visible.
//!
//! A session owns exactly one discovery handle, created eagerly by
//! [`WaitSession::connect`] and destroyed exactly once, by [`WaitSession::shutdown`]
//! or, failing that, when the session is dropped.
//!
//! Sessions are single-owner and sequential: `wait` and `shutdown` take
//! `&mut self`, so results can only be read between waits.

use crate::config::WaitConfig;
use crate::error::{UsageError, WaitError};
use crate::identity::SessionIdentity;
use crate::transport::{DiscoveryHandle, DiscoveryTransport};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Stand-in deadline for budgets too large to add to an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `now + d`, saturating at roughly thirty years out.
fn deadline_after(now: Instant, d: Duration) -> Instant {
    now.checked_add(d).unwrap_or_else(|| now + FAR_FUTURE)
}

/// How a `wait` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Every expected name was visible.
    Found,
    /// The time budget ran out first.
    TimedOut,
    /// The caller's cancellation token fired first.
    Cancelled,
}

impl WaitOutcome {
    pub fn is_found(self) -> bool {
        self == WaitOutcome::Found
    }
}

pub struct WaitSession<H: DiscoveryHandle> {
    expected: BTreeSet<String>,
    identity: SessionIdentity,
    timeout: Duration,
    poll_interval: Duration,
    /// `None` once the handle has been destroyed.
    handle: Option<H>,
    /// Snapshot taken when the last `wait` exited.
    found: Option<BTreeSet<String>>,
}

impl<H: DiscoveryHandle> WaitSession<H> {
    /// Create a session under a fresh random identity.
    ///
    /// Fails with [`WaitError::Config`] before touching the transport if the
    /// configured durations are invalid, and with [`WaitError::TransportInit`]
    /// if the transport cannot create a handle.
    pub async fn connect<T, I, S>(
        transport: &T,
        expected: I,
        config: &WaitConfig,
    ) -> Result<Self, WaitError>
    where
        T: DiscoveryTransport<Handle = H>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let identity = SessionIdentity::random(&config.identity_prefix);
        Self::connect_as(transport, expected, config, identity).await
    }

    /// Create a session under a caller-chosen identity.
    pub async fn connect_as<T, I, S>(
        transport: &T,
        expected: I,
        config: &WaitConfig,
        identity: SessionIdentity,
    ) -> Result<Self, WaitError>
    where
        T: DiscoveryTransport<Handle = H>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        config.validate()?;
        let timeout = config.timeout()?;
        let poll_interval = config.poll_interval()?;
        let expected: BTreeSet<String> = expected.into_iter().map(Into::into).collect();
        let handle = transport.create_handle(&identity).await?;
        debug!("Discovery handle created for {}", identity);

        Ok(Self {
            expected,
            identity,
            timeout,
            poll_interval,
            handle: Some(handle),
            found: None,
        })
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn expected(&self) -> &BTreeSet<String> {
        &self.expected
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_shut_down(&self) -> bool {
        self.handle.is_none()
    }

    /// Poll until every expected name is visible or the timeout elapses.
    ///
    /// Returns `Ok(false)` on timeout; see [`nodes_not_found`](Self::nodes_not_found)
    /// for what was missing.
    pub async fn wait(&mut self) -> Result<bool, WaitError> {
        let never = CancellationToken::new();
        Ok(self.wait_cancellable(&never).await?.is_found())
    }

    /// Like [`wait`](Self::wait), but returns early once `cancel` fires.
    ///
    /// Each call runs the full loop again and replaces the previous result.
    pub async fn wait_cancellable(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<WaitOutcome, WaitError> {
        let handle = self.handle.as_ref().ok_or(UsageError::WaitAfterShutdown)?;
        let deadline = deadline_after(Instant::now(), self.timeout);
        info!(
            "Waiting for {} node(s) (timeout {:?}): {:?}",
            self.expected.len(),
            self.timeout,
            self.expected
        );

        let (outcome, mut visible) = loop {
            let visible = handle.list_participants().await;
            if self.expected.is_subset(&visible) {
                break (WaitOutcome::Found, visible);
            }
            let now = Instant::now();
            if now >= deadline {
                break (WaitOutcome::TimedOut, visible);
            }
            debug!(
                "{} of {} node(s) visible",
                self.expected.intersection(&visible).count(),
                self.expected.len()
            );

            let wake = deadline_after(now, self.poll_interval).min(deadline);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break (WaitOutcome::Cancelled, visible),
                _ = sleep_until(wake) => {}
            }
        };

        // The handle may not be registered yet, so this can be a no-op.
        visible.remove(self.identity.as_str());
        self.found = Some(visible);

        match outcome {
            WaitOutcome::Found => info!("All {} node(s) found", self.expected.len()),
            WaitOutcome::TimedOut => warn!(
                "Timed out after {:?}, missing: {:?}",
                self.timeout,
                self.nodes_not_found()?
            ),
            WaitOutcome::Cancelled => info!("Wait cancelled"),
        }
        Ok(outcome)
    }

    /// Names visible when the last `wait` exited, excluding this session's own identity.
    pub fn nodes_found(&self) -> Result<BTreeSet<String>, UsageError> {
        self.found.clone().ok_or(UsageError::NoResultYet)
    }

    /// Expected names that were not visible when the last `wait` exited.
    ///
    /// Recomputed on every call from the expected set and the found set.
    pub fn nodes_not_found(&self) -> Result<BTreeSet<String>, UsageError> {
        let found = self.found.as_ref().ok_or(UsageError::NoResultYet)?;
        Ok(self.expected.difference(found).cloned().collect())
    }

    /// Destroy the discovery handle. The session is terminal afterwards.
    ///
    /// A second call fails with [`UsageError::AlreadyShutDown`] and touches nothing.
    pub fn shutdown(&mut self) -> Result<(), UsageError> {
        let mut handle = self.handle.take().ok_or(UsageError::AlreadyShutDown)?;
        handle.destroy();
        debug!("Discovery handle destroyed for {}", self.identity);
        Ok(())
    }
}

impl<H: DiscoveryHandle> Drop for WaitSession<H> {
    fn drop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            warn!(
                "Session {} dropped without shutdown, releasing discovery handle",
                self.identity
            );
            handle.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalGraph;
    use crate::transport::{Result as TransportResult, TransportError};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn config(timeout_secs: f64) -> WaitConfig {
        WaitConfig {
            timeout_secs,
            ..WaitConfig::default()
        }
    }

    /// Handle that never reports its own identity and counts queries.
    struct UnregisteredHandle {
        visible: BTreeSet<String>,
        polls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DiscoveryHandle for UnregisteredHandle {
        async fn list_participants(&self) -> BTreeSet<String> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.visible.clone()
        }

        fn destroy(&mut self) {}
    }

    struct UnregisteredTransport {
        visible: BTreeSet<String>,
        polls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DiscoveryTransport for UnregisteredTransport {
        type Handle = UnregisteredHandle;

        async fn create_handle(&self, _: &SessionIdentity) -> TransportResult<UnregisteredHandle> {
            Ok(UnregisteredHandle {
                visible: self.visible.clone(),
                polls: self.polls.clone(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_visible_returns_on_first_poll() {
        let graph = LocalGraph::new();
        let _a = graph.join("a");
        let _b = graph.join("b");
        let mut session = WaitSession::connect(&graph, ["a", "b"], &config(10.0))
            .await
            .unwrap();

        let start = Instant::now();
        assert!(session.wait().await.unwrap());
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(session.nodes_not_found().unwrap().is_empty());
        session.shutdown().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_stops_at_deadline() {
        let graph = LocalGraph::new();
        let _a = graph.join("a");
        let mut session = WaitSession::connect(&graph, ["a", "ghost"], &config(1.0))
            .await
            .unwrap();

        let start = Instant::now();
        assert!(!session.wait().await.unwrap());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(1), "returned early: {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1050), "overshot: {:?}", elapsed);
        assert_eq!(session.nodes_not_found().unwrap(), names(&["ghost"]));
        assert_eq!(session.nodes_found().unwrap(), names(&["a"]));
        session.shutdown().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_participant_is_found() {
        let graph = LocalGraph::new();
        let mut session = WaitSession::connect(&graph, ["late"], &config(5.0))
            .await
            .unwrap();

        let joiner = async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            graph.join("late")
        };
        let (found, _late) = tokio::join!(session.wait(), joiner);

        assert!(found.unwrap());
        assert_eq!(session.nodes_found().unwrap(), names(&["late"]));
        session.shutdown().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_self_identity_excluded() {
        let graph = LocalGraph::new();
        let mut session = WaitSession::connect(&graph, ["missing"], &config(0.5))
            .await
            .unwrap();
        assert!(graph.contains(session.identity().as_str()));

        session.wait().await.unwrap();
        let found = session.nodes_found().unwrap();
        assert!(!found.contains(session.identity().as_str()));
        session.shutdown().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_self_identity_is_not_an_error() {
        let polls = Arc::new(AtomicUsize::new(0));
        let transport = UnregisteredTransport {
            visible: names(&["a"]),
            polls: polls.clone(),
        };
        let mut session = WaitSession::connect(&transport, ["a", "b"], &config(0.9))
            .await
            .unwrap();

        assert!(!session.wait().await.unwrap());
        assert_eq!(session.nodes_found().unwrap(), names(&["a"]));
        // Polls at 0.0, 0.3, 0.6 and once more at the 0.9 deadline.
        let polls = polls.load(Ordering::SeqCst);
        assert!((4..=5).contains(&polls), "unexpected poll count {}", polls);
        session.shutdown().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_expected_set_succeeds() {
        let graph = LocalGraph::new();
        let mut session = WaitSession::connect(&graph, Vec::<String>::new(), &config(1.0))
            .await
            .unwrap();
        assert!(session.wait().await.unwrap());
        assert!(session.nodes_not_found().unwrap().is_empty());
        session.shutdown().unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_expected_names_collapse() {
        let graph = LocalGraph::new();
        let session = WaitSession::connect(&graph, ["a", "a", "b"], &WaitConfig::default())
            .await
            .unwrap();
        assert_eq!(session.expected(), &names(&["a", "b"]));
    }

    #[tokio::test]
    async fn test_accessors_before_wait() {
        let graph = LocalGraph::new();
        let mut session = WaitSession::connect(&graph, ["a"], &WaitConfig::default())
            .await
            .unwrap();
        assert_eq!(session.nodes_found(), Err(UsageError::NoResultYet));
        assert_eq!(session.nodes_not_found(), Err(UsageError::NoResultYet));
        session.shutdown().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_again_overwrites_result() {
        let graph = LocalGraph::new();
        let mut session = WaitSession::connect(&graph, ["a"], &config(0.6))
            .await
            .unwrap();

        assert!(!session.wait().await.unwrap());
        assert_eq!(session.nodes_not_found().unwrap(), names(&["a"]));

        let _a = graph.join("a");
        assert!(session.wait().await.unwrap());
        assert!(session.nodes_not_found().unwrap().is_empty());

        drop(_a);
        assert!(!session.wait().await.unwrap());
        assert_eq!(session.nodes_not_found().unwrap(), names(&["a"]));
        session.shutdown().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_difference_of_found() {
        let graph = LocalGraph::new();
        let _a = graph.join("a");
        let _x = graph.join("unrelated");
        let mut session = WaitSession::connect(&graph, ["a", "b", "c"], &config(0.3))
            .await
            .unwrap();
        session.wait().await.unwrap();

        for _ in 0..3 {
            let found = session.nodes_found().unwrap();
            let expected: BTreeSet<String> =
                session.expected().difference(&found).cloned().collect();
            assert_eq!(session.nodes_not_found().unwrap(), expected);
        }
        assert_eq!(session.nodes_found().unwrap(), names(&["a", "unrelated"]));
        session.shutdown().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_sleep() {
        let graph = LocalGraph::new();
        let mut session = WaitSession::connect(&graph, ["never"], &config(60.0))
            .await
            .unwrap();
        let cancel = CancellationToken::new();

        let canceller = async {
            tokio::time::sleep(Duration::from_millis(1000)).await;
            cancel.cancel();
        };
        let start = Instant::now();
        let (outcome, ()) = tokio::join!(session.wait_cancellable(&cancel), canceller);

        assert_eq!(outcome.unwrap(), WaitOutcome::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(session.nodes_not_found().unwrap(), names(&["never"]));
        session.shutdown().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_twice_is_usage_error() {
        let graph = LocalGraph::new();
        let mut session = WaitSession::connect(&graph, ["a"], &config(0.3))
            .await
            .unwrap();
        session.wait().await.unwrap();

        assert!(!session.is_shut_down());
        session.shutdown().unwrap();
        assert!(session.is_shut_down());
        assert_eq!(session.shutdown(), Err(UsageError::AlreadyShutDown));
        assert_eq!(graph.handle_stats().destroyed, 1);

        // Results survive shutdown, further waits do not.
        assert_eq!(session.nodes_not_found().unwrap(), names(&["a"]));
        assert!(matches!(
            session.wait().await,
            Err(WaitError::Usage(UsageError::WaitAfterShutdown))
        ));
    }

    #[tokio::test]
    async fn test_drop_releases_handle() {
        let graph = LocalGraph::new();
        let session = WaitSession::connect(&graph, ["a"], &WaitConfig::default())
            .await
            .unwrap();
        let identity = session.identity().clone();
        assert_eq!(graph.handle_stats().live(), 1);

        drop(session);
        assert_eq!(graph.handle_stats().live(), 0);
        assert!(!graph.contains(identity.as_str()));
    }

    #[tokio::test]
    async fn test_transport_init_failure() {
        let graph = LocalGraph::new();
        graph.set_unavailable(Some("no graph".into()));
        let result = WaitSession::connect(&graph, ["a"], &WaitConfig::default()).await;
        assert!(matches!(
            result,
            Err(WaitError::TransportInit(TransportError::Init(_)))
        ));
        assert_eq!(graph.handle_stats().created, 0);
    }

    #[tokio::test]
    async fn test_invalid_config_creates_no_handle() {
        let graph = LocalGraph::new();
        let config = WaitConfig::default().with_poll_interval(Duration::ZERO);
        let result = WaitSession::connect(&graph, ["a"], &config).await;
        assert!(matches!(result, Err(WaitError::Config(_))));
        assert_eq!(graph.handle_stats().created, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_timeout_does_not_overflow() {
        let graph = LocalGraph::new();
        let _a = graph.join("a");
        let config = config(1e19);
        assert!(config.validate().is_ok());
        let mut session = WaitSession::connect(&graph, ["a"], &config).await.unwrap();
        assert!(session.wait().await.unwrap());
        session.shutdown().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_timeout_still_polls_and_cancels() {
        let graph = LocalGraph::new();
        let config = config(1e19).with_poll_interval(Duration::from_secs_f64(1e19));
        let mut session = WaitSession::connect(&graph, ["never"], &config)
            .await
            .unwrap();
        let cancel = CancellationToken::new();

        let canceller = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        };
        let (outcome, ()) = tokio::join!(session.wait_cancellable(&cancel), canceller);
        assert_eq!(outcome.unwrap(), WaitOutcome::Cancelled);
        session.shutdown().unwrap();
    }

    #[tokio::test]
    async fn test_identity_uses_configured_prefix() {
        let graph = LocalGraph::new();
        let config = WaitConfig::default().with_identity_prefix("launch_check_");
        let mut session = WaitSession::connect(&graph, ["a"], &config).await.unwrap();
        assert!(session.identity().as_str().starts_with("launch_check_"));
        assert!(graph.contains(session.identity().as_str()));
        session.shutdown().unwrap();
    }
}
