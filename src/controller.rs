// controller.rs — Refresh state machine driving the stats pipeline.
// States: Loading → Loaded(snapshot) | Failed(message), overwritten whole
// at the end of every attempt. Owns the polling loop; cancellation is
// cooperative via a watch channel checked before each sleep and refresh.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::AnkiConnect;
use crate::stats::{build_snapshot, format_duration, ReviewSnapshot};

/// Outcome of the most recently completed refresh attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshState {
    /// No attempt has completed yet.
    Loading,
    Loaded(ReviewSnapshot),
    Failed(String),
}

impl RefreshState {
    /// Compact one-glance summary: "…" while loading, the remaining count
    /// once loaded, "!" on failure.
    pub fn title(&self) -> String {
        match self {
            RefreshState::Loading => "…".to_string(),
            RefreshState::Loaded(snapshot) => snapshot.remaining.to_string(),
            RefreshState::Failed(_) => "!".to_string(),
        }
    }
}

impl std::fmt::Display for RefreshState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshState::Loading => write!(f, "LOADING"),
            RefreshState::Loaded(_) => write!(f, "LOADED"),
            RefreshState::Failed(_) => write!(f, "FAILED"),
        }
    }
}

/// Holds the latest state and drives on-demand and scheduled refreshes.
///
/// Overlapping refreshes are tolerated: each attempt runs to completion and
/// the last writer wins. The single mutex serializes only the final state
/// assignment; reads clone and never wait on a refresh in flight.
pub struct RefreshController {
    api: Arc<dyn AnkiConnect>,
    state: Arc<Mutex<RefreshState>>,
    stop_tx: watch::Sender<bool>,
    poll_handle: Option<JoinHandle<()>>,
}

impl RefreshController {
    pub fn new(api: Arc<dyn AnkiConnect>) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            api,
            state: Arc::new(Mutex::new(RefreshState::Loading)),
            stop_tx,
            poll_handle: None,
        }
    }

    /// Snapshot of the current state. Never blocks on a refresh in flight.
    pub fn state(&self) -> RefreshState {
        self.state.lock().unwrap().clone()
    }

    /// Run one refresh attempt to completion and apply its result.
    pub async fn refresh_now(&self) {
        run_refresh(self.api.clone(), self.state.clone()).await;
    }

    /// Trigger a refresh without waiting for it. Safe to call while another
    /// attempt (manual or scheduled) is still running.
    pub fn request_refresh(&self) {
        let api = self.api.clone();
        let state = self.state.clone();
        tokio::spawn(run_refresh(api, state));
    }

    /// Start the scheduled-refresh loop: sleep `interval`, refresh, repeat.
    /// The stop signal is checked before each sleep and before each refresh,
    /// and wakes the sleep early. At most one loop runs per controller;
    /// starting again while one is active is a no-op.
    pub fn start_polling(&mut self, interval: Duration) {
        if self.poll_handle.is_some() {
            warn!("Scheduled refresh already running, ignoring start request");
            return;
        }

        let api = self.api.clone();
        let state = self.state.clone();
        let mut stop_rx = self.stop_tx.subscribe();

        info!(interval_secs = interval.as_secs_f64(), "Scheduled refresh started");

        self.poll_handle = Some(tokio::spawn(async move {
            loop {
                if *stop_rx.borrow() {
                    break;
                }

                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = tokio::time::sleep(interval) => {}
                }

                if *stop_rx.borrow() {
                    break;
                }

                run_refresh(api.clone(), state.clone()).await;
            }

            debug!("Polling loop exited");
        }));
    }

    /// Cooperative shutdown of the polling loop. A refresh already in
    /// flight completes and its result still lands in the state.
    pub fn stop_polling(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Stop polling and wait for the loop to wind down.
    pub async fn shutdown(mut self) {
        self.stop_polling();
        if let Some(handle) = self.poll_handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for RefreshController {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
    }
}

/// One refresh attempt: build a snapshot, overwrite the state atomically
/// with the outcome. Failures land verbatim as the Failed message.
async fn run_refresh(api: Arc<dyn AnkiConnect>, state: Arc<Mutex<RefreshState>>) {
    let next = match build_snapshot(api.as_ref()).await {
        Ok(snapshot) => {
            info!(
                remaining = snapshot.remaining,
                studied = %format_duration(snapshot.studied_secs),
                "Snapshot refreshed"
            );
            RefreshState::Loaded(snapshot)
        }
        Err(e) => {
            warn!(%e, "Refresh attempt failed");
            RefreshState::Failed(e.to_string())
        }
    };

    debug!(state = %next, summary = %next.title(), "State updated");
    *state.lock().unwrap() = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::stats::DeckStats;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Backend yielding one deck with 8 cards due, switchable to failure.
    struct ScriptedAnki {
        failing: AtomicBool,
        refreshes: AtomicUsize,
    }

    impl ScriptedAnki {
        fn new() -> Self {
            Self {
                failing: AtomicBool::new(false),
                refreshes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AnkiConnect for ScriptedAnki {
        async fn deck_names(&self) -> Result<Vec<String>, ClientError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(ClientError::Api("collection unavailable".into()));
            }
            Ok(vec!["Japanese".to_string()])
        }

        async fn deck_stats(
            &self,
            _decks: &[String],
        ) -> Result<HashMap<String, DeckStats>, ClientError> {
            Ok(HashMap::from([(
                "1".to_string(),
                DeckStats {
                    new_count: 5,
                    learn_count: 1,
                    review_count: 2,
                },
            )]))
        }

        async fn collection_stats_html(&self) -> Result<String, ClientError> {
            Ok("Studied 3 cards in 10 minutes today".to_string())
        }
    }

    #[tokio::test]
    async fn test_initial_state_is_loading() {
        let controller = RefreshController::new(Arc::new(ScriptedAnki::new()));
        assert_eq!(controller.state(), RefreshState::Loading);
        assert_eq!(controller.state().title(), "…");
    }

    #[tokio::test]
    async fn test_successful_refresh_loads_snapshot() {
        let controller = RefreshController::new(Arc::new(ScriptedAnki::new()));
        controller.refresh_now().await;

        match controller.state() {
            RefreshState::Loaded(snapshot) => {
                assert_eq!(snapshot.remaining, 8);
                assert_eq!(snapshot.studied_secs, 600.0);
            }
            other => panic!("expected Loaded, got {other}"),
        }
        assert_eq!(controller.state().title(), "8");
    }

    #[tokio::test]
    async fn test_failed_refresh_carries_message() {
        let api = Arc::new(ScriptedAnki::new());
        api.failing.store(true, Ordering::SeqCst);

        let controller = RefreshController::new(api);
        controller.refresh_now().await;

        match controller.state() {
            RefreshState::Failed(message) => {
                assert!(message.contains("collection unavailable"));
            }
            other => panic!("expected Failed, got {other}"),
        }
        assert_eq!(controller.state().title(), "!");
    }

    #[tokio::test]
    async fn test_success_overwrites_failure() {
        let api = Arc::new(ScriptedAnki::new());
        api.failing.store(true, Ordering::SeqCst);

        let controller = RefreshController::new(api.clone());
        controller.refresh_now().await;
        assert!(matches!(controller.state(), RefreshState::Failed(_)));

        api.failing.store(false, Ordering::SeqCst);
        controller.refresh_now().await;
        assert!(matches!(controller.state(), RefreshState::Loaded(_)));
    }

    #[tokio::test]
    async fn test_request_refresh_does_not_block() {
        let controller = RefreshController::new(Arc::new(ScriptedAnki::new()));
        controller.request_refresh();

        // The spawned attempt completes shortly after.
        for _ in 0..50 {
            if matches!(controller.state(), RefreshState::Loaded(_)) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("spawned refresh never completed");
    }

    /// Backend whose first attempt stalls on a gate; each stats fetch
    /// reports a distinct remaining count so attempts are tellable apart.
    struct GatedAnki {
        gate: tokio::sync::Notify,
        name_calls: AtomicUsize,
        stats_calls: AtomicUsize,
    }

    impl GatedAnki {
        fn new() -> Self {
            Self {
                gate: tokio::sync::Notify::new(),
                name_calls: AtomicUsize::new(0),
                stats_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AnkiConnect for GatedAnki {
        async fn deck_names(&self) -> Result<Vec<String>, ClientError> {
            if self.name_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.gate.notified().await;
            }
            Ok(vec!["Japanese".to_string()])
        }

        async fn deck_stats(
            &self,
            _decks: &[String],
        ) -> Result<HashMap<String, DeckStats>, ClientError> {
            // First attempt to get this far reports 2 due, the next 1.
            let due = match self.stats_calls.fetch_add(1, Ordering::SeqCst) {
                0 => 2,
                _ => 1,
            };
            Ok(HashMap::from([(
                "1".to_string(),
                DeckStats {
                    new_count: due,
                    learn_count: 0,
                    review_count: 0,
                },
            )]))
        }

        async fn collection_stats_html(&self) -> Result<String, ClientError> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn test_overlapping_refreshes_last_writer_wins() {
        let api = Arc::new(GatedAnki::new());
        let controller = RefreshController::new(api.clone());

        // Slow attempt first: spawns and parks on the gate.
        controller.request_refresh();
        tokio::task::yield_now().await;

        // Fast attempt completes while the slow one is still in flight.
        controller.refresh_now().await;
        match controller.state() {
            RefreshState::Loaded(snapshot) => assert_eq!(snapshot.remaining, 2),
            other => panic!("expected Loaded, got {other}"),
        }

        // Release the slow attempt; completing last, it overwrites the state.
        api.gate.notify_one();
        for _ in 0..50 {
            if let RefreshState::Loaded(snapshot) = controller.state() {
                if snapshot.remaining == 1 {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("slow refresh never overwrote the state");
    }

    #[tokio::test]
    async fn test_polling_refreshes_on_schedule() {
        let api = Arc::new(ScriptedAnki::new());
        let mut controller = RefreshController::new(api.clone());

        controller.start_polling(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(90)).await;

        assert!(api.refreshes.load(Ordering::SeqCst) >= 2);
        assert!(matches!(controller.state(), RefreshState::Loaded(_)));
    }

    #[tokio::test]
    async fn test_stop_polling_halts_refreshes() {
        let api = Arc::new(ScriptedAnki::new());
        let mut controller = RefreshController::new(api.clone());

        controller.start_polling(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(50)).await;
        controller.stop_polling();

        // Let any in-flight attempt finish, then the count must hold still.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let after_stop = api.refreshes.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(api.refreshes.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn test_second_start_polling_is_ignored() {
        let api = Arc::new(ScriptedAnki::new());
        let mut controller = RefreshController::new(api.clone());

        // First loop sleeps for an hour; a second start with a short
        // interval must not spin up a competing loop.
        controller.start_polling(Duration::from_secs(3600));
        controller.start_polling(Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(api.refreshes.load(Ordering::SeqCst), 0);

        controller.stop_polling();
    }

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", RefreshState::Loading), "LOADING");
        assert_eq!(format!("{}", RefreshState::Failed("x".into())), "FAILED");
    }
}
