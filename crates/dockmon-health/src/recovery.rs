//! Per-target failure policy and container recovery.
//!
//! Each monitoring loop owns one [`TargetState`] and feeds every probe
//! result through the shared [`RecoveryCoordinator`]. The in-memory counter
//! always advances, even when the matching persistence write fails.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use dockmon_container::ContainerControl;
use dockmon_core::TargetDefinition;
use dockmon_state::StatusRepository;

use crate::checker::ProbeResult;

/// In-memory failure tracking for one target. Never shared between loops.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TargetState {
    consecutive_failures: u32,
}

impl TargetState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed check. Returns the new count.
    pub fn record_failure(&mut self) -> u32 {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_failures
    }

    pub fn clear(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Where this target sits in the recovery state machine.
    pub fn phase(&self, target: &TargetDefinition) -> TargetPhase {
        match self.consecutive_failures {
            0 => TargetPhase::Healthy,
            n if target.should_restart(n) => TargetPhase::RestartPending,
            n => TargetPhase::Degraded(n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPhase {
    Healthy,
    Degraded(u32),
    /// The threshold is crossed and restarts are enabled.
    RestartPending,
}

/// What `on_result` did with one probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    Healthy,
    /// Failed check below the threshold, or restarts disabled.
    Degraded { failures: u32 },
    /// The container was restarted and the counter cleared.
    Restarted,
    /// The restart call failed; the counter was kept.
    RestartFailed { failures: u32 },
}

/// Applies the failure policy and drives container restarts.
pub struct RecoveryCoordinator {
    store: Arc<dyn StatusRepository>,
    containers: Arc<dyn ContainerControl>,
    restart_timeout: Duration,
}

impl RecoveryCoordinator {
    /// `restart_timeout` is the stop timeout handed to the container runtime.
    pub fn new(
        store: Arc<dyn StatusRepository>,
        containers: Arc<dyn ContainerControl>,
        restart_timeout: Duration,
    ) -> Self {
        Self {
            store,
            containers,
            restart_timeout,
        }
    }

    /// Handle one probe result for `target`.
    pub async fn on_result(
        &self,
        target: &TargetDefinition,
        state: &mut TargetState,
        result: &ProbeResult,
    ) -> RecoveryOutcome {
        let service = target.service_name();

        let reason = match result {
            ProbeResult::Healthy => {
                state.clear();
                if let Err(e) = self.store.record_success(service, Utc::now()) {
                    error!(service, error = %e, "failed to record health success");
                }
                return RecoveryOutcome::Healthy;
            }
            ProbeResult::Unhealthy(reason) => reason,
        };

        let failures = state.record_failure();
        warn!(
            service,
            failures,
            threshold = target.fail_after(),
            reason = %reason,
            "liveness check failed"
        );
        if let Err(e) = self.store.record_failure(service, Utc::now()) {
            error!(service, error = %e, "failed to record health failure");
        }

        if state.phase(target) != TargetPhase::RestartPending {
            return RecoveryOutcome::Degraded { failures };
        }

        info!(service, failures, "restarting container");
        match self.containers.restart(service, self.restart_timeout).await {
            Ok(()) => {
                state.clear();
                if let Err(e) = self.store.record_restart(service, Utc::now()) {
                    error!(service, error = %e, "failed to record restart");
                }
                info!(service, "container restarted");
                RecoveryOutcome::Restarted
            }
            Err(e) => {
                error!(service, failures, error = %e, "container restart failed");
                RecoveryOutcome::RestartFailed { failures }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use chrono::{DateTime, Utc};
    use dockmon_container::{ContainerError, RestartFuture};
    use dockmon_state::{ServiceStatus, StateError, StateResult, StateStore, StatusEvent};

    #[derive(Default)]
    struct FakeContainers {
        calls: AtomicU32,
        fail: AtomicBool,
        names: Mutex<Vec<String>>,
    }

    impl FakeContainers {
        fn failing() -> Self {
            let fake = Self::default();
            fake.fail.store(true, Ordering::SeqCst);
            fake
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ContainerControl for FakeContainers {
        fn restart<'a>(&'a self, name: &'a str, _timeout: Duration) -> RestartFuture<'a> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.names.lock().unwrap().push(name.to_string());
                if self.fail.load(Ordering::SeqCst) {
                    Err(ContainerError::NotFound(name.to_string()))
                } else {
                    Ok(())
                }
            })
        }
    }

    /// Repository whose every call fails.
    struct FailingStore;

    impl StatusRepository for FailingStore {
        fn create_if_absent(&self, _: &TargetDefinition) -> StateResult<bool> {
            Err(StateError::Write("disk full".into()))
        }
        fn record_success(&self, _: &str, _: DateTime<Utc>) -> StateResult<()> {
            Err(StateError::Write("disk full".into()))
        }
        fn record_failure(&self, _: &str, _: DateTime<Utc>) -> StateResult<()> {
            Err(StateError::Write("disk full".into()))
        }
        fn record_restart(&self, _: &str, _: DateTime<Utc>) -> StateResult<()> {
            Err(StateError::Write("disk full".into()))
        }
        fn get_status(&self, _: &str) -> StateResult<Option<ServiceStatus>> {
            Err(StateError::Read("disk full".into()))
        }
        fn list_statuses(&self) -> StateResult<Vec<ServiceStatus>> {
            Err(StateError::Read("disk full".into()))
        }
        fn list_events(&self, _: &str, _: usize) -> StateResult<Vec<StatusEvent>> {
            Err(StateError::Read("disk full".into()))
        }
    }

    fn target(restart: bool, fail_after: u32) -> TargetDefinition {
        TargetDefinition::new(
            "web",
            "http://web:8080/health",
            Duration::from_secs(5),
            restart,
            fail_after,
        )
        .unwrap()
    }

    fn setup(
        target: &TargetDefinition,
        containers: FakeContainers,
    ) -> (RecoveryCoordinator, Arc<StateStore>, Arc<FakeContainers>) {
        let store = Arc::new(StateStore::open_in_memory().unwrap());
        store.create_if_absent(target).unwrap();
        let containers = Arc::new(containers);
        let coordinator =
            RecoveryCoordinator::new(store.clone(), containers.clone(), Duration::from_secs(10));
        (coordinator, store, containers)
    }

    fn down() -> ProbeResult {
        ProbeResult::Unhealthy("connection refused".into())
    }

    #[test]
    fn phase_follows_counter_and_policy() {
        let t = target(true, 2);
        let mut state = TargetState::new();
        assert_eq!(state.phase(&t), TargetPhase::Healthy);
        state.record_failure();
        assert_eq!(state.phase(&t), TargetPhase::Degraded(1));
        state.record_failure();
        assert_eq!(state.phase(&t), TargetPhase::RestartPending);

        // Restarts disabled never become pending.
        assert_eq!(state.phase(&target(false, 2)), TargetPhase::Degraded(2));
    }

    #[test]
    fn counter_saturates() {
        let mut state = TargetState {
            consecutive_failures: u32::MAX,
        };
        assert_eq!(state.record_failure(), u32::MAX);
    }

    #[tokio::test]
    async fn three_failures_trigger_one_restart() {
        let t = target(true, 3);
        let (coordinator, store, containers) = setup(&t, FakeContainers::default());
        let mut state = TargetState::new();

        let mut outcomes = Vec::new();
        for _ in 0..3 {
            outcomes.push(coordinator.on_result(&t, &mut state, &down()).await);
        }

        assert_eq!(
            outcomes,
            vec![
                RecoveryOutcome::Degraded { failures: 1 },
                RecoveryOutcome::Degraded { failures: 2 },
                RecoveryOutcome::Restarted,
            ]
        );
        assert_eq!(containers.calls(), 1);
        assert_eq!(containers.names.lock().unwrap().as_slice(), ["web"]);
        assert_eq!(state.consecutive_failures(), 0);

        let status = store.get_status("web").unwrap().unwrap();
        assert_eq!(status.restarts, 1);
        assert_eq!(status.consecutive_failed_health_checks, 0);
        assert!(!status.is_healthy);
    }

    #[tokio::test]
    async fn failed_restart_keeps_counter_and_retries() {
        let t = target(true, 3);
        let (coordinator, store, containers) = setup(&t, FakeContainers::failing());
        let mut state = TargetState::new();

        for _ in 0..3 {
            coordinator.on_result(&t, &mut state, &down()).await;
        }
        assert_eq!(containers.calls(), 1);
        assert_eq!(state.consecutive_failures(), 3);

        // Still over the threshold: the next failure retries immediately.
        let outcome = coordinator.on_result(&t, &mut state, &down()).await;
        assert_eq!(outcome, RecoveryOutcome::RestartFailed { failures: 4 });
        assert_eq!(containers.calls(), 2);

        let status = store.get_status("web").unwrap().unwrap();
        assert_eq!(status.restarts, 0);
        assert_eq!(status.consecutive_failed_health_checks, 4);
        assert!(!status.is_healthy);
    }

    #[tokio::test]
    async fn restart_needs_a_fresh_run_of_failures() {
        let t = target(true, 3);
        let (coordinator, _store, containers) = setup(&t, FakeContainers::default());
        let mut state = TargetState::new();

        for _ in 0..5 {
            coordinator.on_result(&t, &mut state, &down()).await;
        }
        // Restart after the 3rd failure, then two more below the threshold.
        assert_eq!(containers.calls(), 1);
        assert_eq!(state.consecutive_failures(), 2);

        coordinator.on_result(&t, &mut state, &down()).await;
        assert_eq!(containers.calls(), 2);
    }

    #[tokio::test]
    async fn restart_disabled_never_restarts() {
        let t = target(false, 3);
        let (coordinator, store, containers) = setup(&t, FakeContainers::default());
        let mut state = TargetState::new();

        for i in 1..=10 {
            let outcome = coordinator.on_result(&t, &mut state, &down()).await;
            assert_eq!(outcome, RecoveryOutcome::Degraded { failures: i });
        }

        assert_eq!(containers.calls(), 0);
        assert_eq!(state.consecutive_failures(), 10);
        let status = store.get_status("web").unwrap().unwrap();
        assert_eq!(status.consecutive_failed_health_checks, 10);
    }

    #[tokio::test]
    async fn success_after_two_failures_resets() {
        let t = target(true, 3);
        let (coordinator, store, containers) = setup(&t, FakeContainers::default());
        let mut state = TargetState::new();

        coordinator.on_result(&t, &mut state, &down()).await;
        coordinator.on_result(&t, &mut state, &down()).await;
        let outcome = coordinator
            .on_result(&t, &mut state, &ProbeResult::Healthy)
            .await;

        assert_eq!(outcome, RecoveryOutcome::Healthy);
        assert_eq!(state.consecutive_failures(), 0);
        assert_eq!(containers.calls(), 0);

        let status = store.get_status("web").unwrap().unwrap();
        assert!(status.is_healthy);
        assert_eq!(status.consecutive_failed_health_checks, 0);
    }

    #[tokio::test]
    async fn persistence_errors_do_not_stop_the_state_machine() {
        let t = target(true, 2);
        let containers = Arc::new(FakeContainers::default());
        let coordinator =
            RecoveryCoordinator::new(Arc::new(FailingStore), containers.clone(), Duration::from_secs(1));
        let mut state = TargetState::new();

        coordinator.on_result(&t, &mut state, &down()).await;
        assert_eq!(state.consecutive_failures(), 1);

        let outcome = coordinator.on_result(&t, &mut state, &down()).await;
        assert_eq!(outcome, RecoveryOutcome::Restarted);
        assert_eq!(containers.calls(), 1);
        assert_eq!(state.consecutive_failures(), 0);
    }
}
