//! Monitoring scheduler.
//!
//! Runs one perpetual loop per target. Each loop sleeps for the target's
//! interval, probes it, and hands the result to the recovery coordinator.
//! Loops share nothing but the coordinator's repository handle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use dockmon_core::TargetDefinition;

use crate::checker::LivenessProbe;
use crate::recovery::{RecoveryCoordinator, TargetState};

/// How long `run` waits after launching every loop before it starts
/// watching them.
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_secs(1);

/// Owns the per-target monitoring tasks and their stop signals.
pub struct HealthMonitor {
    prober: Arc<dyn LivenessProbe>,
    coordinator: Arc<RecoveryCoordinator>,
    stoppers: HashMap<String, watch::Sender<bool>>,
    tasks: JoinSet<String>,
    startup_grace: Duration,
}

impl HealthMonitor {
    pub fn new(prober: Arc<dyn LivenessProbe>, coordinator: Arc<RecoveryCoordinator>) -> Self {
        Self {
            prober,
            coordinator,
            stoppers: HashMap::new(),
            tasks: JoinSet::new(),
            startup_grace: DEFAULT_STARTUP_GRACE,
        }
    }

    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    /// Start monitoring a target. An existing loop for the same service is
    /// told to stop, and the new loop does not begin until the old one has
    /// finished its current cycle.
    pub fn start_monitor(&mut self, target: TargetDefinition) {
        let name = target.service_name().to_string();
        let previous = self.stoppers.remove(&name);
        if let Some(old) = &previous {
            let _ = old.send(true);
        }

        let (tx, rx) = watch::channel(false);
        self.stoppers.insert(name, tx);
        self.tasks.spawn(run_target_loop(
            target,
            self.prober.clone(),
            self.coordinator.clone(),
            rx,
            previous,
        ));
    }

    /// Signal one loop to stop at its next sleep boundary.
    /// Returns false if the service was not being monitored.
    pub fn stop_monitor(&mut self, service_name: &str) -> bool {
        match self.stoppers.remove(service_name) {
            Some(tx) => {
                let _ = tx.send(true);
                debug!(service = service_name, "monitor stop requested");
                true
            }
            None => false,
        }
    }

    /// Stop every loop and wait for each to finish its current cycle.
    pub async fn stop_all(&mut self) {
        for (_, tx) in self.stoppers.drain() {
            let _ = tx.send(true);
        }
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(service) => debug!(service = %service, "monitor stopped"),
                Err(e) => error!(error = %e, "monitor task failed"),
            }
        }
    }

    /// Names of the services currently monitored, sorted.
    pub fn active_monitors(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stoppers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_monitoring(&self, service_name: &str) -> bool {
        self.stoppers.contains_key(service_name)
    }

    /// Monitor every target until `shutdown` turns true or every loop has
    /// exited. On shutdown, all loops are stopped and joined before this
    /// returns.
    pub async fn run(mut self, targets: Vec<TargetDefinition>, mut shutdown: watch::Receiver<bool>) {
        let count = targets.len();
        for target in targets {
            self.start_monitor(target);
        }
        info!(count, "monitoring started");

        tokio::select! {
            _ = tokio::time::sleep(self.startup_grace) => {}
            _ = stop_requested(&mut shutdown) => {
                info!("shutdown requested during startup");
                self.stop_all().await;
                return;
            }
        }

        loop {
            tokio::select! {
                _ = stop_requested(&mut shutdown) => {
                    info!("stopping all monitors");
                    break;
                }
                joined = self.tasks.join_next() => match joined {
                    None => {
                        info!("all monitors exited");
                        return;
                    }
                    Some(Ok(service)) => {
                        // A replaced loop shares its name with the live one.
                        if self.stoppers.get(&service).is_some_and(|tx| tx.is_closed()) {
                            self.stoppers.remove(&service);
                        }
                        debug!(service = %service, "monitor exited");
                    }
                    Some(Err(e)) => error!(error = %e, "monitor task failed"),
                },
            }
        }

        self.stop_all().await;
    }
}

/// Resolves once the flag is true or its sender is gone.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Per-target loop. Sleeps first, so the first check happens one full
/// interval after startup. `previous` is the stop signal of the loop this
/// one replaces. Returns the service name on exit.
async fn run_target_loop(
    target: TargetDefinition,
    prober: Arc<dyn LivenessProbe>,
    coordinator: Arc<RecoveryCoordinator>,
    mut stop: watch::Receiver<bool>,
    previous: Option<watch::Sender<bool>>,
) -> String {
    // The replaced loop drops its receiver when it exits.
    if let Some(previous) = previous {
        previous.closed().await;
    }

    let interval = target.liveness_interval();
    let mut state = TargetState::new();
    info!(
        service = target.service_name(),
        interval_ms = interval.as_millis() as u64,
        fail_after = target.fail_after(),
        restart = target.restart_enabled(),
        "monitor started"
    );

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = stop.changed() => break,
        }

        let result = prober.check(&target).await;
        let outcome = coordinator.on_result(&target, &mut state, &result).await;
        debug!(service = target.service_name(), ?outcome, "check complete");
    }

    target.service_name().to_string()
}
