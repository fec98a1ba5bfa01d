//! dockmon-health — liveness monitoring and recovery for dockmon.
//!
//! Polls each service's liveness endpoint on its own interval and restarts
//! the backing container once the service has failed enough consecutive
//! checks.
//!
//! # Architecture
//!
//! ```text
//! HealthMonitor
//!   └── One tokio task per target (owns its TargetState)
//!       ├── sleep(liveness_interval)
//!       ├── LivenessProbe::check() → ProbeResult
//!       └── RecoveryCoordinator::on_result()
//!           ├── TargetState (consecutive failures)
//!           ├── StatusRepository (success / failure / restart records)
//!           └── ContainerControl::restart() once the threshold is crossed
//! ```
//!
//! # Failure policy
//!
//! The failure counter resets only on a healthy check or a successful
//! restart. A failed restart keeps the counter, so the next failed check
//! retries the restart. After a successful restart the service must fail
//! `fail_after` checks in a row again before the next restart.
//!
//! Persistence and restart errors are logged and never stop a loop.

pub mod checker;
pub mod monitor;
pub mod recovery;

pub use checker::{HttpProber, LivenessProbe, ProbeFuture, ProbeResult, http_probe};
pub use monitor::{DEFAULT_STARTUP_GRACE, HealthMonitor};
pub use recovery::{RecoveryCoordinator, RecoveryOutcome, TargetPhase, TargetState};
