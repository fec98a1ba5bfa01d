//! dockmon-container — corrective actions against the container runtime.
//!
//! The health engine only sees the [`ContainerControl`] trait. The
//! [`DockerClient`] implementation speaks the Docker Engine HTTP API over
//! the daemon's unix socket (or a TCP endpoint from `DOCKER_HOST`) using
//! hyper's HTTP/1 client directly.
//!
//! Every call carries its own deadline, so a wedged daemon can delay a
//! monitoring loop by at most one bounded request.

pub mod docker;
pub mod error;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub use docker::{DEFAULT_DOCKER_SOCKET, DockerClient, DockerHost};
pub use error::{ContainerError, ContainerResult};

/// Boxed future returned by [`ContainerControl::restart`].
pub type RestartFuture<'a> = Pin<Box<dyn Future<Output = ContainerResult<()>> + Send + 'a>>;

/// Restarts named workloads. Shared read-only by every monitoring loop.
pub trait ContainerControl: Send + Sync {
    /// Restart the container called `name`, giving it `timeout` to stop
    /// gracefully before it is killed.
    fn restart<'a>(&'a self, name: &'a str, timeout: Duration) -> RestartFuture<'a>;
}
