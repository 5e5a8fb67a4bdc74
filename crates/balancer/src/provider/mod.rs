use crate::error::Result;
use crate::types::{LoadBalancerMode, SuspendMethod, SuspendOutcome};

mod command;
mod http;

pub use command::CommandLoadBalancer;
pub use http::HttpLoadBalancer;

/// Provider trait for an external load balancer
///
/// This trait abstracts the balancer product, allowing us to:
/// - Drive any balancer that can be scripted from a shell
/// - Talk to balancers exposing an HTTP API
/// - Substitute a no-op balancer for dry runs and tests
pub trait LoadBalancer: Send + Sync {
    /// Traffic distribution mode of the farm(s) this balancer fronts
    fn mode(&self) -> LoadBalancerMode;

    /// Take `server` in `farm` out of rotation
    fn suspend(&self, server: &str, farm: &str, method: SuspendMethod) -> Result<SuspendOutcome>;

    /// Put `server` in `farm` back into rotation
    fn resume(&self, server: &str, farm: &str) -> Result<()>;
}

/// Balancer that accepts every call and touches nothing.
///
/// Used when no balancer is configured and whenever the real one must not be
/// reached (dry runs).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLoadBalancer {
    mode: LoadBalancerMode,
}

impl DefaultLoadBalancer {
    /// Create a no-op balancer reporting the given mode
    pub fn new(mode: LoadBalancerMode) -> Self {
        Self { mode }
    }
}

impl LoadBalancer for DefaultLoadBalancer {
    fn mode(&self) -> LoadBalancerMode {
        self.mode
    }

    fn suspend(&self, server: &str, farm: &str, method: SuspendMethod) -> Result<SuspendOutcome> {
        log::trace!("noop balancer: suspend {server} in {farm} ({method})");
        Ok(SuspendOutcome::Suspended)
    }

    fn resume(&self, server: &str, farm: &str) -> Result<()> {
        log::trace!("noop balancer: resume {server} in {farm}");
        Ok(())
    }
}

/// Substitute `{server}`, `{farm}` and `{method}` in a provider template
pub(crate) fn expand_template(
    template: &str,
    server: &str,
    farm: &str,
    method: Option<SuspendMethod>,
) -> String {
    let method = method.map(|m| m.to_string()).unwrap_or_default();
    template
        .replace("{server}", server)
        .replace("{farm}", farm)
        .replace("{method}", &method)
}
