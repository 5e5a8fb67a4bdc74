//! # Sequencing
//!
//! A rolling deployment engine.
//!
//! This crate drives a set of operations against a fleet of servers that sit
//! behind a load balancer. Each server is taken out of rotation, deployed to,
//! and put back, one at a time.
//!
//! ## Core Concepts
//!
//! - **Operation**: an opaque deployment step (run a command, copy a file)
//! - **CompositeSequence**: an ordered, nestable, optionally conditional group
//!   of operations
//! - **LoadBalancerExecutor**: decides the server order and moves one server
//!   between Online and Offline
//! - **ExecutionManager**: runs local sequences once, then remote sequences
//!   per server
//!
//! ## Example
//!
//! ```ignore
//! use sequencing::{
//!     CancellationToken, ExecutionManager, LogStatus, RunSettings, ServerTarget,
//! };
//!
//! let settings = RunSettings::new(vec![
//!     ServerTarget::new("web01").with_farm("web"),
//!     ServerTarget::new("web02").with_farm("web"),
//! ]);
//!
//! let mut manager = ExecutionManager::new(&settings.servers, None);
//! manager.new_local_sequence("Build").add(Box::new(BuildStep));
//! manager
//!     .new_remote_sequence("Deploy", false)
//!     .add(Box::new(CopyBinary));
//!
//! let summary = manager.execute(&mut LogStatus::default(), &settings, &CancellationToken::new())?;
//! println!("deployed to {} servers", summary.deployed.len());
//! ```
//!
//! ## Partial rollouts
//!
//! Mark one server with `stop_server` and run with
//! `RunOptions::stop_after_marked_server` to deploy only to it and leave it
//! out of rotation. A later run with `continue_after_marked_server` puts it
//! back and deploys to the rest of the fleet. When both options are set,
//! `stop_after_marked_server` takes precedence.
//!
//! ## Provider Traits
//!
//! - [`Operation`]: a deployment step
//! - [`StatusReporter`]: receives progress and named section start/end events
//! - [`ConditionEvaluator`]: evaluates condition expressions on a server
//! - [`balancer::LoadBalancer`]: the external balancer

pub mod context;
pub mod error;
pub mod executor;
pub mod manager;
pub mod operation;
pub mod sequence;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use context::{
    CancellationToken, LogStatus, NoStatus, Notification, StatusReporter, ValidationError,
    with_section,
};
pub use error::{Error, Result};
pub use executor::{
    DefaultLoadBalancerExecutor, LoadBalancerExecutor, RoundRobinLoadBalancerExecutor,
    StickyLoadBalancerExecutor, executor_for,
};
pub use manager::{ExecutionManager, RemoteSequence};
pub use operation::{BoxedOperation, Operation};
pub use sequence::{CompositeSequence, Condition, ConditionEvaluator};
pub use types::{
    LoadBalancerState, RunOptions, RunSettings, RunSummary, ServerState, ServerTarget,
};
