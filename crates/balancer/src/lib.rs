//! # balancer
//!
//! Load balancer providers for rolling deployments.
//!
//! A deployment takes each server out of rotation before touching it and puts
//! it back afterwards. This crate abstracts the external balancer behind the
//! [`LoadBalancer`] trait and resolves a concrete implementation by name
//! through a [`Registry`].
//!
//! ## Example
//!
//! ```no_run
//! use balancer::{LoadBalancerConfig, Registry, SuspendMethod};
//!
//! let config: LoadBalancerConfig = toml::from_str(r#"
//!     provider = "command"
//!     mode = "sticky"
//!
//!     [options]
//!     suspend = "lbctl drain {farm} {server}"
//!     resume = "lbctl enable {farm} {server}"
//! "#).unwrap();
//!
//! let lb = Registry::with_builtin().resolve(Some(&config)).unwrap();
//! lb.suspend("web01", "web", SuspendMethod::Graceful).unwrap();
//! lb.resume("web01", "web").unwrap();
//! ```
//!
//! ## Providers
//!
//! - `noop` / `default`: accepts every call and does nothing
//! - `command`: shells out to configurable suspend/resume commands
//! - `http`: talks to a small JSON API
//!
//! Additional providers are plugged in with [`Registry::register`].

pub mod error;
pub mod provider;
pub mod registry;
pub mod types;

pub use error::{Error, Result};
pub use provider::{CommandLoadBalancer, DefaultLoadBalancer, HttpLoadBalancer, LoadBalancer};
pub use registry::{ProviderFactory, Registry};
pub use types::{LoadBalancerConfig, LoadBalancerMode, SuspendMethod, SuspendOutcome};
