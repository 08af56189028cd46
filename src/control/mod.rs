//! Stressor component control.
//!
//! This module provides:
//! - [`StressorControlProxy`]: timeouts, bounded retries and health for one component
//! - [`ComponentRegistry`]: components by id and role
//! - [`BroadcastStressor`]: a component driven through a [`CommandTopic`]
//! - [`HealthTracker`]: Healthy / Degraded / Unreachable bookkeeping

mod broadcast;
mod health;
mod proxy;
mod registry;
mod role;

pub use broadcast::{
    BroadcastStressor, CommandAction, CommandTopic, ComponentCommand, DEFAULT_COMMAND_RETENTION,
};
pub use health::{HealthStats, HealthTracker};
pub use proxy::{ComponentSnapshot, StressorControlProxy};
pub use registry::ComponentRegistry;
pub use role::ComponentRole;
