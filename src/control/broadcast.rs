//! Command-topic stressor for components outside the process.
//!
//! [`BroadcastStressor`] acknowledges a command once it is published on the
//! shared [`CommandTopic`]. In-process consumers subscribe to the topic;
//! remote components pull the retained log by sequence number and report
//! back through metric ingestion. Delivery is at-least-once, so components
//! must apply a repeated command idempotently.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::ComponentError;
use crate::traits::{ComponentHealth, ComponentStatus, ParameterSet, StressorControl};

use super::role::ComponentRole;

/// Default number of commands retained for pulling.
pub const DEFAULT_COMMAND_RETENTION: usize = 1024;

/// What a command asks the component to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CommandAction {
    /// Apply parameters.
    Apply {
        /// Target parameters.
        parameters: ParameterSet,
    },
    /// Stop generating load.
    Stop,
}

/// A published command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentCommand {
    /// Topic-wide sequence number, starting at 1.
    pub sequence: u64,
    /// Target component.
    pub component_id: String,
    /// Target role.
    pub role: ComponentRole,
    /// Requested action.
    #[serde(flatten)]
    pub action: CommandAction,
    /// Publication time.
    pub issued_at: DateTime<Utc>,
}

/// Broadcast topic plus a bounded retained log.
#[derive(Debug)]
pub struct CommandTopic {
    tx: broadcast::Sender<ComponentCommand>,
    log: Mutex<VecDeque<ComponentCommand>>,
    retention: usize,
    next_sequence: AtomicU64,
}

impl Default for CommandTopic {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_RETENTION)
    }
}

impl CommandTopic {
    /// Create a topic retaining the last `retention` commands.
    #[must_use]
    pub fn new(retention: usize) -> Self {
        let (tx, _) = broadcast::channel(100);
        Self {
            tx,
            log: Mutex::new(VecDeque::with_capacity(retention.min(DEFAULT_COMMAND_RETENTION))),
            retention: retention.max(1),
            next_sequence: AtomicU64::new(1),
        }
    }

    fn log(&self) -> MutexGuard<'_, VecDeque<ComponentCommand>> {
        match self.log.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Command log mutex poisoned, using recovered data");
                poisoned.into_inner()
            }
        }
    }

    /// Publish a command.
    pub fn publish(&self, component_id: &str, role: ComponentRole, action: CommandAction) -> ComponentCommand {
        let command = ComponentCommand {
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
            component_id: component_id.to_string(),
            role,
            action,
            issued_at: Utc::now(),
        };
        {
            let mut log = self.log();
            if log.len() == self.retention {
                log.pop_front();
            }
            log.push_back(command.clone());
        }
        // Best-effort send - don't block if no receivers
        let _ = self.tx.send(command.clone());
        command
    }

    /// Subscribe to live commands.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ComponentCommand> {
        self.tx.subscribe()
    }

    /// Retained commands after `after_sequence`, optionally for one component.
    #[must_use]
    pub fn since(&self, after_sequence: u64, component_id: Option<&str>) -> Vec<ComponentCommand> {
        self.log()
            .iter()
            .filter(|c| c.sequence > after_sequence)
            .filter(|c| component_id.is_none_or(|id| c.component_id == id))
            .cloned()
            .collect()
    }
}

/// [`StressorControl`] that publishes onto a [`CommandTopic`].
#[derive(Debug)]
pub struct BroadcastStressor {
    component_id: String,
    role: ComponentRole,
    topic: Arc<CommandTopic>,
    current: Mutex<ParameterSet>,
}

impl BroadcastStressor {
    /// Create a stressor for `component_id`.
    pub fn new(component_id: impl Into<String>, role: ComponentRole, topic: Arc<CommandTopic>) -> Self {
        Self {
            component_id: component_id.into(),
            role,
            topic,
            current: Mutex::new(ParameterSet::new()),
        }
    }

    fn current(&self) -> MutexGuard<'_, ParameterSet> {
        match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl StressorControl for BroadcastStressor {
    async fn apply_parameters(&self, params: &ParameterSet) -> Result<(), ComponentError> {
        {
            let mut current = self.current();
            if *current == *params {
                tracing::debug!(component = %self.component_id, "Parameters unchanged, not republished");
                return Ok(());
            }
            current.clone_from(params);
        }
        self.topic.publish(
            &self.component_id,
            self.role,
            CommandAction::Apply {
                parameters: params.clone(),
            },
        );
        Ok(())
    }

    async fn stop(&self) -> Result<(), ComponentError> {
        self.current().clear();
        self.topic.publish(&self.component_id, self.role, CommandAction::Stop);
        Ok(())
    }

    async fn status(&self) -> Result<ComponentStatus, ComponentError> {
        Ok(ComponentStatus {
            component_id: self.component_id.clone(),
            health: ComponentHealth::Healthy,
            current_parameters: self.current().clone(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio_test::{assert_ok, assert_pending, assert_ready_ok, task};

    fn params(intensity: f64) -> ParameterSet {
        let mut p = ParameterSet::new();
        p.insert("cpu_intensity".into(), json!(intensity));
        p
    }

    #[tokio::test]
    async fn test_apply_publishes_to_subscribers() {
        let topic = Arc::new(CommandTopic::default());
        let mut rx = topic.subscribe();
        let stressor = BroadcastStressor::new("cpu-0", ComponentRole::Cpu, Arc::clone(&topic));

        stressor.apply_parameters(&params(0.5)).await.unwrap();
        let command = rx.recv().await.unwrap();
        assert_eq!(command.sequence, 1);
        assert_eq!(command.component_id, "cpu-0");
        assert_eq!(command.action, CommandAction::Apply { parameters: params(0.5) });
    }

    #[tokio::test]
    async fn test_repeated_apply_is_idempotent() {
        let topic = Arc::new(CommandTopic::default());
        let stressor = BroadcastStressor::new("cpu-0", ComponentRole::Cpu, Arc::clone(&topic));

        stressor.apply_parameters(&params(0.5)).await.unwrap();
        stressor.apply_parameters(&params(0.5)).await.unwrap();
        stressor.apply_parameters(&params(0.8)).await.unwrap();
        assert_eq!(topic.since(0, None).len(), 2);

        let status = stressor.status().await.unwrap();
        assert_eq!(status.current_parameters, params(0.8));
    }

    #[tokio::test]
    async fn test_unchanged_apply_wakes_no_subscriber() {
        let topic = Arc::new(CommandTopic::default());
        let mut rx = topic.subscribe();
        let stressor = BroadcastStressor::new("cpu-0", ComponentRole::Cpu, Arc::clone(&topic));

        assert_ok!(stressor.apply_parameters(&params(0.5)).await);
        assert_ok!(rx.recv().await);

        assert_ok!(stressor.apply_parameters(&params(0.5)).await);
        let mut next = task::spawn(rx.recv());
        assert_pending!(next.poll());

        assert_ok!(stressor.stop().await);
        assert!(next.is_woken());
        let command = assert_ready_ok!(next.poll());
        assert_eq!(command.action, CommandAction::Stop);
    }

    #[tokio::test]
    async fn test_since_filters_by_sequence_and_component() {
        let topic = Arc::new(CommandTopic::default());
        let cpu = BroadcastStressor::new("cpu-0", ComponentRole::Cpu, Arc::clone(&topic));
        let mem = BroadcastStressor::new("mem-0", ComponentRole::Memory, Arc::clone(&topic));

        cpu.apply_parameters(&params(0.5)).await.unwrap();
        mem.apply_parameters(&params(0.1)).await.unwrap();
        cpu.stop().await.unwrap();

        let for_cpu = topic.since(0, Some("cpu-0"));
        assert_eq!(for_cpu.len(), 2);
        assert_eq!(for_cpu[1].action, CommandAction::Stop);
        assert_eq!(topic.since(2, None).len(), 1);
    }

    #[test]
    fn test_log_retention_is_bounded() {
        let topic = CommandTopic::new(2);
        for _ in 0..5 {
            topic.publish("cpu-0", ComponentRole::Cpu, CommandAction::Stop);
        }
        let retained = topic.since(0, None);
        assert_eq!(retained.len(), 2);
        assert_eq!(retained[0].sequence, 4);
    }

    #[test]
    fn test_command_wire_format() {
        let topic = CommandTopic::default();
        let command = topic.publish("cpu-0", ComponentRole::Cpu, CommandAction::Stop);
        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value["action"], "stop");
        assert_eq!(value["role"], "cpu");
    }
}
