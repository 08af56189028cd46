//! Scenario catalog: built-in scenarios plus an optional JSON file.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::control::ComponentRole::{Cpu, Memory, Publisher, Throughput};
use crate::error::ValidationError;

use super::definition::{PhaseSpec, ScenarioDefinition, ScenarioSummary};

/// Read-only set of scenarios, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ScenarioCatalog {
    scenarios: BTreeMap<String, Arc<ScenarioDefinition>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Wrapped { scenarios: Vec<ScenarioDefinition> },
    List(Vec<ScenarioDefinition>),
}

impl ScenarioCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in scenarios.
    #[must_use]
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for def in builtin_scenarios() {
            catalog.insert(def);
        }
        catalog
    }

    /// Built-ins merged with the scenarios in `path`, if any. File entries
    /// replace built-ins of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCatalog`] if the file cannot be
    /// read or parsed, or the validation error of the first invalid
    /// definition.
    pub fn load(path: Option<&Path>, limit: Duration) -> Result<Self, ValidationError> {
        let mut catalog = Self::builtin();
        if let Some(path) = path {
            let text = std::fs::read_to_string(path).map_err(|e| ValidationError::InvalidCatalog {
                message: format!("cannot read {}: {e}", path.display()),
            })?;
            let loaded = Self::parse(&text)?;
            tracing::info!(path = %path.display(), scenarios = loaded.len(), "Loaded scenario catalog");
            for def in loaded {
                if catalog.insert(def).is_some() {
                    tracing::debug!("Catalog file overrides a built-in scenario");
                }
            }
        }
        catalog.validate(limit)?;
        Ok(catalog)
    }

    /// Parse a JSON catalog: either a list of definitions or an object
    /// with a `scenarios` list.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCatalog`] on malformed JSON.
    pub fn parse(text: &str) -> Result<Vec<ScenarioDefinition>, ValidationError> {
        let file: CatalogFile = serde_json::from_str(text).map_err(|e| ValidationError::InvalidCatalog {
            message: e.to_string(),
        })?;
        Ok(match file {
            CatalogFile::Wrapped { scenarios } | CatalogFile::List(scenarios) => scenarios,
        })
    }

    /// Validate every definition.
    ///
    /// # Errors
    ///
    /// Returns the first failure.
    pub fn validate(&self, limit: Duration) -> Result<(), ValidationError> {
        self.scenarios.values().try_for_each(|def| def.validate(limit))
    }

    /// Add or replace a definition.
    pub fn insert(&mut self, def: ScenarioDefinition) -> Option<Arc<ScenarioDefinition>> {
        self.scenarios.insert(def.name.clone(), Arc::new(def))
    }

    /// Look up a scenario.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<ScenarioDefinition>> {
        self.scenarios.get(name).cloned()
    }

    /// Scenario names in order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.scenarios.keys().cloned().collect()
    }

    /// Listing of every scenario.
    #[must_use]
    pub fn summaries(&self) -> Vec<ScenarioSummary> {
        self.scenarios.values().map(|def| def.summary()).collect()
    }

    /// Number of scenarios.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

fn message(rate: f64, payload: u64, message_type: &str) -> serde_json::Value {
    json!({"message_rate": rate, "payload_size": payload, "message_type": message_type})
}

#[allow(clippy::too_many_lines)]
fn builtin_scenarios() -> Vec<ScenarioDefinition> {
    vec![
        ScenarioDefinition::new(
            "pure_baseline",
            "Pure baseline measurement with zero artificial stress",
            vec![PhaseSpec::new("system_baseline", 180.0)
                .describe("Measure the system with no artificial load")
                .captures_baseline()],
        ),
        ScenarioDefinition::new(
            "light_baseline",
            "Baseline measurement under minimal message load",
            vec![PhaseSpec::new("message_baseline", 120.0)
                .describe("1Hz small messages")
                .target(Publisher, message(1.0, 512, "string"))],
        ),
        ScenarioDefinition::new(
            "high_throughput",
            "Progressive message throughput stress",
            vec![
                PhaseSpec::new("ramp_up", 30.0)
                    .describe("Ramp up to 100Hz")
                    .target(Publisher, message(100.0, 1024, "string")),
                PhaseSpec::new("high_rate", 60.0)
                    .describe("Sustain a 1kHz message rate")
                    .target(Publisher, message(1000.0, 1024, "bytes")),
                PhaseSpec::new("burst_test", 30.0).describe("Burst mode at 5kHz").target(
                    Publisher,
                    json!({"message_rate": 5000.0, "payload_size": 1024, "message_type": "twist", "burst_mode": true}),
                ),
            ],
        ),
        ScenarioDefinition::new(
            "sensor_messages",
            "Realistic sensor message types",
            vec![
                PhaseSpec::new("image_stress", 45.0).describe("VGA RGB images at 30Hz").target(
                    Publisher,
                    json!({"message_rate": 30.0, "message_type": "image",
                           "image_width": 640, "image_height": 480, "image_encoding": "rgb8"}),
                ),
                PhaseSpec::new("pointcloud_stress", 45.0).describe("50k point clouds at 10Hz").target(
                    Publisher,
                    json!({"message_rate": 10.0, "message_type": "pointcloud2", "pointcloud_points": 50_000}),
                ),
                PhaseSpec::new("laserscan_stress", 30.0).describe("720-point laser scans at 40Hz").target(
                    Publisher,
                    json!({"message_rate": 40.0, "message_type": "laserscan", "laserscan_ranges": 720}),
                ),
            ],
        ),
        ScenarioDefinition::new(
            "large_payload",
            "Progressive payload size with large structured messages",
            vec![
                PhaseSpec::new("small_messages", 30.0)
                    .describe("1KB strings at 50Hz")
                    .target(Publisher, message(50.0, 1024, "string")),
                PhaseSpec::new("medium_messages", 30.0).describe("100KB messages at 25Hz").target(
                    Publisher,
                    json!({"message_rate": 25.0, "payload_size": 102_400,
                           "message_type": "custom_large", "custom_payload_fields": 1000}),
                ),
                PhaseSpec::new("large_messages", 60.0).describe("1MB messages at 5Hz").target(
                    Publisher,
                    json!({"message_rate": 5.0, "payload_size": 1_048_576,
                           "message_type": "custom_large", "custom_payload_fields": 10_000}),
                ),
            ],
        ),
        ScenarioDefinition::new(
            "dynamic_types",
            "Dynamic switching between message types",
            vec![PhaseSpec::new("dynamic_switching", 120.0)
                .describe("Switch message types every 10 seconds")
                .target(
                    Publisher,
                    json!({"message_rate": 20.0, "payload_size": 4096,
                           "dynamic_type_switching": true, "type_switch_interval": 10.0}),
                )],
        ),
        ScenarioDefinition::new(
            "cpu_stress",
            "Progressive CPU stress with message monitoring",
            [("light_cpu", 30.0, 0.25), ("medium_cpu", 30.0, 0.5), ("high_cpu", 60.0, 0.8)]
                .into_iter()
                .map(|(name, secs, intensity)| {
                    PhaseSpec::new(name, secs)
                        .describe(format!("{:.0}% CPU load", intensity * 100.0))
                        .target(Cpu, json!({"cpu_intensity": intensity}))
                        .target(Publisher, json!({"message_rate": 10.0, "payload_size": 1024}))
                        .mandatory(Cpu)
                })
                .collect(),
        ),
        ScenarioDefinition::new(
            "memory_stress",
            "Progressive memory stress with message monitoring",
            [("small_memory", 30.0, 536_870_912_u64), ("large_memory", 60.0, 2_147_483_648)]
                .into_iter()
                .map(|(name, secs, bytes)| {
                    PhaseSpec::new(name, secs)
                        .describe(format!("{}MB allocation", bytes / (1024 * 1024)))
                        .target(Memory, json!({"memory_usage": bytes}))
                        .target(Publisher, json!({"message_rate": 10.0, "payload_size": 1024}))
                        .mandatory(Memory)
                })
                .collect(),
        ),
        ScenarioDefinition::new(
            "system_overload",
            "Combined CPU, memory and message stress",
            [
                ("baseline_combined", 30.0, 0.1, 268_435_456_u64, 50.0, 1024),
                ("moderate_combined", 60.0, 0.5, 1_073_741_824, 500.0, 4096),
                ("extreme_combined", 30.0, 0.8, 2_147_483_648, 1000.0, 8192),
            ]
            .into_iter()
            .map(|(name, secs, intensity, bytes, rate, payload)| {
                PhaseSpec::new(name, secs)
                    .target(Cpu, json!({"cpu_intensity": intensity}))
                    .target(Memory, json!({"memory_usage": bytes}))
                    .target(Publisher, json!({"message_rate": rate, "payload_size": payload}))
                    .mandatory(Cpu)
                    .mandatory(Memory)
            })
            .collect(),
        ),
        ScenarioDefinition::new(
            "throughput_progression",
            "Throughput from 1Hz to 10kHz",
            vec![PhaseSpec::new("frequency_test", 60.0).target(
                Throughput,
                json!({"throughput_test": "frequency_progression",
                       "test_frequencies": [1, 10, 100, 1000, 10_000], "test_duration": 10.0}),
            )],
        ),
        ScenarioDefinition::new(
            "sustainable_rate",
            "Find the maximum sustainable message rate",
            vec![PhaseSpec::new("rate_discovery", 120.0)
                .describe("Binary search for the highest rate under the loss tolerance")
                .target(Throughput, json!({"throughput_test": "sustainable_rate", "loss_tolerance": 0.05}))],
        ),
        ScenarioDefinition::new(
            "queue_overflow",
            "Subscriber queue overflow and recovery",
            vec![PhaseSpec::new("overflow_test", 60.0).target(
                Throughput,
                json!({"throughput_test": "queue_overflow", "overflow_rate": 1000, "recovery_rate": 10}),
            )],
        ),
        ScenarioDefinition::new(
            "burst_patterns",
            "Burst message patterns",
            vec![PhaseSpec::new("burst_test", 90.0).target(
                Throughput,
                json!({"throughput_test": "burst_pattern", "low_rate": 1, "high_rate": 1000,
                       "cycle_duration": 5.0, "num_cycles": 3}),
            )],
        ),
        ScenarioDefinition::new(
            "cpu_throughput_matrix",
            "Throughput under several CPU loads",
            vec![PhaseSpec::new("cpu_load_test", 120.0)
                .target(
                    Throughput,
                    json!({"throughput_test": "cpu_load_throughput", "cpu_levels": [0, 25, 50, 75, 90],
                           "test_frequency": 100, "test_duration": 10.0}),
                )
                .target(Cpu, json!({"cpu_intensity": 0.0}))
                .mandatory(Cpu)],
        ),
    ]
}
