//! Declarative scenario definitions.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::control::ComponentRole;
use crate::error::ValidationError;
use crate::traits::ParameterSet;

/// One timed segment of a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpec {
    /// Phase name, unique within its scenario.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// How long the phase lasts, in seconds.
    pub duration_secs: f64,
    /// Parameters applied to every component of each role.
    #[serde(default)]
    pub targets: BTreeMap<ComponentRole, ParameterSet>,
    /// Roles whose failure to apply fails the run.
    #[serde(default)]
    pub mandatory: BTreeSet<ComponentRole>,
    /// The phase may not start without an active baseline.
    #[serde(default)]
    pub baseline_required: bool,
    /// Capture a baseline for the length of the phase.
    #[serde(default)]
    pub capture_baseline: bool,
}

impl PhaseSpec {
    /// A phase with no targets.
    #[must_use]
    pub fn new(name: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            duration_secs,
            targets: BTreeMap::new(),
            mandatory: BTreeSet::new(),
            baseline_required: false,
            capture_baseline: false,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Target `role` with the fields of a JSON object.
    ///
    /// Non-object values produce an empty parameter set.
    #[must_use]
    pub fn target(mut self, role: ComponentRole, params: serde_json::Value) -> Self {
        let params = match params {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            _ => ParameterSet::new(),
        };
        self.targets.insert(role, params);
        self
    }

    /// Mark `role` as mandatory.
    #[must_use]
    pub fn mandatory(mut self, role: ComponentRole) -> Self {
        self.mandatory.insert(role);
        self
    }

    /// Require an active baseline before the phase starts.
    #[must_use]
    pub const fn requires_baseline(mut self) -> Self {
        self.baseline_required = true;
        self
    }

    /// Capture a baseline while the phase runs.
    #[must_use]
    pub const fn captures_baseline(mut self) -> Self {
        self.capture_baseline = true;
        self
    }

    /// Phase length. Invalid durations map to zero.
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.duration_secs).unwrap_or_default()
    }
}

/// A named, ordered list of phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Phases in execution order.
    pub phases: Vec<PhaseSpec>,
}

/// Listing entry for one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSummary {
    /// Phase name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Duration in seconds.
    pub duration_secs: f64,
}

/// Listing entry for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    /// Scenario name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Sum of phase durations in seconds.
    pub total_duration_secs: f64,
    /// Roles targeted by any phase.
    pub roles: Vec<ComponentRole>,
    /// Whether any phase requires a baseline.
    pub baseline_required: bool,
    /// Phases in order.
    pub phases: Vec<PhaseSummary>,
}

impl ScenarioDefinition {
    /// Create a definition.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, phases: Vec<PhaseSpec>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            phases,
        }
    }

    /// Sum of phase durations.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.phases.iter().map(PhaseSpec::duration).sum()
    }

    /// Duration of the phases before `index`.
    #[must_use]
    pub fn offset_of(&self, index: usize) -> Duration {
        self.phases.iter().take(index).map(PhaseSpec::duration).sum()
    }

    /// Roles targeted by any phase.
    #[must_use]
    pub fn roles(&self) -> BTreeSet<ComponentRole> {
        self.phases
            .iter()
            .flat_map(|phase| phase.targets.keys().copied())
            .collect()
    }

    /// Check the definition against `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for an empty scenario, a phase with a
    /// non-positive or non-finite duration, duplicate phase names, a
    /// mandatory role the phase never targets, or a total duration above
    /// `limit`.
    pub fn validate(&self, limit: Duration) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidParameter {
                name: "name".into(),
                reason: "scenario name is empty".into(),
            });
        }
        if self.phases.is_empty() {
            return Err(ValidationError::EmptyScenario {
                scenario: self.name.clone(),
            });
        }

        let mut seen = BTreeSet::new();
        for phase in &self.phases {
            let malformed = |reason: String| ValidationError::MalformedPhase {
                scenario: self.name.clone(),
                phase: phase.name.clone(),
                reason,
            };
            if !phase.duration_secs.is_finite() || phase.duration_secs <= 0.0 {
                return Err(malformed(format!(
                    "duration must be positive, got {}",
                    phase.duration_secs
                )));
            }
            if !seen.insert(phase.name.as_str()) {
                return Err(malformed("duplicate phase name".into()));
            }
            if let Some(role) = phase.mandatory.iter().find(|r| !phase.targets.contains_key(r)) {
                return Err(malformed(format!("mandatory role {role} has no target")));
            }
        }

        let total = self.total_duration();
        if total > limit {
            return Err(ValidationError::DurationExceeded {
                scenario: self.name.clone(),
                total_secs: total.as_secs(),
                limit_secs: limit.as_secs(),
            });
        }
        Ok(())
    }

    /// Listing entry.
    #[must_use]
    pub fn summary(&self) -> ScenarioSummary {
        ScenarioSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            total_duration_secs: self.total_duration().as_secs_f64(),
            roles: self.roles().into_iter().collect(),
            baseline_required: self.phases.iter().any(|p| p.baseline_required),
            phases: self
                .phases
                .iter()
                .map(|p| PhaseSummary {
                    name: p.name.clone(),
                    description: p.description.clone(),
                    duration_secs: p.duration_secs,
                })
                .collect(),
        }
    }
}
