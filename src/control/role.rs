//! Component roles referenced by scenario phases.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Role a stressor component plays in a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentRole {
    /// CPU pressure generator.
    Cpu,
    /// Memory pressure generator.
    Memory,
    /// Message publisher.
    Publisher,
    /// Message subscriber.
    Subscriber,
    /// Closed-loop throughput tester.
    Throughput,
}

impl ComponentRole {
    /// All roles in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Cpu,
        Self::Memory,
        Self::Publisher,
        Self::Subscriber,
        Self::Throughput,
    ];

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Publisher => "publisher",
            Self::Subscriber => "subscriber",
            Self::Throughput => "throughput",
        }
    }
}

impl fmt::Display for ComponentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::InvalidParameter {
                name: "role".into(),
                reason: format!("unknown component role '{s}'"),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("cpu", ComponentRole::Cpu)]
    #[test_case("Memory", ComponentRole::Memory)]
    #[test_case(" publisher ", ComponentRole::Publisher)]
    #[test_case("SUBSCRIBER", ComponentRole::Subscriber)]
    #[test_case("throughput", ComponentRole::Throughput)]
    fn test_parse_role(input: &str, expected: ComponentRole) {
        assert_eq!(input.parse::<ComponentRole>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_role() {
        assert!("gpu".parse::<ComponentRole>().is_err());
    }

    #[test]
    fn test_role_as_json_map_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(ComponentRole::Publisher, 1);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"publisher":1}"#);
        let back: std::collections::BTreeMap<ComponentRole, i32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
