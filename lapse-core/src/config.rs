//! Table configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error type for parsing a read policy.
#[derive(Debug, Clone)]
pub struct ParseReadPolicyError(String);

impl fmt::Display for ParseReadPolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid read policy: {}", self.0)
    }
}

impl std::error::Error for ParseReadPolicyError {}

/// How reads treat an entry whose lifespan has elapsed but which the sweep
/// has not removed yet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ReadPolicy {
    /// The sweep alone defines expiry; an elapsed entry stays readable until
    /// the next sweep removes it.
    #[default]
    SweepDefined,
    /// Reads and membership checks report an elapsed entry as absent.
    /// Removal is still left to the sweep.
    CheckOnRead,
}

impl ReadPolicy {
    /// Returns the canonical name of the policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadPolicy::SweepDefined => "sweep-defined",
            ReadPolicy::CheckOnRead => "check-on-read",
        }
    }
}

impl fmt::Display for ReadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadPolicy {
    type Err = ParseReadPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sweep-defined" | "sweep" => Ok(ReadPolicy::SweepDefined),
            "check-on-read" | "lazy" => Ok(ReadPolicy::CheckOnRead),
            _ => Err(ParseReadPolicyError(s.to_string())),
        }
    }
}

/// Per-table configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TableConfig {
    /// Read-time treatment of elapsed entries
    pub read_policy: ReadPolicy,
    /// Pre-allocation hint for the entry map
    pub initial_capacity: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            read_policy: ReadPolicy::SweepDefined,
            initial_capacity: 0,
        }
    }
}

impl TableConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the read policy.
    pub fn with_read_policy(mut self, policy: ReadPolicy) -> Self {
        self.read_policy = policy;
        self
    }

    /// Sets the initial map capacity.
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_default_config() {
        let config = TableConfig::default();
        assert_eq!(config.read_policy, ReadPolicy::SweepDefined);
        assert_eq!(config.initial_capacity, 0);
    }

    #[test]
    fn test_builder_chaining() {
        let config = TableConfig::new()
            .with_read_policy(ReadPolicy::CheckOnRead)
            .with_initial_capacity(128);
        assert_eq!(config.read_policy, ReadPolicy::CheckOnRead);
        assert_eq!(config.initial_capacity, 128);
    }

    #[test_case("sweep-defined", ReadPolicy::SweepDefined)]
    #[test_case("sweep", ReadPolicy::SweepDefined)]
    #[test_case("CHECK-ON-READ", ReadPolicy::CheckOnRead)]
    #[test_case(" lazy ", ReadPolicy::CheckOnRead)]
    fn test_parse_read_policy(input: &str, expected: ReadPolicy) {
        assert_eq!(input.parse::<ReadPolicy>().unwrap(), expected);
    }

    #[test]
    fn test_parse_read_policy_rejects_unknown() {
        let err = "lru".parse::<ReadPolicy>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid read policy: lru");
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: TableConfig = serde_json::from_str(r#"{"read_policy":"check-on-read"}"#).unwrap();
        assert_eq!(config.read_policy, ReadPolicy::CheckOnRead);
        assert_eq!(config.initial_capacity, 0);

        let round: TableConfig =
            serde_json::from_str(&serde_json::to_string(&TableConfig::default()).unwrap()).unwrap();
        assert_eq!(round, TableConfig::default());
    }
}
