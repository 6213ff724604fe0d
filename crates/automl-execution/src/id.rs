use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, ExecutionResult};

/// Identifies a candidate configuration within a run.
/// Ids are assigned in proposal order and name the artifact and task files.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigurationId(u64);

impl ConfigurationId {
    /// The first generated id, reserved for the dummy baseline.
    pub const DUMMY: ConfigurationId = ConfigurationId(1);

    pub fn is_dummy(&self) -> bool {
        *self == Self::DUMMY
    }
}

impl From<u64> for ConfigurationId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ConfigurationId> for u64 {
    fn from(id: ConfigurationId) -> Self {
        id.0
    }
}

impl fmt::Display for ConfigurationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out configuration ids in increasing order, starting with [`ConfigurationId::DUMMY`].
#[derive(Debug)]
pub struct ConfigurationIdGenerator {
    next_value: u64,
}

impl ConfigurationIdGenerator {
    pub fn new() -> Self {
        Self {
            next_value: u64::from(ConfigurationId::DUMMY),
        }
    }

    pub fn next(&mut self) -> ExecutionResult<ConfigurationId> {
        let value = self.next_value;
        self.next_value = value
            .checked_add(1)
            .ok_or_else(|| ExecutionError::internal("configuration id overflow"))?;
        Ok(ConfigurationId(value))
    }
}

impl Default for ConfigurationIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_ids_start_with_dummy() {
        let mut ids = ConfigurationIdGenerator::new();
        let first = ids.next().unwrap();
        assert!(first.is_dummy());
        assert_eq!(u64::from(ids.next().unwrap()), 2);
        assert_eq!(ids.next().unwrap().to_string(), "3");
    }

    #[test]
    fn test_configuration_id_overflow() {
        let mut ids = ConfigurationIdGenerator {
            next_value: u64::MAX,
        };
        assert_eq!(u64::from(ids.next().unwrap()), u64::MAX);
        assert!(matches!(ids.next(), Err(ExecutionError::InternalError(_))));
    }
}
