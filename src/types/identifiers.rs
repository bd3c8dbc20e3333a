use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one batch execution recorded in `execution_runs`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Short random id, enough to tell runs apart in a single cache.
    #[must_use]
    pub fn generate() -> Self {
        let raw = uuid::Uuid::new_v4().simple().to_string();
        Self(raw.chars().take(8).collect())
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content hash of a goal's text, key of `goal_executions`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GoalHash(String);

impl GoalHash {
    #[must_use]
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GoalHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{GoalHash, RunId};

    #[test]
    fn generated_run_ids_are_short_and_distinct() {
        let first = RunId::generate();
        let second = RunId::generate();
        assert_eq!(first.value().len(), 8);
        assert_ne!(first, second);
    }

    #[test]
    fn identifiers_display_their_value() {
        assert_eq!(RunId::new("run-1").to_string(), "run-1");
        assert_eq!(GoalHash::new("abc").to_string(), "abc");
    }
}
