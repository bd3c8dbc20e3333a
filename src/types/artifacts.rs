use rpds::RedBlackTreeSetSync;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const CONTRACT_DOMAIN_TYPES: [&str; 5] = ["protocol", "interface", "schema", "spec", "outline"];

fn empty_requires() -> RedBlackTreeSetSync<String> {
    RedBlackTreeSetSync::new_sync()
}

/// A thing that must exist for a goal to be complete.
///
/// Specs are immutable: every `with_*` call returns a new value, and the
/// `requires` set is a persistent set shared structurally between copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    id: String,
    description: String,
    contract: String,
    #[serde(default = "empty_requires")]
    requires: RedBlackTreeSetSync<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    produces_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    domain_type: Option<String>,
    #[serde(default)]
    metadata: Value,
}

impl ArtifactSpec {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        contract: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            contract: contract.into(),
            requires: RedBlackTreeSetSync::new_sync(),
            produces_file: None,
            domain_type: None,
            metadata: Value::Null,
        }
    }

    #[must_use]
    pub fn with_requires<I, S>(self, requires: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            requires: requires.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    #[must_use]
    pub fn with_produces_file(self, path: impl Into<String>) -> Self {
        Self {
            produces_file: Some(path.into()),
            ..self
        }
    }

    #[must_use]
    pub fn with_domain_type(self, domain_type: impl Into<String>) -> Self {
        Self {
            domain_type: Some(domain_type.into()),
            ..self
        }
    }

    #[must_use]
    pub fn with_metadata(self, metadata: Value) -> Self {
        Self { metadata, ..self }
    }

    /// Copy of this spec whose `requires` keeps only ids accepted by `keep`.
    #[must_use]
    pub fn retain_requires(&self, keep: impl Fn(&str) -> bool) -> Self {
        Self {
            requires: self
                .requires
                .iter()
                .filter(|req| keep(req))
                .cloned()
                .collect(),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn contract(&self) -> &str {
        &self.contract
    }

    #[must_use]
    pub const fn requires(&self) -> &RedBlackTreeSetSync<String> {
        &self.requires
    }

    #[must_use]
    pub fn requires_ids(&self) -> Vec<String> {
        self.requires.iter().cloned().collect()
    }

    #[must_use]
    pub fn requires_id(&self, id: &str) -> bool {
        self.requires.contains(id)
    }

    #[must_use]
    pub fn produces_file(&self) -> Option<&str> {
        self.produces_file.as_deref()
    }

    #[must_use]
    pub fn domain_type(&self) -> Option<&str> {
        self.domain_type.as_deref()
    }

    #[must_use]
    pub const fn metadata(&self) -> &Value {
        &self.metadata
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.requires.is_empty()
    }

    /// Interface-defining artifacts: declared contract domain types, or leaves.
    #[must_use]
    pub fn is_contract(&self) -> bool {
        self.domain_type
            .as_deref()
            .is_some_and(|kind| CONTRACT_DOMAIN_TYPES.contains(&kind))
            || self.is_leaf()
    }
}
