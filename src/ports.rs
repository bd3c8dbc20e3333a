use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cascade::RegenerationTask;
use crate::error::Result;
use crate::types::ArtifactSpec;

pub type PortFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Source of candidate artifacts for a goal, usually backed by a model.
pub trait Proposer: Send + Sync {
    fn propose<'a>(
        &'a self,
        goal: &'a str,
        context: Option<&'a Value>,
    ) -> PortFuture<'a, Vec<ArtifactSpec>>;

    /// Returns a revised artifact list with `cycle` broken.
    fn repair_cycle<'a>(
        &'a self,
        goal: &'a str,
        artifacts: &'a [ArtifactSpec],
        cycle: &'a [String],
    ) -> PortFuture<'a, Vec<ArtifactSpec>>;

    /// Proposes one artifact that integrates `candidates` into the goal.
    fn synthesize_root<'a>(
        &'a self,
        goal: &'a str,
        artifacts: &'a [ArtifactSpec],
        candidates: &'a [String],
    ) -> PortFuture<'a, Option<ArtifactSpec>>;

    /// Artifacts that creating `just_created` revealed as missing.
    fn discover_new<'a>(
        &'a self,
        goal: &'a str,
        completed_ids: &'a [String],
        just_created: &'a ArtifactSpec,
    ) -> PortFuture<'a, Vec<ArtifactSpec>>;
}

/// Pass/fail outcome of one verification axis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSignal {
    pub passed: bool,
    pub diagnostics: String,
}

impl VerificationSignal {
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            passed: true,
            diagnostics: String::new(),
        }
    }

    #[must_use]
    pub fn fail(diagnostics: impl Into<String>) -> Self {
        Self {
            passed: false,
            diagnostics: diagnostics.into(),
        }
    }
}

pub trait Verifier: Send + Sync {
    fn run_tests<'a>(&'a self, project_root: &'a Path) -> PortFuture<'a, VerificationSignal>;

    fn type_check<'a>(&'a self, project_root: &'a Path) -> PortFuture<'a, VerificationSignal>;

    fn lint<'a>(&'a self, project_root: &'a Path) -> PortFuture<'a, VerificationSignal>;
}

/// Rewrites one artifact during a cascade wave.
pub trait ArtifactRegenerator: Send + Sync {
    fn regenerate<'a>(&'a self, task: &'a RegenerationTask) -> PortFuture<'a, ()>;
}

/// Produces the content of one artifact for the incremental executor.
pub trait ArtifactCreator: Send + Sync {
    fn create<'a>(&'a self, spec: &'a ArtifactSpec) -> PortFuture<'a, String>;
}
