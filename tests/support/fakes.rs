#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;

use forge::cascade::RegenerationTask;
use forge::ports::{
    ArtifactCreator, ArtifactRegenerator, PortFuture, Proposer, VerificationSignal, Verifier,
};
use forge::{ArtifactSpec, ForgeError};
use serde_json::Value;
use tokio::sync::Mutex;

pub fn spec(id: &str, requires: &[&str]) -> ArtifactSpec {
    ArtifactSpec::new(id, format!("{id} module"), format!("{id} contract"))
        .with_requires(requires.iter().copied())
        .with_produces_file(format!("src/{}.py", id.to_lowercase()))
}

/// Replays queued proposals and repairs; records what it was asked.
#[derive(Default)]
pub struct ScriptedProposer {
    pub proposals: Arc<Mutex<VecDeque<Vec<ArtifactSpec>>>>,
    pub repairs: Arc<Mutex<VecDeque<Vec<ArtifactSpec>>>>,
    pub reveals: Arc<Mutex<VecDeque<Vec<ArtifactSpec>>>>,
    pub goals_seen: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProposer {
    pub fn new(proposals: Vec<Vec<ArtifactSpec>>) -> Self {
        Self {
            proposals: Arc::new(Mutex::new(proposals.into())),
            ..Self::default()
        }
    }

    pub async fn queue_repair(&self, repaired: Vec<ArtifactSpec>) {
        self.repairs.lock().await.push_back(repaired);
    }

    pub async fn queue_reveal(&self, revealed: Vec<ArtifactSpec>) {
        self.reveals.lock().await.push_back(revealed);
    }
}

impl Proposer for ScriptedProposer {
    fn propose<'a>(
        &'a self,
        goal: &'a str,
        _context: Option<&'a Value>,
    ) -> PortFuture<'a, Vec<ArtifactSpec>> {
        Box::pin(async move {
            self.goals_seen.lock().await.push(goal.to_string());
            Ok(self.proposals.lock().await.pop_front().unwrap_or_default())
        })
    }

    fn repair_cycle<'a>(
        &'a self,
        _goal: &'a str,
        _artifacts: &'a [ArtifactSpec],
        _cycle: &'a [String],
    ) -> PortFuture<'a, Vec<ArtifactSpec>> {
        Box::pin(async move { Ok(self.repairs.lock().await.pop_front().unwrap_or_default()) })
    }

    fn synthesize_root<'a>(
        &'a self,
        _goal: &'a str,
        _artifacts: &'a [ArtifactSpec],
        _candidates: &'a [String],
    ) -> PortFuture<'a, Option<ArtifactSpec>> {
        Box::pin(async move { Ok(None) })
    }

    fn discover_new<'a>(
        &'a self,
        _goal: &'a str,
        _completed_ids: &'a [String],
        _just_created: &'a ArtifactSpec,
    ) -> PortFuture<'a, Vec<ArtifactSpec>> {
        Box::pin(async move { Ok(self.reveals.lock().await.pop_front().unwrap_or_default()) })
    }
}

/// Renders each artifact's contract and remembers the order of calls.
#[derive(Default)]
pub struct EchoCreator {
    pub created: Arc<Mutex<Vec<String>>>,
    pub failing: HashSet<String>,
}

impl ArtifactCreator for EchoCreator {
    fn create<'a>(&'a self, spec: &'a ArtifactSpec) -> PortFuture<'a, String> {
        Box::pin(async move {
            self.created.lock().await.push(spec.id().to_string());
            if self.failing.contains(spec.id()) {
                return Err(ForgeError::Internal(format!("refused {}", spec.id())));
            }
            Ok(format!("# {}\n", spec.contract()))
        })
    }
}

#[derive(Default)]
pub struct NoopRegenerator {
    pub seen: Arc<Mutex<Vec<String>>>,
}

impl ArtifactRegenerator for NoopRegenerator {
    fn regenerate<'a>(&'a self, task: &'a RegenerationTask) -> PortFuture<'a, ()> {
        Box::pin(async move {
            self.seen.lock().await.push(task.id.clone());
            Ok(())
        })
    }
}

/// Reports the same outcome on every axis.
pub struct StaticVerifier {
    pub passed: bool,
}

impl StaticVerifier {
    fn signal(&self) -> VerificationSignal {
        if self.passed {
            VerificationSignal::pass()
        } else {
            VerificationSignal::fail("static failure")
        }
    }
}

impl Verifier for StaticVerifier {
    fn run_tests<'a>(&'a self, _project_root: &'a Path) -> PortFuture<'a, VerificationSignal> {
        Box::pin(async move { Ok(self.signal()) })
    }

    fn type_check<'a>(&'a self, _project_root: &'a Path) -> PortFuture<'a, VerificationSignal> {
        Box::pin(async move { Ok(self.signal()) })
    }

    fn lint<'a>(&'a self, _project_root: &'a Path) -> PortFuture<'a, VerificationSignal> {
        Box::pin(async move { Ok(self.signal()) })
    }
}
