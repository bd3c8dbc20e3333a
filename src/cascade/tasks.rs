use std::fmt;

use serde::{Deserialize, Serialize};

use super::CascadePreview;

pub const VERIFY_TASK_ID: &str = "cascade-verify";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    /// Rewrite the weak artifact from scratch.
    Regenerate,
    /// Adapt a dependent to the regenerated artifact.
    Modify,
    Verify,
}

impl TaskMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Regenerate => "regenerate",
            Self::Modify => "modify",
            Self::Verify => "verify",
        }
    }
}

impl fmt::Display for TaskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One unit of cascade work handed to an [`crate::ports::ArtifactRegenerator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenerationTask {
    pub id: String,
    pub artifact_id: Option<String>,
    pub description: String,
    pub mode: TaskMode,
    pub target_path: Option<String>,
    pub depends_on: Vec<String>,
    pub wave: Option<usize>,
}

fn task_id(artifact_id: &str) -> String {
    format!("cascade-{artifact_id}")
}

impl CascadePreview {
    /// Regenerate for wave 0, modify afterwards; every task depends on the
    /// whole previous wave. A final verify task depends on the last wave.
    #[must_use]
    pub fn regeneration_tasks(&self) -> Vec<RegenerationTask> {
        let weakness_types = self.weakness.type_summary();
        let mut tasks: Vec<RegenerationTask> = self
            .waves
            .iter()
            .enumerate()
            .flat_map(|(wave_num, wave)| {
                let depends_on: Vec<String> = wave_num
                    .checked_sub(1)
                    .and_then(|previous| self.waves.get(previous))
                    .map(|previous| previous.iter().map(|id| task_id(id)).collect())
                    .unwrap_or_default();
                let weakness_types = weakness_types.clone();
                wave.iter().map(move |artifact_id| {
                    let (mode, description) = if wave_num == 0 {
                        (
                            TaskMode::Regenerate,
                            format!(
                                "Regenerate {artifact_id} to fix: {weakness_types}. \
                                 Maintain all existing public interfaces."
                            ),
                        )
                    } else {
                        (
                            TaskMode::Modify,
                            format!(
                                "Update {artifact_id} to be compatible with regenerated {}. \
                                 Preserve existing behavior.",
                                self.weak_node
                            ),
                        )
                    };
                    RegenerationTask {
                        id: task_id(artifact_id),
                        artifact_id: Some(artifact_id.clone()),
                        description,
                        mode,
                        target_path: Some(artifact_id.clone()),
                        depends_on: depends_on.clone(),
                        wave: Some(wave_num),
                    }
                })
            })
            .collect();

        if let Some(last) = self.waves.last() {
            tasks.push(RegenerationTask {
                id: VERIFY_TASK_ID.to_string(),
                artifact_id: None,
                description: "Run full test suite to verify cascade didn't break anything"
                    .to_string(),
                mode: TaskMode::Verify,
                target_path: None,
                depends_on: last.iter().map(|id| task_id(id)).collect(),
                wave: None,
            });
        }
        tasks
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::cascade::{EffortLevel, WeaknessScore, WeaknessSignal, WeaknessType};
    use std::collections::BTreeSet;

    fn auth_preview() -> CascadePreview {
        CascadePreview {
            weak_node: "auth".to_string(),
            weakness: WeaknessScore::new("auth", "src/auth.py")
                .with_signal(WeaknessSignal::new("auth", WeaknessType::LowCoverage, 0.7))
                .with_signal(WeaknessSignal::new("auth", WeaknessType::MissingTypes, 0.4)),
            direct_dependents: BTreeSet::from(["user".to_string()]),
            transitive_dependents: BTreeSet::from(["api".to_string(), "cli".to_string()]),
            total_impacted: 4,
            estimated_effort: EffortLevel::Medium,
            files_touched: Vec::new(),
            waves: vec![
                vec!["auth".to_string()],
                vec!["user".to_string()],
                vec!["api".to_string(), "cli".to_string()],
            ],
            risk_assessment: String::new(),
            extracted_contracts: Vec::new(),
        }
    }

    #[test]
    fn first_wave_regenerates_later_waves_modify() {
        let tasks = auth_preview().regeneration_tasks();
        assert_eq!(tasks.len(), 5);

        assert_eq!(tasks[0].id, "cascade-auth");
        assert_eq!(tasks[0].mode, TaskMode::Regenerate);
        assert!(tasks[0].depends_on.is_empty());
        assert_eq!(
            tasks[0].description,
            "Regenerate auth to fix: low_coverage, missing_types. Maintain all existing public interfaces."
        );

        assert_eq!(tasks[1].mode, TaskMode::Modify);
        assert_eq!(tasks[1].depends_on, vec!["cascade-auth"]);
        assert_eq!(
            tasks[1].description,
            "Update user to be compatible with regenerated auth. Preserve existing behavior."
        );
        assert_eq!(tasks[3].depends_on, vec!["cascade-user"]);
        assert_eq!(tasks[3].wave, Some(2));
    }

    #[test]
    fn verify_task_closes_the_cascade() {
        let tasks = auth_preview().regeneration_tasks();
        let verify = tasks.last().unwrap();
        assert_eq!(verify.id, VERIFY_TASK_ID);
        assert_eq!(verify.mode, TaskMode::Verify);
        assert_eq!(verify.depends_on, vec!["cascade-api", "cascade-cli"]);
        assert!(verify.wave.is_none());
    }
}
