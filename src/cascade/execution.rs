use serde::{Deserialize, Serialize};

use crate::config::CascadeSettings;
use crate::ports::VerificationSignal;

use super::CascadePreview;

/// Waves scoring at or above this are safe to continue from.
pub const CONTINUE_THRESHOLD: f64 = 0.7;

const TESTS_POINTS: u32 = 40;
const TYPES_POINTS: u32 = 20;
const LINT_POINTS: u32 = 10;
const CONTRACTS_POINTS: u32 = 30;

/// Verification outcome for one completed wave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveConfidence {
    pub wave_num: usize,
    pub artifacts: Vec<String>,
    pub tests_passed: bool,
    pub types_clean: bool,
    pub lint_clean: bool,
    pub contracts_preserved: bool,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub deductions: Vec<String>,
    /// `axis: text` for each failing axis that reported diagnostics.
    pub diagnostics: Vec<String>,
}

impl WaveConfidence {
    /// Weighted score: tests 0.4, types 0.2, lint 0.1, contracts 0.3.
    #[must_use]
    pub fn compute(
        wave_num: usize,
        artifacts: Vec<String>,
        tests: &VerificationSignal,
        types: &VerificationSignal,
        lint: &VerificationSignal,
        contracts_preserved: bool,
    ) -> Self {
        let mut points = 0;
        let mut deductions = Vec::new();
        let mut diagnostics = Vec::new();

        let axes = [
            ("tests", tests, TESTS_POINTS, "Tests failed"),
            ("types", types, TYPES_POINTS, "Type errors"),
            ("lint", lint, LINT_POINTS, "Lint errors"),
        ];
        for (axis, signal, weight, label) in axes {
            if signal.passed {
                points += weight;
            } else {
                deductions.push(format!("{label} (-{weight}%)"));
                if !signal.diagnostics.is_empty() {
                    diagnostics.push(format!("{axis}: {}", signal.diagnostics));
                }
            }
        }
        if contracts_preserved {
            points += CONTRACTS_POINTS;
        } else {
            deductions.push(format!("Contract changed (-{CONTRACTS_POINTS}%)"));
        }

        Self {
            wave_num,
            artifacts,
            tests_passed: tests.passed,
            types_clean: types.passed,
            lint_clean: lint.passed,
            contracts_preserved,
            confidence: f64::from(points) / 100.0,
            deductions,
            diagnostics,
        }
    }

    #[must_use]
    pub fn should_continue(&self) -> bool {
        self.confidence >= CONTINUE_THRESHOLD
    }
}

/// Mutable state of one cascade run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeExecution {
    pub preview: CascadePreview,
    pub current_wave: usize,
    pub wave_confidences: Vec<WaveConfidence>,
    pub auto_approve: bool,
    pub confidence_threshold: f64,
    pub max_consecutive_low_confidence: u32,
    pub consecutive_low_confidence_count: u32,
    pub escalated_to_human: bool,
    pub paused_for_approval: bool,
    pub completed: bool,
    pub aborted: bool,
    pub abort_reason: Option<String>,
}

impl CascadeExecution {
    #[must_use]
    pub fn new(preview: CascadePreview, auto_approve: bool, settings: &CascadeSettings) -> Self {
        Self {
            preview,
            current_wave: 0,
            wave_confidences: Vec::new(),
            auto_approve,
            confidence_threshold: settings.confidence_threshold,
            max_consecutive_low_confidence: settings.max_consecutive_low_confidence,
            consecutive_low_confidence_count: 0,
            escalated_to_human: false,
            paused_for_approval: false,
            completed: false,
            aborted: false,
            abort_reason: None,
        }
    }

    /// Mean wave confidence, 1.0 before any wave ran.
    #[must_use]
    pub fn overall_confidence(&self) -> f64 {
        if self.wave_confidences.is_empty() {
            return 1.0;
        }
        self.wave_confidences
            .iter()
            .map(|wave| wave.confidence)
            .sum::<f64>()
            / self.wave_confidences.len() as f64
    }

    /// Index of the first wave that has not run yet.
    #[must_use]
    pub fn next_wave(&self) -> usize {
        self.wave_confidences.len()
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.completed || self.aborted
    }

    pub fn approve_wave(&mut self) {
        self.paused_for_approval = false;
    }

    pub fn abort(&mut self, reason: impl Into<String>) {
        self.aborted = true;
        self.abort_reason = Some(reason.into());
    }

    pub fn record_wave_completion(&mut self, confidence: WaveConfidence) {
        let low = confidence.confidence < self.confidence_threshold;
        self.current_wave = confidence.wave_num;
        self.wave_confidences.push(confidence);

        if low {
            self.consecutive_low_confidence_count += 1;
            if self.consecutive_low_confidence_count >= self.max_consecutive_low_confidence {
                self.escalated_to_human = true;
                self.auto_approve = false;
            }
            self.paused_for_approval = true;
        } else {
            self.consecutive_low_confidence_count = 0;
            if !self.auto_approve {
                self.paused_for_approval = true;
            }
        }

        if self.current_wave + 1 >= self.preview.waves.len() {
            self.completed = true;
        }
    }
}
