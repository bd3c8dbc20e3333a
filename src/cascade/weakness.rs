use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Signals at or above this severity are critical unless stated otherwise.
pub const CRITICAL_SEVERITY: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaknessType {
    LowCoverage,
    HighComplexity,
    LintErrors,
    StaleCode,
    MissingTypes,
    BrokenContract,
}

impl WeaknessType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LowCoverage => "low_coverage",
            Self::HighComplexity => "high_complexity",
            Self::LintErrors => "lint_errors",
            Self::StaleCode => "stale_code",
            Self::MissingTypes => "missing_types",
            Self::BrokenContract => "broken_contract",
        }
    }
}

impl fmt::Display for WeaknessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for WeaknessType {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "low_coverage" => Ok(Self::LowCoverage),
            "high_complexity" => Ok(Self::HighComplexity),
            "lint_errors" => Ok(Self::LintErrors),
            "stale_code" => Ok(Self::StaleCode),
            "missing_types" => Ok(Self::MissingTypes),
            "broken_contract" => Ok(Self::BrokenContract),
            _ => Err(format!("Unknown weakness type: {value}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaknessSignal {
    pub artifact_id: String,
    pub weakness_type: WeaknessType,
    /// In `[0, 1]`.
    pub severity: f64,
    #[serde(default)]
    pub evidence: Value,
    pub critical: bool,
}

impl WeaknessSignal {
    /// Severity is clamped to `[0, 1]`; `critical` follows [`CRITICAL_SEVERITY`].
    #[must_use]
    pub fn new(artifact_id: impl Into<String>, weakness_type: WeaknessType, severity: f64) -> Self {
        let severity = severity.clamp(0.0, 1.0);
        Self {
            artifact_id: artifact_id.into(),
            weakness_type,
            severity,
            evidence: Value::Null,
            critical: severity >= CRITICAL_SEVERITY,
        }
    }

    #[must_use]
    pub fn with_evidence(mut self, evidence: Value) -> Self {
        self.evidence = evidence;
        self
    }

    #[must_use]
    pub const fn with_critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }
}

/// Everything known to be wrong with one artifact, plus how far a fix would
/// ripple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaknessScore {
    pub artifact_id: String,
    pub file_path: PathBuf,
    pub signals: Vec<WeaknessSignal>,
    pub fan_out: usize,
    pub depth: usize,
}

impl WeaknessScore {
    pub fn new(artifact_id: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            artifact_id: artifact_id.into(),
            file_path: file_path.into(),
            signals: Vec::new(),
            fan_out: 0,
            depth: 0,
        }
    }

    #[must_use]
    pub fn with_signal(mut self, signal: WeaknessSignal) -> Self {
        self.signals.push(signal);
        self
    }

    #[must_use]
    pub const fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out;
        self
    }

    #[must_use]
    pub const fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Mean signal severity; zero without signals.
    #[must_use]
    pub fn total_severity(&self) -> f64 {
        if self.signals.is_empty() {
            return 0.0;
        }
        self.signals.iter().map(|signal| signal.severity).sum::<f64>() / self.signals.len() as f64
    }

    #[must_use]
    pub fn cascade_risk(&self) -> f64 {
        self.total_severity() * (1.0 + self.fan_out as f64 / 10.0)
    }

    pub fn critical_signals(&self) -> impl Iterator<Item = &WeaknessSignal> {
        self.signals.iter().filter(|signal| signal.critical)
    }

    /// Weakness type names joined with ", ", in signal order.
    #[must_use]
    pub fn type_summary(&self) -> String {
        self.signals
            .iter()
            .map(|signal| signal.weakness_type.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn critical_defaults_from_severity() {
        assert!(WeaknessSignal::new("a", WeaknessType::LintErrors, 0.8).critical);
        assert!(!WeaknessSignal::new("a", WeaknessType::LintErrors, 0.79).critical);
        assert!(WeaknessSignal::new("a", WeaknessType::StaleCode, 0.1)
            .with_critical(true)
            .critical);
    }

    #[test]
    fn severity_is_mean_and_risk_scales_with_fan_out() {
        let score = WeaknessScore::new("auth", "src/auth.py")
            .with_signal(WeaknessSignal::new("auth", WeaknessType::LowCoverage, 0.4))
            .with_signal(WeaknessSignal::new("auth", WeaknessType::MissingTypes, 0.8))
            .with_fan_out(5);

        assert!((score.total_severity() - 0.6).abs() < 1e-9);
        assert!((score.cascade_risk() - 0.9).abs() < 1e-9);
        assert_eq!(score.type_summary(), "low_coverage, missing_types");
        assert_eq!(score.critical_signals().count(), 1);
    }

    #[test]
    fn empty_score_has_zero_severity() {
        let score = WeaknessScore::new("x", "x.py").with_fan_out(30);
        assert!(score.total_severity().abs() < f64::EPSILON);
        assert!(score.cascade_risk().abs() < f64::EPSILON);
    }

    #[test]
    fn weakness_type_parses_wire_names() {
        assert_eq!(
            WeaknessType::try_from("broken_contract"),
            Ok(WeaknessType::BrokenContract)
        );
        assert!(WeaknessType::try_from("slow").is_err());
    }
}
