//! Verdict bands and remediation lookup.

use serde::{Deserialize, Serialize};

use super::{CategoryScore, CheckOutcome};
use crate::error::{PreflightError, Result};

/// Deployment decision for a composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Ready,
    ReadyWithWarnings,
    NotReady,
}

impl Verdict {
    /// Ready or ReadyWithWarnings.
    pub fn is_deployable(&self) -> bool {
        !matches!(self, Self::NotReady)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::ReadyWithWarnings => "READY WITH WARNINGS",
            Self::NotReady => "NOT READY",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::ReadyWithWarnings => write!(f, "ready_with_warnings"),
            Self::NotReady => write!(f, "not_ready"),
        }
    }
}

/// Lower bounds (inclusive) of the two deployable bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadinessBands {
    #[serde(default = "default_ready")]
    pub ready: f64,
    #[serde(default = "default_warnings")]
    pub warnings: f64,
}

impl Default for ReadinessBands {
    fn default() -> Self {
        Self {
            ready: default_ready(),
            warnings: default_warnings(),
        }
    }
}

fn default_ready() -> f64 {
    85.0
}

fn default_warnings() -> f64 {
    70.0
}

impl ReadinessBands {
    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        if !in_range(self.ready) || !in_range(self.warnings) || self.warnings > self.ready {
            return Err(PreflightError::invalid_configuration(format!(
                "readiness bands must satisfy 0 <= warnings ({}) <= ready ({}) <= 100",
                self.warnings, self.ready
            )));
        }
        Ok(())
    }
}

/// Map a composite score to a verdict.
pub fn classify(score: f64, bands: &ReadinessBands) -> Verdict {
    if score >= bands.ready {
        Verdict::Ready
    } else if score >= bands.warnings {
        Verdict::ReadyWithWarnings
    } else {
        Verdict::NotReady
    }
}

/// One remediation per non-passing category, in declaration order.
pub fn recommendations(scores: &[CategoryScore]) -> Vec<String> {
    let mut ordered: Vec<&CategoryScore> = scores
        .iter()
        .filter(|s| s.status != CheckOutcome::Pass)
        .collect();
    ordered.sort_by_key(|s| s.category.position());
    ordered
        .into_iter()
        .map(|s| s.category.remediation().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readiness::Category;

    fn bands() -> ReadinessBands {
        ReadinessBands::default()
    }

    #[test]
    fn test_band_boundaries() {
        assert_eq!(classify(100.0, &bands()), Verdict::Ready);
        assert_eq!(classify(85.0, &bands()), Verdict::Ready);
        assert_eq!(classify(84.999, &bands()), Verdict::ReadyWithWarnings);
        assert_eq!(classify(70.0, &bands()), Verdict::ReadyWithWarnings);
        assert_eq!(classify(69.999, &bands()), Verdict::NotReady);
        assert_eq!(classify(0.0, &bands()), Verdict::NotReady);
    }

    #[test]
    fn test_custom_bands() {
        let bands = ReadinessBands {
            ready: 95.0,
            warnings: 50.0,
        };
        assert_eq!(classify(90.0, &bands), Verdict::ReadyWithWarnings);
        assert_eq!(classify(50.0, &bands), Verdict::ReadyWithWarnings);
        assert!(bands.validate().is_ok());
    }

    #[test]
    fn test_inverted_bands_rejected() {
        let bands = ReadinessBands {
            ready: 60.0,
            warnings: 70.0,
        };
        assert!(bands.validate().is_err());
    }

    #[test]
    fn test_recommendations_follow_declaration_order() {
        let scores = vec![
            CategoryScore::new(Category::Performance, CheckOutcome::Warning, 10.0),
            CategoryScore::new(Category::Environment, CheckOutcome::Pass, 20.0),
            CategoryScore::new(Category::Security, CheckOutcome::Fail, 15.0),
        ];
        let recs = recommendations(&scores);
        assert_eq!(
            recs,
            vec![
                Category::Security.remediation().to_string(),
                Category::Performance.remediation().to_string(),
            ]
        );
    }

    #[test]
    fn test_no_recommendations_when_all_pass() {
        let scores: Vec<CategoryScore> = Category::ALL
            .iter()
            .map(|c| CategoryScore::new(*c, CheckOutcome::Pass, c.default_weight()))
            .collect();
        assert!(recommendations(&scores).is_empty());
    }

    #[test]
    fn test_verdict_display() {
        assert_eq!(Verdict::ReadyWithWarnings.to_string(), "ready_with_warnings");
        assert!(Verdict::ReadyWithWarnings.is_deployable());
        assert!(!Verdict::NotReady.is_deployable());
    }
}
