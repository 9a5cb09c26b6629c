//! Observation: one fired piece of weighted evidence
//!
//! An observation names the hypotheses it supports, a fixed positive weight,
//! and a human-readable label for the trace. A signal that did not fire
//! produces no observation at all; absence is not evidence in this model.

use serde::{Deserialize, Serialize};

/// One fired piece of evidence
///
/// Weight is a static property of the signal kind, not of the observed
/// value: a signal fires with its full weight or not at all. An observation
/// may support several hypotheses at once when the underlying signal does
/// not discriminate between close platform variants (e.g. a Darwin token
/// supporting both macos and ios).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Hypotheses this observation supports
    pub hypotheses: Vec<String>,
    /// Strength of this piece of evidence (must be > 0)
    pub weight: f64,
    /// Human-readable signal description (trace only, never scored)
    pub label: String,
    /// Optional matched-value detail (trace only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Observation {
    /// Create a new observation
    pub fn new<L, I, S>(label: L, weight: f64, hypotheses: I) -> Self
    where
        L: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hypotheses: hypotheses.into_iter().map(Into::into).collect(),
            weight,
            label: label.into(),
            detail: None,
        }
    }

    /// Attach a matched-value detail for the trace
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_collects_hypotheses() {
        let obs = Observation::new("darwin token", 8.0, ["macos", "ios"]);
        assert_eq!(obs.hypotheses, vec!["macos", "ios"]);
        assert_eq!(obs.weight, 8.0);
        assert!(obs.detail.is_none());
    }

    #[test]
    fn test_with_detail() {
        let obs = Observation::new("token", 1.0, ["linux"]).with_detail("matched 'gnu'");
        assert_eq!(obs.detail.as_deref(), Some("matched 'gnu'"));
    }

    #[test]
    fn test_serialization_omits_empty_detail() {
        let obs = Observation::new("token", 2.0, ["linux"]);
        let json = serde_json::to_string(&obs).unwrap();
        assert!(!json.contains("detail"));
    }
}
