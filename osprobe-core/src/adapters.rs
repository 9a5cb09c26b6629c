//! Rule-table adapters: per-signal-family observation sources
//!
//! Each adapter wraps one black-box probe (a capability presence check or a
//! platform/render-stack string read) and converts its raw result into
//! zero-or-one observation through a static rule table. Adapters hold no
//! reference to the ledger and no mutable state of their own.

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::error::ProbeError;
use crate::observation::Observation;
use crate::source::SignalSource;

/// One `condition → (weight, hypothesis set, label)` rule-table entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRule {
    /// Evidence strength when this rule fires
    pub weight: f64,
    /// Hypotheses the fired signal supports
    pub hypotheses: Vec<String>,
    /// Human-readable signal description
    pub label: String,
}

impl SignalRule {
    /// Create a rule-table entry
    pub fn new<L, I, S>(label: L, weight: f64, hypotheses: I) -> Self
    where
        L: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            weight,
            hypotheses: hypotheses.into_iter().map(Into::into).collect(),
            label: label.into(),
        }
    }

    /// Instantiate the observation this rule fires
    pub fn observation(&self, detail: Option<String>) -> Observation {
        let mut observation =
            Observation::new(self.label.clone(), self.weight, self.hypotheses.clone());
        if let Some(detail) = detail {
            observation = observation.with_detail(detail);
        }
        observation
    }
}

type BoolProbe = Box<dyn Fn() -> BoxFuture<'static, Result<bool, ProbeError>> + Send + Sync>;
type StringProbe =
    Box<dyn Fn() -> BoxFuture<'static, Result<Option<String>, ProbeError>> + Send + Sync>;

/// Presence-check adapter: a boolean probe with a single rule
///
/// Fires its rule at full weight when the capability is present, nothing
/// otherwise (no partial credit).
pub struct CapabilitySource {
    name: String,
    rule: SignalRule,
    probe_fn: BoolProbe,
}

impl CapabilitySource {
    /// Wrap a boolean capability probe
    pub fn new<F, Fut>(name: impl Into<String>, rule: SignalRule, probe_fn: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<bool, ProbeError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            rule,
            probe_fn: Box::new(move || probe_fn().boxed()),
        }
    }
}

#[async_trait]
impl SignalSource for CapabilitySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> Result<Vec<Observation>, ProbeError> {
        if (self.probe_fn)().await? {
            Ok(vec![self.rule.observation(None)])
        } else {
            Ok(Vec::new())
        }
    }
}

/// One token → rule entry in a pattern adapter's table
///
/// Built through `new()` only, which lowercases the token; config-level
/// rules reach this type via `RuleSpec::pattern_rule()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternRule {
    /// Lowercase substring token the raw string is tested against
    pub token: String,
    #[serde(flatten)]
    pub rule: SignalRule,
}

impl PatternRule {
    /// Create a token-keyed rule-table entry
    pub fn new(token: impl Into<String>, rule: SignalRule) -> Self {
        Self {
            token: token.into().to_lowercase(),
            rule,
        }
    }
}

/// String-matching adapter: a string probe with an ordered rule table
///
/// The raw string is lowercased and tested against each rule's token in
/// table order; the first matching rule fires, so an adapter yields
/// zero-or-one observation per run. `Ok(None)` from the probe means the
/// platform string is simply absent: a clean no-signal, not a failure.
pub struct PatternSource {
    name: String,
    rules: Vec<PatternRule>,
    probe_fn: StringProbe,
}

impl PatternSource {
    /// Wrap a string-valued probe with its rule table
    pub fn new<F, Fut>(name: impl Into<String>, rules: Vec<PatternRule>, probe_fn: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Option<String>, ProbeError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            rules,
            probe_fn: Box::new(move || probe_fn().boxed()),
        }
    }
}

#[async_trait]
impl SignalSource for PatternSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> Result<Vec<Observation>, ProbeError> {
        let raw = match (self.probe_fn)().await? {
            Some(raw) => raw,
            None => return Ok(Vec::new()),
        };
        let haystack = raw.to_lowercase();
        for entry in &self.rules {
            if haystack.contains(&entry.token) {
                let detail = format!("matched '{}' in '{}'", entry.token, raw.trim());
                return Ok(vec![entry.rule.observation(Some(detail))]);
            }
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_capability_fires_single_rule_when_present() {
        let rule = SignalRule::new("touch points reported", 3.0, ["android", "ios"]);
        let source = CapabilitySource::new("touch-capability", rule, || async {
            Ok::<_, ProbeError>(true)
        });
        let observations = source.probe().await.unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].weight, 3.0);
        assert_eq!(observations[0].hypotheses, vec!["android", "ios"]);
    }

    #[tokio::test]
    async fn test_capability_absent_produces_no_observation() {
        let rule = SignalRule::new("touch points reported", 3.0, ["android"]);
        let source = CapabilitySource::new("touch-capability", rule, || async {
            Ok::<_, ProbeError>(false)
        });
        assert!(source.probe().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pattern_first_matching_rule_wins() {
        let rules = vec![
            PatternRule::new("iphone", SignalRule::new("iphone token", 9.0, ["ios"])),
            PatternRule::new("mac", SignalRule::new("mac token", 7.0, ["macos"])),
        ];
        // "iphone" appears before "mac" in the table, so it wins even though
        // both tokens occur in the raw string.
        let source = PatternSource::new("platform-string", rules, || async {
            Ok::<_, ProbeError>(Some("iPhone Mac OS X".to_string()))
        });
        let observations = source.probe().await.unwrap();
        assert_eq!(observations.len(), 1, "zero-or-one observation per adapter");
        assert_eq!(observations[0].label, "iphone token");
        assert!(observations[0].detail.as_deref().unwrap().contains("iphone"));
    }

    #[test]
    fn test_pattern_rule_constructor_lowercases_token() {
        let rule = PatternRule::new("WIN", SignalRule::new("win token", 8.0, ["windows"]));
        assert_eq!(rule.token, "win");
    }

    #[tokio::test]
    async fn test_pattern_match_is_case_insensitive() {
        let rules = vec![PatternRule::new(
            "WIN",
            SignalRule::new("win token", 8.0, ["windows"]),
        )];
        let source = PatternSource::new("platform-string", rules, || async {
            Ok::<_, ProbeError>(Some("Windows NT 10.0".to_string()))
        });
        let observations = source.probe().await.unwrap();
        assert_eq!(observations[0].hypotheses, vec!["windows"]);
    }

    #[tokio::test]
    async fn test_pattern_absent_string_is_clean_no_signal() {
        let rules = vec![PatternRule::new(
            "win",
            SignalRule::new("win token", 8.0, ["windows"]),
        )];
        let source = PatternSource::new("platform-string", rules, || async {
            Ok::<_, ProbeError>(None)
        });
        assert!(source.probe().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pattern_no_token_match_produces_no_observation() {
        let rules = vec![PatternRule::new(
            "win",
            SignalRule::new("win token", 8.0, ["windows"]),
        )];
        let source = PatternSource::new("platform-string", rules, || async {
            Ok::<_, ProbeError>(Some("SunOS".to_string()))
        });
        assert!(source.probe().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_probe_error_propagates_to_caller() {
        let rules = vec![PatternRule::new(
            "win",
            SignalRule::new("win token", 8.0, ["windows"]),
        )];
        let source = PatternSource::new("platform-string", rules, || async {
            Err::<Option<String>, _>(ProbeError::Unavailable("gated".to_string()))
        });
        assert!(source.probe().await.is_err());
    }
}
