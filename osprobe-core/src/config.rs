//! Detector configuration: hypothesis set, engine knobs, and rule tables
//!
//! Configuration is static: it names the hypotheses, selects sequential or
//! concurrent source evaluation, bounds each probe's wall time, and carries
//! the per-source `condition → (weight, hypotheses, label)` rule tables.
//! Probes themselves are code; config binds to them by source name.
//!
//! Resolution is file-if-given → built-in default; validation failures are
//! `Error::Config` and fatal before any run starts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adapters::{PatternRule, SignalRule};
use crate::error::{Error, Result};
use crate::hypothesis::HypothesisSet;

fn default_run_concurrently() -> bool {
    true
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

/// Top-level detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Hypothesis names in declaration (tie-break) order
    pub hypotheses: Vec<String>,

    /// Overlap probe awaits (true) or await sources one at a time (false).
    /// Sequential evaluation gives a deterministic trace order.
    #[serde(default = "default_run_concurrently")]
    pub run_concurrently: bool,

    /// Per-probe deadline; a probe that does not settle in time is treated
    /// as a failed, non-firing source
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Source descriptors in evaluation-submission order
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceSpec>,
}

/// One configured observation source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Source name; also the key the composition root binds a probe to
    pub name: String,
    /// Adapter family this source uses
    pub kind: SourceKind,
    /// Rule table (exactly one rule for `capability`, one or more for `pattern`)
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleSpec>,
}

/// Adapter family of a configured source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Boolean presence check; fires its single rule when present
    Capability,
    /// String probe matched against token-keyed rules, first match wins
    Pattern,
}

/// One configured rule-table entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Substring token (pattern sources only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Evidence strength when the rule fires
    pub weight: f64,
    /// Hypotheses the fired signal supports
    pub hypotheses: Vec<String>,
    /// Human-readable signal description
    pub label: String,
}

impl RuleSpec {
    /// Convert into the adapter-level rule
    pub fn signal_rule(&self) -> SignalRule {
        SignalRule::new(self.label.clone(), self.weight, self.hypotheses.clone())
    }

    /// Convert into a token-keyed pattern rule (token must be present)
    pub fn pattern_rule(&self) -> Option<PatternRule> {
        self.token
            .as_ref()
            .map(|token| PatternRule::new(token.clone(), self.signal_rule()))
    }
}

impl DetectorConfig {
    /// Parse and validate a TOML configuration document
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: DetectorConfig =
            toml::from_str(raw).map_err(|e| Error::Config(format!("TOML parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Build the hypothesis set declared by this config
    pub fn hypothesis_set(&self) -> Result<HypothesisSet> {
        HypothesisSet::new(self.hypotheses.iter().cloned())
    }

    /// Per-probe deadline as a duration
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Validate structural invariants
    ///
    /// # Errors
    /// Returns `Error::Config` on: empty or duplicated hypothesis names,
    /// blank or duplicated source names, a capability source without
    /// exactly one rule, a pattern rule without a token, a non-positive
    /// rule weight, an empty rule hypothesis list, or a rule referencing a
    /// hypothesis outside the declared set or repeating one.
    pub fn validate(&self) -> Result<()> {
        let hypotheses = self.hypothesis_set()?;

        if self.probe_timeout_ms == 0 {
            return Err(Error::Config("probe_timeout_ms must be > 0".to_string()));
        }

        let mut seen_names: Vec<&str> = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(Error::Config("source name must not be blank".to_string()));
            }
            if seen_names.contains(&source.name.as_str()) {
                return Err(Error::Config(format!("duplicate source '{}'", source.name)));
            }
            seen_names.push(&source.name);

            match source.kind {
                SourceKind::Capability => {
                    if source.rules.len() != 1 {
                        return Err(Error::Config(format!(
                            "capability source '{}' must have exactly one rule, found {}",
                            source.name,
                            source.rules.len()
                        )));
                    }
                }
                SourceKind::Pattern => {
                    if source.rules.is_empty() {
                        return Err(Error::Config(format!(
                            "pattern source '{}' must have at least one rule",
                            source.name
                        )));
                    }
                }
            }

            for rule in &source.rules {
                if source.kind == SourceKind::Pattern
                    && rule.token.as_deref().map_or(true, |t| t.trim().is_empty())
                {
                    return Err(Error::Config(format!(
                        "pattern rule '{}' in source '{}' needs a non-empty token",
                        rule.label, source.name
                    )));
                }
                if !(rule.weight.is_finite() && rule.weight > 0.0) {
                    return Err(Error::Config(format!(
                        "rule '{}' in source '{}' has non-positive weight {}",
                        rule.label, source.name, rule.weight
                    )));
                }
                if rule.hypotheses.is_empty() {
                    return Err(Error::Config(format!(
                        "rule '{}' in source '{}' supports no hypotheses",
                        rule.label, source.name
                    )));
                }
                let mut seen_hypotheses: Vec<&str> = Vec::with_capacity(rule.hypotheses.len());
                for name in &rule.hypotheses {
                    if !hypotheses.contains(name) {
                        return Err(Error::Config(format!(
                            "rule '{}' in source '{}' references unknown hypothesis '{}'",
                            rule.label, source.name, name
                        )));
                    }
                    if seen_hypotheses.contains(&name.as_str()) {
                        return Err(Error::Config(format!(
                            "rule '{}' in source '{}' repeats hypothesis '{}'",
                            rule.label, source.name, name
                        )));
                    }
                    seen_hypotheses.push(name);
                }
            }
        }
        Ok(())
    }

    /// Built-in OS-family detection tables
    ///
    /// Source names match the probe registry of the composition root.
    /// Token order inside pattern tables matters: android strings usually
    /// contain "linux", and ChromeOS strings are Linux underneath, so the
    /// more specific tokens come first.
    pub fn default_os_detection() -> Self {
        let capability = |name: &str, rule: RuleSpec| SourceSpec {
            name: name.to_string(),
            kind: SourceKind::Capability,
            rules: vec![rule],
        };
        let rule = |token: Option<&str>, weight: f64, hypotheses: &[&str], label: &str| RuleSpec {
            token: token.map(str::to_string),
            weight,
            hypotheses: hypotheses.iter().map(|h| h.to_string()).collect(),
            label: label.to_string(),
        };

        Self {
            hypotheses: ["windows", "macos", "linux", "android", "ios", "chromeos"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            run_concurrently: default_run_concurrently(),
            probe_timeout_ms: default_probe_timeout_ms(),
            sources: vec![
                SourceSpec {
                    name: "platform-string".to_string(),
                    kind: SourceKind::Pattern,
                    rules: vec![
                        rule(Some("windows"), 8.0, &["windows"], "declared platform names Windows"),
                        rule(Some("msys"), 7.0, &["windows"], "declared platform names an MSYS environment"),
                        rule(Some("cygwin"), 7.0, &["windows"], "declared platform names a Cygwin environment"),
                        rule(
                            Some("darwin"),
                            6.0,
                            &["macos", "ios"],
                            "declared platform names Darwin (shared by macOS and iOS)",
                        ),
                        rule(Some("android"), 9.0, &["android"], "declared platform names Android"),
                        rule(Some("cros"), 8.0, &["chromeos"], "declared platform names ChromeOS"),
                        rule(Some("linux"), 7.0, &["linux"], "declared platform names Linux"),
                    ],
                },
                SourceSpec {
                    name: "os-release".to_string(),
                    kind: SourceKind::Pattern,
                    rules: vec![
                        rule(Some("chromium os"), 9.0, &["chromeos"], "os-release identifies Chromium OS"),
                        rule(Some("android"), 9.0, &["android"], "os-release identifies Android"),
                        rule(Some("linux"), 6.0, &["linux"], "os-release identifies a Linux distribution"),
                    ],
                },
                SourceSpec {
                    name: "display-server".to_string(),
                    kind: SourceKind::Pattern,
                    rules: vec![
                        rule(
                            Some("wayland"),
                            2.0,
                            &["linux", "chromeos"],
                            "Wayland session (common to Linux and ChromeOS)",
                        ),
                        rule(Some("x11"), 2.0, &["linux"], "X11 session"),
                    ],
                },
                capability(
                    "windows-system-root",
                    rule(None, 7.0, &["windows"], "Windows system root present"),
                ),
                capability(
                    "macos-core-services",
                    rule(None, 7.0, &["macos"], "macOS CoreServices directory present"),
                ),
                capability(
                    "linux-procfs",
                    rule(
                        None,
                        5.0,
                        &["linux", "android", "chromeos"],
                        "procfs present (shared by Linux-kernel platforms)",
                    ),
                ),
                capability(
                    "android-runtime",
                    rule(None, 8.0, &["android"], "Android runtime root present"),
                ),
            ],
        }
    }
}
