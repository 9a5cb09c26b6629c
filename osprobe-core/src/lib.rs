//! osprobe-core - Evidence-Fusion Engine for OS-Family Detection
//!
//! Infers a device's operating-system family from indirect, individually
//! unreliable runtime signals. Independent signal sources each probe one
//! capability and convert the raw result into weighted observations through
//! static rule tables; the engine accumulates observation weights into a
//! per-hypothesis evidence ledger and normalizes the totals into a ranked,
//! probability-like confidence.
//!
//! Design properties:
//! - **Additive fusion**: only positive support is modeled; a signal that
//!   does not fire contributes nothing (absence is not evidence against).
//! - **Order-invariant scoring**: accumulation is commutative, so sources
//!   may be awaited concurrently without affecting the ranking.
//! - **Partial failure is never fatal**: a probe that errors or times out
//!   degrades to zero contribution; total signal loss yields the explicit
//!   "unknown" result at 0% confidence.
//!
//! Acquisition (what to probe) and presentation (how to render the report)
//! are collaborators outside this crate; see `osprobe-cli` for a host-side
//! composition root.

pub mod adapters;
pub mod config;
pub mod engine;
pub mod error;
pub mod hypothesis;
pub mod ledger;
pub mod observation;
pub mod source;
pub mod trace;

pub use adapters::{CapabilitySource, PatternRule, PatternSource, SignalRule};
pub use config::{DetectorConfig, RuleSpec, SourceKind, SourceSpec};
pub use engine::{Detection, DetectionEngine, DetectionReport, EngineOptions};
pub use error::{Error, ProbeError, Result};
pub use hypothesis::HypothesisSet;
pub use ledger::{EvidenceLedger, LedgerEntry, LedgerSnapshot};
pub use observation::Observation;
pub use source::{FnSource, SignalSource};
pub use trace::{StepOutcome, TraceStep};
