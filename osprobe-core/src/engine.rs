//! Fusion engine: drives sources, applies observations, computes the result
//!
//! One engine instance drives one run at a time over a fresh ledger. Source
//! failures and invalid observations are isolated and logged; only
//! configuration errors surface to the caller. Scoring is invariant to the
//! order sources complete in; only the step trace reflects completion order
//! when sources run concurrently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Serialize, Serializer};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::DetectorConfig;
use crate::error::{Error, ProbeError, Result};
use crate::hypothesis::HypothesisSet;
use crate::ledger::{EvidenceLedger, LedgerSnapshot};
use crate::observation::Observation;
use crate::source::SignalSource;
use crate::trace::{StepOutcome, TraceStep};

/// Engine evaluation knobs
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    /// Overlap probe awaits; trace order becomes completion order
    pub run_concurrently: bool,
    /// Per-probe deadline; a probe that misses it is a failed source
    pub probe_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            run_concurrently: true,
            probe_timeout: Duration::from_millis(2000),
        }
    }
}

impl EngineOptions {
    /// Take evaluation knobs from a detector config
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            run_concurrently: config.run_concurrently,
            probe_timeout: config.probe_timeout(),
        }
    }
}

fn serialize_hypothesis<S: Serializer>(
    hypothesis: &Option<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(hypothesis.as_deref().unwrap_or(Detection::UNKNOWN))
}

/// Final ranked result of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    /// Top-scoring hypothesis; `None` when no evidence fired at all.
    /// Serialized as the literal string "unknown" in that case.
    #[serde(serialize_with = "serialize_hypothesis")]
    pub hypothesis: Option<String>,
    /// Top hypothesis's share of the total score, 0-100
    pub confidence: u8,
}

impl Detection {
    /// Reported name of the no-evidence result
    pub const UNKNOWN: &'static str = "unknown";

    /// Hypothesis name, with the explicit "unknown" sentinel for no evidence
    pub fn hypothesis_name(&self) -> &str {
        self.hypothesis.as_deref().unwrap_or(Self::UNKNOWN)
    }
}

/// Everything a run hands to the result reporter
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    /// Run identifier (provenance only)
    pub run_id: Uuid,
    /// Completion timestamp (provenance only)
    pub completed_at: DateTime<Utc>,
    /// Ranked result
    pub detection: Detection,
    /// Immutable per-hypothesis score snapshot, in declaration order
    pub scores: LedgerSnapshot,
    /// Explainability log, one step per source invocation
    pub trace: Vec<TraceStep>,
}

type StepListener = Box<dyn Fn(&TraceStep) + Send + Sync>;

/// Evidence-fusion engine
///
/// Owns the hypothesis set and the ordered source list; the ledger lives
/// only inside `run()`. `apply()` calls happen on the single driving task,
/// so the ledger needs no lock. That property comes from the cooperative
/// scheduling model and would NOT survive a port to preemptive threads.
pub struct DetectionEngine {
    hypotheses: Arc<HypothesisSet>,
    sources: Vec<Arc<dyn SignalSource>>,
    options: EngineOptions,
    step_listener: Option<StepListener>,
    running: AtomicBool,
}

/// Clears the running flag when a run completes or is cancelled
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Completion record of one driven source, before ledger application
struct SourceCompletion {
    name: String,
    result: std::result::Result<Vec<Observation>, String>,
    elapsed: Duration,
}

impl DetectionEngine {
    /// Create an engine over a hypothesis set and an ordered source list
    ///
    /// # Errors
    /// Returns `Error::Config` when the hypothesis set is empty.
    pub fn new(
        hypotheses: Arc<HypothesisSet>,
        sources: Vec<Arc<dyn SignalSource>>,
        options: EngineOptions,
    ) -> Result<Self> {
        if hypotheses.is_empty() {
            return Err(Error::Config("engine needs a non-empty hypothesis set".to_string()));
        }
        Ok(Self {
            hypotheses,
            sources,
            options,
            step_listener: None,
            running: AtomicBool::new(false),
        })
    }

    /// Install a per-step callback, invoked once per completed source
    ///
    /// The listener sees each `TraceStep` as it is recorded (completion
    /// order under concurrency) and never sees the ledger.
    pub fn with_step_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&TraceStep) + Send + Sync + 'static,
    {
        self.step_listener = Some(Box::new(listener));
        self
    }

    /// Hypothesis set this engine classifies into
    pub fn hypotheses(&self) -> &Arc<HypothesisSet> {
        &self.hypotheses
    }

    /// Number of configured sources
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Drive every source, fuse their observations, and rank the result
    ///
    /// Probe failures, timeouts, and invalid observations degrade to zero
    /// contribution; when every source fails the report names the
    /// "unknown" hypothesis at 0% confidence rather than erroring.
    ///
    /// # Errors
    /// Returns `Error::AlreadyRunning` when a run is already in flight on
    /// this instance; the in-flight run is unaffected.
    pub async fn run(&self) -> Result<DetectionReport> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::AlreadyRunning)?;
        let _guard = RunGuard(&self.running);

        // Fresh, zero-initialized ledger per run; no carryover.
        let mut ledger = EvidenceLedger::new(Arc::clone(&self.hypotheses))?;
        let mut trace = Vec::with_capacity(self.sources.len());

        debug!(
            sources = self.sources.len(),
            concurrent = self.options.run_concurrently,
            "Starting detection run"
        );

        if self.options.run_concurrently {
            let mut pending: FuturesUnordered<_> = self
                .sources
                .iter()
                .map(|source| Self::drive_source(Arc::clone(source), self.options.probe_timeout))
                .collect();
            while let Some(completion) = pending.next().await {
                self.record(&mut ledger, &mut trace, completion);
            }
        } else {
            for source in &self.sources {
                let completion =
                    Self::drive_source(Arc::clone(source), self.options.probe_timeout).await;
                self.record(&mut ledger, &mut trace, completion);
            }
        }

        let hypothesis = ledger.top_hypothesis().map(str::to_string);
        let confidence = hypothesis
            .as_deref()
            .map(|name| ledger.confidence_of(name))
            .unwrap_or(0);

        debug!(
            hypothesis = hypothesis.as_deref().unwrap_or(Detection::UNKNOWN),
            confidence,
            fired = trace.iter().filter(|step| step.fired()).count(),
            "Detection run complete"
        );

        Ok(DetectionReport {
            run_id: Uuid::new_v4(),
            completed_at: Utc::now(),
            detection: Detection { hypothesis, confidence },
            scores: ledger.snapshot(),
            trace,
        })
    }

    /// Invoke one source under the probe deadline
    async fn drive_source(source: Arc<dyn SignalSource>, limit: Duration) -> SourceCompletion {
        let started = Instant::now();
        let result = match tokio::time::timeout(limit, source.probe()).await {
            Ok(Ok(observations)) => Ok(observations),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(ProbeError::Timeout(limit.as_millis() as u64).to_string()),
        };
        SourceCompletion {
            name: source.name().to_string(),
            result,
            elapsed: started.elapsed(),
        }
    }

    /// Fold one completed source into the ledger and the trace
    fn record(
        &self,
        ledger: &mut EvidenceLedger,
        trace: &mut Vec<TraceStep>,
        completion: SourceCompletion,
    ) {
        let outcome = match completion.result {
            Ok(observations) => {
                let mut applied = Vec::with_capacity(observations.len());
                for observation in observations {
                    match ledger.apply(&observation) {
                        Ok(()) => {
                            debug!(
                                source = completion.name.as_str(),
                                label = observation.label.as_str(),
                                weight = observation.weight,
                                "Observation applied"
                            );
                            applied.push(observation);
                        }
                        // A buggy adapter must not corrupt or abort the fusion:
                        // drop the offending observation and keep going.
                        Err(e) => {
                            warn!(
                                source = completion.name.as_str(),
                                error = %e,
                                "Dropping out-of-contract observation"
                            );
                        }
                    }
                }
                if applied.is_empty() {
                    StepOutcome::NoSignal
                } else {
                    StepOutcome::Fired { observations: applied }
                }
            }
            Err(reason) => {
                warn!(
                    source = completion.name.as_str(),
                    reason = reason.as_str(),
                    "Source probe failed (isolated, run continues)"
                );
                StepOutcome::Failed { reason }
            }
        };

        let step = TraceStep {
            source: completion.name,
            outcome,
            elapsed_ms: completion.elapsed.as_millis() as u64,
        };
        if let Some(listener) = &self.step_listener {
            listener(&step);
        }
        trace.push(step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::mock::MockSource;

    fn abc() -> Arc<HypothesisSet> {
        HypothesisSet::new(["a", "b", "c"]).unwrap().into_shared()
    }

    fn engine(sources: Vec<Arc<dyn SignalSource>>, options: EngineOptions) -> DetectionEngine {
        DetectionEngine::new(abc(), sources, options).unwrap()
    }

    #[tokio::test]
    async fn test_run_fuses_observations_into_ranked_result() {
        let sources: Vec<Arc<dyn SignalSource>> = vec![
            Arc::new(MockSource::firing(
                "s1",
                vec![Observation::new("a signal", 8.0, ["a"])],
            )),
            Arc::new(MockSource::firing(
                "s2",
                vec![Observation::new("ab signal", 6.0, ["a", "b"])],
            )),
            Arc::new(MockSource::firing(
                "s3",
                vec![Observation::new("c signal", 2.0, ["c"])],
            )),
        ];
        let report = engine(sources, EngineOptions::default()).run().await.unwrap();

        assert_eq!(report.detection.hypothesis_name(), "a");
        assert_eq!(report.detection.confidence, 64);
        assert_eq!(report.scores.score_of("a"), Some(14.0));
        assert_eq!(report.scores.score_of("b"), Some(6.0));
        assert_eq!(report.scores.score_of("c"), Some(2.0));
        assert_eq!(report.trace.len(), 3);
        assert!(report.trace.iter().all(|step| step.fired()));
    }

    #[tokio::test]
    async fn test_run_with_no_fired_signal_reports_unknown() {
        let sources: Vec<Arc<dyn SignalSource>> = vec![
            Arc::new(MockSource::silent("s1")),
            Arc::new(MockSource::failing("s2")),
        ];
        let report = engine(sources, EngineOptions::default()).run().await.unwrap();

        assert_eq!(report.detection.hypothesis, None);
        assert_eq!(report.detection.hypothesis_name(), "unknown");
        assert_eq!(report.detection.confidence, 0);
        assert_eq!(report.scores.total(), 0.0);
    }

    #[tokio::test]
    async fn test_failing_source_is_isolated() {
        let with_failure: Vec<Arc<dyn SignalSource>> = vec![
            Arc::new(MockSource::firing(
                "good",
                vec![Observation::new("a signal", 5.0, ["a"])],
            )),
            Arc::new(MockSource::failing("bad")),
        ];
        let without: Vec<Arc<dyn SignalSource>> = vec![Arc::new(MockSource::firing(
            "good",
            vec![Observation::new("a signal", 5.0, ["a"])],
        ))];

        let with_report = engine(with_failure, EngineOptions::default()).run().await.unwrap();
        let without_report = engine(without, EngineOptions::default()).run().await.unwrap();

        assert_eq!(with_report.detection, without_report.detection);
        assert_eq!(with_report.scores, without_report.scores);
        let failed = with_report
            .trace
            .iter()
            .find(|step| step.source == "bad")
            .unwrap();
        assert!(matches!(failed.outcome, StepOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_invalid_observation_dropped_run_continues() {
        let sources: Vec<Arc<dyn SignalSource>> = vec![Arc::new(MockSource::firing(
            "mixed",
            vec![
                Observation::new("unknown hypothesis", 4.0, ["zz"]),
                Observation::new("valid", 3.0, ["b"]),
            ],
        ))];
        let report = engine(sources, EngineOptions::default()).run().await.unwrap();

        assert_eq!(report.detection.hypothesis_name(), "b");
        assert_eq!(report.scores.score_of("b"), Some(3.0));
        // Only the valid observation appears in the trace.
        assert_eq!(report.trace[0].observations().len(), 1);
    }

    #[tokio::test]
    async fn test_slow_probe_times_out_without_hanging_run() {
        let options = EngineOptions {
            run_concurrently: true,
            probe_timeout: Duration::from_millis(50),
        };
        let sources: Vec<Arc<dyn SignalSource>> = vec![
            Arc::new(
                MockSource::firing("slow", vec![Observation::new("late", 9.0, ["c"])])
                    .with_delay(Duration::from_secs(30)),
            ),
            Arc::new(MockSource::firing(
                "fast",
                vec![Observation::new("a signal", 2.0, ["a"])],
            )),
        ];

        let report = engine(sources, options).run().await.unwrap();

        assert_eq!(report.detection.hypothesis_name(), "a");
        assert_eq!(report.scores.score_of("c"), Some(0.0));
        let slow = report.trace.iter().find(|step| step.source == "slow").unwrap();
        match &slow.outcome {
            StepOutcome::Failed { reason } => assert!(reason.contains("timed out")),
            other => panic!("expected timeout failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reentrant_run_rejected_while_in_flight() {
        let sources: Vec<Arc<dyn SignalSource>> = vec![Arc::new(
            MockSource::firing("slow", vec![Observation::new("a signal", 1.0, ["a"])])
                .with_delay(Duration::from_millis(300)),
        )];
        let engine = Arc::new(engine(sources, EngineOptions::default()));

        let first = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.run().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = engine.run().await;
        assert!(matches!(second, Err(Error::AlreadyRunning)));

        // The in-flight run is unaffected by the rejected request.
        let report = first.await.unwrap().unwrap();
        assert_eq!(report.detection.hypothesis_name(), "a");

        // Once the first run completes the engine accepts a new run.
        assert!(engine.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_sequential_trace_preserves_submission_order() {
        let options = EngineOptions {
            run_concurrently: false,
            probe_timeout: Duration::from_millis(500),
        };
        let sources: Vec<Arc<dyn SignalSource>> = vec![
            Arc::new(
                MockSource::firing("slow-first", vec![Observation::new("a", 1.0, ["a"])])
                    .with_delay(Duration::from_millis(80)),
            ),
            Arc::new(MockSource::firing(
                "fast-second",
                vec![Observation::new("b", 1.0, ["b"])],
            )),
        ];
        let report = engine(sources, options).run().await.unwrap();

        let order: Vec<&str> = report.trace.iter().map(|step| step.source.as_str()).collect();
        assert_eq!(order, vec!["slow-first", "fast-second"]);
    }

    #[tokio::test]
    async fn test_concurrent_trace_is_completion_order_scoring_unaffected() {
        let options = EngineOptions {
            run_concurrently: true,
            probe_timeout: Duration::from_millis(500),
        };
        let sources: Vec<Arc<dyn SignalSource>> = vec![
            Arc::new(
                MockSource::firing("slow-first", vec![Observation::new("a", 3.0, ["a"])])
                    .with_delay(Duration::from_millis(80)),
            ),
            Arc::new(MockSource::firing(
                "fast-second",
                vec![Observation::new("b", 1.0, ["b"])],
            )),
        ];
        let report = engine(sources, options).run().await.unwrap();

        let order: Vec<&str> = report.trace.iter().map(|step| step.source.as_str()).collect();
        assert_eq!(order, vec!["fast-second", "slow-first"], "trace is completion order");
        // Scoring does not depend on completion order.
        assert_eq!(report.detection.hypothesis_name(), "a");
        assert_eq!(report.detection.confidence, 75);
    }

    #[tokio::test]
    async fn test_step_listener_sees_every_step() {
        use std::sync::Mutex;

        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sources: Vec<Arc<dyn SignalSource>> = vec![
            Arc::new(MockSource::firing(
                "s1",
                vec![Observation::new("a", 1.0, ["a"])],
            )),
            Arc::new(MockSource::silent("s2")),
            Arc::new(MockSource::failing("s3")),
        ];
        let options = EngineOptions {
            run_concurrently: false,
            ..EngineOptions::default()
        };
        let engine = DetectionEngine::new(abc(), sources, options)
            .unwrap()
            .with_step_listener(move |step| {
                sink.lock().unwrap().push(step.source.clone());
            });

        engine.run().await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["s1", "s2", "s3"]);
    }

    #[tokio::test]
    async fn test_engine_without_sources_reports_unknown() {
        let report = engine(Vec::new(), EngineOptions::default()).run().await.unwrap();
        assert_eq!(report.detection.hypothesis, None);
        assert_eq!(report.detection.confidence, 0);
        assert!(report.trace.is_empty());
    }

    #[test]
    fn test_detection_serializes_unknown_sentinel() {
        let detection = Detection {
            hypothesis: None,
            confidence: 0,
        };
        let json = serde_json::to_string(&detection).unwrap();
        assert_eq!(json, r#"{"hypothesis":"unknown","confidence":0}"#);
    }
}
