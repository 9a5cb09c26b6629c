//! Evidence Ledger: per-hypothesis accumulated scores for one detection run
//!
//! The ledger is the only mutable state of a run. Mutation is strictly
//! additive through `apply()`: scores never decrease and no hypothesis is
//! ever removed. Accumulation is commutative, so the final ranking does not
//! depend on the order observations arrive in (only the step trace does).

use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::hypothesis::HypothesisSet;
use crate::observation::Observation;

/// Accumulator mapping hypothesis → total score for one detection run
///
/// Created fresh at the start of a run and either discarded or retained
/// read-only once the run completes; there is no carryover across runs.
#[derive(Debug)]
pub struct EvidenceLedger {
    hypotheses: Arc<HypothesisSet>,
    scores: Vec<f64>,
}

impl EvidenceLedger {
    /// Create a zero-initialized ledger over the given hypothesis set
    ///
    /// # Errors
    /// Returns `Error::Config` when the hypothesis set is empty.
    pub fn new(hypotheses: Arc<HypothesisSet>) -> Result<Self> {
        if hypotheses.is_empty() {
            return Err(Error::Config("cannot build ledger over empty hypothesis set".to_string()));
        }
        let scores = vec![0.0; hypotheses.len()];
        Ok(Self { hypotheses, scores })
    }

    /// Apply one fired observation, adding its weight to every supported hypothesis
    ///
    /// The supported hypotheses form a set: a name repeated in the list
    /// counts once, never twice. Validates the whole observation before
    /// mutating anything, so a rejected observation leaves the ledger
    /// exactly as it was. An empty hypothesis list is a valid no-op.
    ///
    /// # Errors
    /// Returns `Error::InvalidObservation` when the weight is not a positive
    /// finite number or any supported hypothesis is outside the set.
    pub fn apply(&mut self, observation: &Observation) -> Result<()> {
        if !(observation.weight.is_finite() && observation.weight > 0.0) {
            return Err(Error::InvalidObservation(format!(
                "'{}' has non-positive weight {}",
                observation.label, observation.weight
            )));
        }

        let mut ordinals = Vec::with_capacity(observation.hypotheses.len());
        for name in &observation.hypotheses {
            match self.hypotheses.ordinal(name) {
                // Set semantics: a duplicated name must not double-count.
                Some(ordinal) if ordinals.contains(&ordinal) => {}
                Some(ordinal) => ordinals.push(ordinal),
                None => {
                    return Err(Error::InvalidObservation(format!(
                        "'{}' supports unknown hypothesis '{}'",
                        observation.label, name
                    )));
                }
            }
        }

        for ordinal in ordinals {
            self.scores[ordinal] += observation.weight;
        }
        Ok(())
    }

    /// Hypothesis set this ledger accumulates over
    pub fn hypotheses(&self) -> &Arc<HypothesisSet> {
        &self.hypotheses
    }

    /// Accumulated score of `name`, or `None` for a name outside the set
    pub fn score_of(&self, name: &str) -> Option<f64> {
        self.hypotheses.ordinal(name).map(|ordinal| self.scores[ordinal])
    }

    /// Sum of all accumulated scores
    pub fn total(&self) -> f64 {
        self.scores.iter().sum()
    }

    /// Hypothesis with the strictly highest score
    ///
    /// Tie-break policy: first-in-declaration-order wins. Ties are common
    /// with sparse evidence, so this is deterministic by contract, not by
    /// accident. Returns `None` ("unknown") when every score is zero.
    pub fn top_hypothesis(&self) -> Option<&str> {
        let mut best: Option<(usize, f64)> = None;
        for (ordinal, &score) in self.scores.iter().enumerate() {
            match best {
                // Strict > keeps the earlier-declared hypothesis on a tie.
                Some((_, best_score)) if score <= best_score => {}
                _ if score > 0.0 => best = Some((ordinal, score)),
                _ => {}
            }
        }
        best.and_then(|(ordinal, _)| self.hypotheses.name(ordinal))
    }

    /// Confidence of `name` as a rounded percentage of the total score
    ///
    /// Returns 0 when the total is zero (division guard) or `name` is
    /// outside the set.
    pub fn confidence_of(&self, name: &str) -> u8 {
        let total = self.total();
        if total <= 0.0 {
            return 0;
        }
        match self.score_of(name) {
            Some(score) => (100.0 * score / total).round() as u8,
            None => 0,
        }
    }

    /// Immutable copy of the current mapping, safe to retain across further mutation
    pub fn snapshot(&self) -> LedgerSnapshot {
        let entries = self
            .hypotheses
            .names()
            .iter()
            .zip(self.scores.iter())
            .map(|(name, &score)| LedgerEntry {
                hypothesis: name.clone(),
                score,
            })
            .collect();
        LedgerSnapshot { entries }
    }
}

/// One hypothesis → score pair in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub hypothesis: String,
    pub score: f64,
}

/// Immutable copy of a ledger's state, in hypothesis declaration order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LedgerSnapshot {
    entries: Vec<LedgerEntry>,
}

impl LedgerSnapshot {
    /// Entries in hypothesis declaration order
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Score of `name` in this snapshot, if present
    pub fn score_of(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|entry| entry.hypothesis == name)
            .map(|entry| entry.score)
    }

    /// Sum of all scores in this snapshot
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|entry| entry.score).sum()
    }
}
