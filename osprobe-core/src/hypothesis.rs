//! Hypothesis set: the closed enumeration of classification targets
//!
//! Hypotheses are identified by name and carry a declaration order. The set
//! is fixed at construction and never mutated during a run; declaration
//! order is the tie-break order for `top_hypothesis()`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Ordered, closed set of classification hypotheses
///
/// Built once from configuration (or the built-in OS-family defaults) and
/// shared read-only between the ledger and the engine.
#[derive(Debug, Clone)]
pub struct HypothesisSet {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl HypothesisSet {
    /// Build a hypothesis set from an ordered list of names
    ///
    /// # Errors
    /// Returns `Error::Config` when the list is empty or contains a
    /// duplicate or blank name.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(Error::Config("hypothesis set must not be empty".to_string()));
        }

        let mut index = HashMap::with_capacity(names.len());
        for (ordinal, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(Error::Config("hypothesis name must not be blank".to_string()));
            }
            if index.insert(name.clone(), ordinal).is_some() {
                return Err(Error::Config(format!("duplicate hypothesis '{}'", name)));
            }
        }

        Ok(Self { names, index })
    }

    /// Built-in default: the six OS families osprobe classifies into
    pub fn os_families() -> Self {
        // new() only fails on empty/duplicate input; this list is neither.
        Self::new(["windows", "macos", "linux", "android", "ios", "chromeos"])
            .unwrap_or_else(|_| unreachable!("built-in hypothesis list is valid"))
    }

    /// Number of hypotheses in the set
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the set is empty (never true for a constructed set)
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Whether `name` is a member of the set
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Declaration-order position of `name`, if a member
    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Name at declaration-order position `ordinal`
    pub fn name(&self, ordinal: usize) -> Option<&str> {
        self.names.get(ordinal).map(String::as_str)
    }

    /// All names in declaration order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Convenience wrapper returning the shared form used by the engine
    pub fn into_shared(self) -> Arc<HypothesisSet> {
        Arc::new(self)
    }
}
