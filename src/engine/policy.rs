// src/engine/policy.rs

//! Unlock policy: how lock state is stored or derived, and how much accuracy
//! a completion needs before it opens the nodes that depend on it.

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use crate::models::progress::{NodeStatus, UserNodeProgress};

/// Which lock-state strategy the engine runs with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnlockMode {
    /// Unlock flags are persisted by initialization and completion; stored status wins on read.
    #[default]
    Explicit,
    /// Only completions are persisted; locked/unlocked is computed from prerequisites on read.
    Derived,
}

impl FromStr for UnlockMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "explicit" => Ok(UnlockMode::Explicit),
            "derived" => Ok(UnlockMode::Derived),
            other => Err(format!("unknown unlock mode '{other}'")),
        }
    }
}

impl fmt::Display for UnlockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnlockMode::Explicit => f.write_str("explicit"),
            UnlockMode::Derived => f.write_str("derived"),
        }
    }
}

/// Strategy seam between stored progress and the status a caller sees.
pub trait UnlockStrategy: Send + Sync + fmt::Debug {
    fn mode(&self) -> UnlockMode;

    /// Whether initialization and completion write `unlocked` rows.
    fn persists_unlocks(&self) -> bool;

    /// Combines the stored status (if any) with the status derived from prerequisites.
    fn resolve(&self, stored: Option<NodeStatus>, derived: NodeStatus) -> NodeStatus;
}

#[derive(Debug)]
struct ExplicitUnlock;

impl UnlockStrategy for ExplicitUnlock {
    fn mode(&self) -> UnlockMode {
        UnlockMode::Explicit
    }

    fn persists_unlocks(&self) -> bool {
        true
    }

    fn resolve(&self, stored: Option<NodeStatus>, derived: NodeStatus) -> NodeStatus {
        stored.unwrap_or(derived)
    }
}

#[derive(Debug)]
struct DerivedUnlock;

impl UnlockStrategy for DerivedUnlock {
    fn mode(&self) -> UnlockMode {
        UnlockMode::Derived
    }

    fn persists_unlocks(&self) -> bool {
        false
    }

    fn resolve(&self, stored: Option<NodeStatus>, derived: NodeStatus) -> NodeStatus {
        match stored {
            Some(NodeStatus::Completed) => NodeStatus::Completed,
            _ => derived,
        }
    }
}

/// The full policy the engine is constructed with.
#[derive(Debug, Clone)]
pub struct UnlockPolicy {
    strategy: Arc<dyn UnlockStrategy>,
    min_accuracy: Option<f64>,
}

impl UnlockPolicy {
    pub fn new(mode: UnlockMode, min_accuracy: Option<f64>) -> Self {
        let strategy: Arc<dyn UnlockStrategy> = match mode {
            UnlockMode::Explicit => Arc::new(ExplicitUnlock),
            UnlockMode::Derived => Arc::new(DerivedUnlock),
        };
        Self {
            strategy,
            min_accuracy,
        }
    }

    pub fn mode(&self) -> UnlockMode {
        self.strategy.mode()
    }

    pub fn min_accuracy(&self) -> Option<f64> {
        self.min_accuracy
    }

    pub fn persists_unlocks(&self) -> bool {
        self.strategy.persists_unlocks()
    }

    /// Accuracy gate. A completion with no questions answered counts as 0% accurate.
    pub fn meets_accuracy(&self, correct_count: i64, total_count: i64) -> bool {
        match self.min_accuracy {
            None => true,
            Some(threshold) => {
                let ratio = if total_count > 0 {
                    correct_count as f64 / total_count as f64
                } else {
                    0.0
                };
                ratio >= threshold
            }
        }
    }

    /// A prerequisite is satisfied once completed with enough accuracy.
    pub fn satisfies(&self, record: &UserNodeProgress) -> bool {
        record.is_completed() && self.meets_accuracy(record.correct_count, record.total_count)
    }

    /// Lock state computed purely from prerequisites.
    ///
    /// Nodes with prerequisites are unlocked when every prerequisite is satisfied.
    /// Nodes without prerequisites are unlocked only if they are the path's entry node.
    pub fn derive(
        &self,
        prerequisites: &[String],
        is_entry: bool,
        records: &HashMap<String, UserNodeProgress>,
    ) -> NodeStatus {
        if prerequisites.is_empty() {
            return if is_entry {
                NodeStatus::Unlocked
            } else {
                NodeStatus::Locked
            };
        }

        let all_satisfied = prerequisites
            .iter()
            .all(|id| records.get(id).is_some_and(|record| self.satisfies(record)));

        if all_satisfied {
            NodeStatus::Unlocked
        } else {
            NodeStatus::Locked
        }
    }

    pub fn resolve(&self, stored: Option<NodeStatus>, derived: NodeStatus) -> NodeStatus {
        self.strategy.resolve(stored, derived)
    }
}

impl Default for UnlockPolicy {
    fn default() -> Self {
        Self::new(UnlockMode::default(), None)
    }
}
