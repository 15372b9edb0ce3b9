//! Transition counting
//!
//! A single linear pass over canonical records that tallies every observed
//! (state, next state) pair, including transitions into the terminal sentinel,
//! together with per-state error and step-rank aggregates.

use super::record::{EventRecord, NodeId, Outcome, TransitionKey};
use super::graph::LinkColor;
use std::collections::HashMap;

/// Per-state aggregates gathered while counting
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateTally {
    pub times_errored: u64,
    pub rank_sum: f64,
    pub rank_count: u64,
}

impl StateTally {
    /// Mean step index, 0 when the state never carried one
    pub fn average_rank(&self) -> f64 {
        if self.rank_count == 0 {
            0.0
        } else {
            self.rank_sum / self.rank_count as f64
        }
    }
}

/// Success/failure split of the outcomes seen on one transition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeTally {
    pub successes: u64,
    pub failures: u64,
}

impl OutcomeTally {
    fn record(&mut self, outcome: Outcome) {
        if outcome.is_success() {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
    }

    /// Dominant color, `None` on a tie
    pub fn majority(&self) -> Option<LinkColor> {
        match self.successes.cmp(&self.failures) {
            std::cmp::Ordering::Greater => Some(LinkColor::Success),
            std::cmp::Ordering::Less => Some(LinkColor::Failure),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// Output of the counting pass
#[derive(Debug, Clone, Default)]
pub struct TransitionCounts {
    transitions: HashMap<TransitionKey, u64>,
    outcomes: HashMap<TransitionKey, OutcomeTally>,
    states: HashMap<NodeId, StateTally>,
    max_count: u64,
}

impl TransitionCounts {
    /// Count transitions and per-state aggregates in one pass.
    pub fn count(records: &[EventRecord]) -> Self {
        let mut counts = Self::default();

        for record in records {
            let key = TransitionKey::new(record.state.clone(), record.successor());
            let count = counts.transitions.entry(key.clone()).or_insert(0);
            *count += 1;
            counts.max_count = counts.max_count.max(*count);
            counts.outcomes.entry(key).or_default().record(record.outcome);

            let tally = counts.states.entry(record.state.clone()).or_default();
            if record.outcome.is_error() {
                tally.times_errored += 1;
            }
            // a zero step means the export did not record one
            if let Some(step) = record.step
                && step != 0.0
                && !step.is_nan()
            {
                tally.rank_sum += step;
                tally.rank_count += 1;
            }
        }

        tracing::debug!(
            "Counted {} distinct transitions over {} states (max {})",
            counts.transitions.len(),
            counts.states.len(),
            counts.max_count
        );
        counts
    }

    /// Occurrences of `key`, 0 if never observed
    pub fn transition_count(&self, key: &TransitionKey) -> u64 {
        self.transitions.get(key).copied().unwrap_or(0)
    }

    pub fn outcome_tally(&self, key: &TransitionKey) -> Option<&OutcomeTally> {
        self.outcomes.get(key)
    }

    pub fn state_tally(&self, state: &NodeId) -> Option<&StateTally> {
        self.states.get(state)
    }

    /// Largest count over all transitions, terminal ones included
    pub fn max_count(&self) -> u64 {
        self.max_count
    }

    pub fn distinct_transitions(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}
