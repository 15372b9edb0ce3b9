//! Canonical event records and the normalizer that produces them

use crate::source::models::{PathAnalysisRecord, RawRecord, TutoringLogRecord};
use crate::{Error, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Goal node id that only appears on a header row repeated inside the data
const HEADER_ECHO: &str = "tutor_goalnode_id";

/// Evaluation of a single interaction
///
/// Covers the vocabulary of both input shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Ok,
    Correct,
    Error,
    Bug,
    InitialHint,
    HintLevelChange,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Ok | Outcome::Correct)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error | Outcome::Bug)
    }
}

/// Identity of a problem-solving state
///
/// A structured key: components are compared individually, so names that contain
/// `-` or `=>` never collide with one another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeId {
    /// Tutoring-log state: a step within a problem
    Step {
        problem: String,
        step: Option<String>,
    },
    /// Path-analysis state: a tutor goal node
    Goal { goal: String },
}

impl NodeId {
    pub fn step(problem: impl Into<String>, step: Option<impl Into<String>>) -> Self {
        NodeId::Step {
            problem: problem.into(),
            step: step.map(Into::into),
        }
    }

    pub fn goal(goal: impl Into<String>) -> Self {
        NodeId::Goal { goal: goal.into() }
    }

    /// Whether any component of the id contains `marker`
    pub fn contains(&self, marker: &str) -> bool {
        match self {
            NodeId::Step { problem, step } => {
                problem.contains(marker) || step.as_deref().is_some_and(|s| s.contains(marker))
            }
            NodeId::Goal { goal } => goal.contains(marker),
        }
    }

    /// Human-facing label for a freshly created node
    pub fn default_label(&self) -> String {
        match self {
            NodeId::Step { .. } => self.to_string(),
            NodeId::Goal { goal } => abbreviate_goal(goal),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NodeId::Step { problem, step } => {
                write!(f, "{}-{}", problem, step.as_deref().unwrap_or("null"))
            }
            NodeId::Goal { goal } => f.write_str(goal),
        }
    }
}

/// First three distinct `-`-separated words of a goal id, followed by `...`
fn abbreviate_goal(goal: &str) -> String {
    let mut words: Vec<&str> = Vec::new();
    for word in goal.split('-') {
        if !words.contains(&word) {
            words.push(word);
        }
    }
    words.truncate(3);
    format!("{}...", words.join(" "))
}

/// Where a student went after a state
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Successor {
    State(NodeId),
    /// End of the student's sequence
    Terminal,
}

/// Key of one observed (state, next state) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransitionKey {
    pub source: NodeId,
    pub target: Successor,
}

impl TransitionKey {
    pub fn new(source: NodeId, target: Successor) -> Self {
        Self { source, target }
    }

    pub fn between(source: &NodeId, target: &NodeId) -> Self {
        Self::new(source.clone(), Successor::State(target.clone()))
    }
}

/// One observed interaction in canonical form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Owning entity (student or section)
    pub entity: String,
    /// Ordering key within the entity, epoch milliseconds for tutoring logs
    pub timestamp: i64,
    pub state: NodeId,
    pub next_state: Option<NodeId>,
    pub outcome: Outcome,
    /// Step index at which the state was visited
    pub step: Option<f64>,
    pub problem: Option<String>,
    /// Per-attempt columns only path-analysis exports carry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<AttemptDetail>,
}

/// Typed form of the path-analysis bookkeeping columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttemptDetail {
    pub context_id: Option<String>,
    pub max_step: Option<u32>,
    pub input: Option<String>,
    pub attempt: Option<u32>,
    pub is_autofill: bool,
    pub total_time: Option<i64>,
}

impl EventRecord {
    pub fn new(
        entity: impl Into<String>,
        state: NodeId,
        next_state: Option<NodeId>,
        outcome: Outcome,
    ) -> Self {
        Self {
            entity: entity.into(),
            timestamp: 0,
            state,
            next_state,
            outcome,
            step: None,
            problem: None,
            attempt: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_problem(mut self, problem: impl Into<String>) -> Self {
        self.problem = Some(problem.into());
        self
    }

    pub fn successor(&self) -> Successor {
        match &self.next_state {
            Some(next) => Successor::State(next.clone()),
            None => Successor::Terminal,
        }
    }
}

/// Convert raw records into canonical event records.
///
/// Records are grouped by owning entity (first-appearance order, original order
/// kept within each entity). Tutoring-log records get their next state from the
/// following record of the same entity; path-analysis records carry it explicitly.
pub fn normalize(records: &[RawRecord]) -> Result<Vec<EventRecord>> {
    let mut groups: Vec<Vec<(EventRecord, bool)>> = Vec::new();
    let mut group_of: HashMap<String, usize> = HashMap::new();

    for (row, raw) in records.iter().enumerate() {
        let converted = match raw {
            RawRecord::TutoringLog(record) => Some((from_tutoring_log(row, record)?, true)),
            RawRecord::PathAnalysis(record) => {
                from_path_analysis(row, record)?.map(|event| (event, false))
            }
        };
        let Some((event, derive_next)) = converted else {
            tracing::debug!("Skipping header row {}", row);
            continue;
        };

        let idx = *group_of.entry(event.entity.clone()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[idx].push((event, derive_next));
    }

    let mut events = Vec::with_capacity(records.len());
    for group in groups {
        let mut previous: Option<i64> = None;
        let next_states: Vec<NodeId> = group.iter().map(|(e, _)| e.state.clone()).collect();

        for (i, (mut event, derive_next)) in group.into_iter().enumerate() {
            if let Some(prev) = previous
                && event.timestamp < prev
            {
                tracing::warn!(
                    "Records for {} are out of order ({} after {})",
                    event.entity,
                    event.timestamp,
                    prev
                );
            }
            previous = Some(event.timestamp);

            if derive_next {
                event.next_state = next_states.get(i + 1).cloned();
            }
            events.push(event);
        }
    }

    tracing::debug!(
        "Normalized {} raw records into {} events",
        records.len(),
        events.len()
    );
    Ok(events)
}

fn from_tutoring_log(row: usize, record: &TutoringLogRecord) -> Result<EventRecord> {
    let timestamp = parse_time(row, &record.time)?;
    let state = NodeId::step(
        record.problem_name.clone(),
        record.step_name.clone().filter(|s| !s.is_empty()),
    );

    Ok(EventRecord::new(record.student_id.clone(), state, None, record.outcome)
        .with_timestamp(timestamp)
        .with_problem(record.problem_name.clone()))
}

fn from_path_analysis(row: usize, record: &PathAnalysisRecord) -> Result<Option<EventRecord>> {
    if record.tutor_goalnode_id.contains(HEADER_ECHO) {
        return Ok(None);
    }

    let state = goal_id(&record.tutor_goalnode_id)
        .ok_or_else(|| Error::normalize(row, "tutor_goalnode_id", "empty goal node id"))?;
    let next_state = record.next_tutor_goalnode_id.as_deref().and_then(goal_id);

    let mut event = EventRecord::new(
        record.section_id.clone(),
        state,
        next_state,
        record.evaluation,
    )
    .with_timestamp(parse_number::<i64>(row, "current_time", &record.current_time)?.unwrap_or(0))
    .with_problem(record.problem_id.clone());
    event.step = parse_number::<f64>(row, "current_step", &record.current_step)?;
    event.attempt = Some(AttemptDetail {
        context_id: record.ct_context_id.clone().filter(|c| !c.is_empty()),
        max_step: parse_number(row, "max_step", &record.max_step)?,
        input: record.input.clone().filter(|i| !i.is_empty()),
        attempt: parse_number(row, "attempt", &record.attempt)?,
        is_autofill: record.is_autofil.trim().eq_ignore_ascii_case("true"),
        total_time: parse_number(row, "total_time", &record.total_time)?,
    });

    Ok(Some(event))
}

/// Goal node id with surrounding padding removed; blank means none.
fn goal_id(value: &str) -> Option<NodeId> {
    let value = value.trim();
    (!value.is_empty()).then(|| NodeId::goal(value))
}

/// Parse an optional numeric column; empty means absent.
fn parse_number<T>(row: usize, field: &'static str, value: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<T>()
        .map(Some)
        .map_err(|e| Error::normalize(row, field, format!("{:?}: {}", value, e)))
}

/// Parse a tutoring-log time column into epoch milliseconds.
fn parse_time(row: usize, value: &str) -> Result<i64> {
    let value = value.trim();
    if let Ok(millis) = value.parse::<i64>() {
        return Ok(millis);
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .map(|t| t.and_utc().timestamp_millis())
        .map_err(|e| Error::normalize(row, "Time", format!("{:?}: {}", value, e)))
}
