//! Raw record shapes as they arrive from tutoring-system exports
//!
//! Two structurally different shapes are accepted. Both are deserialized as-is and
//! handed to [`crate::engine::record::normalize`], which turns them into one
//! canonical event record type.

use crate::engine::record::Outcome;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the supported record shapes an input file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RecordShape {
    /// DataShop-style tutoring log keyed by problem and step name
    #[default]
    Tutoring,
    /// Path-analysis export with explicit current/next goal node ids
    PathAnalysis,
}

/// One row of a DataShop-style tutoring log
///
/// Only the columns the engine reads are modelled; every other column is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutoringLogRecord {
    #[serde(rename = "Anon Student Id")]
    pub student_id: String,

    /// Either `YYYY-MM-DD HH:MM:SS[.fff]` or an integer epoch value
    #[serde(rename = "Time", deserialize_with = "lenient_string")]
    pub time: String,

    #[serde(rename = "Problem Name")]
    pub problem_name: String,

    /// Null on the closing "Done" row of a problem
    #[serde(rename = "Step Name", default)]
    pub step_name: Option<String>,

    #[serde(rename = "Outcome")]
    pub outcome: Outcome,
}

/// One row of a path-analysis export
///
/// Numeric columns are carried as strings and coerced during normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathAnalysisRecord {
    pub section_id: String,

    pub problem_id: String,

    pub tutor_goalnode_id: String,

    #[serde(default)]
    pub next_tutor_goalnode_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub current_step: String,

    pub evaluation: Outcome,

    #[serde(default, deserialize_with = "lenient_string")]
    pub current_time: String,

    #[serde(default)]
    pub ct_context_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub max_step: String,

    /// Student answer, kept verbatim
    #[serde(default)]
    pub input: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub attempt: String,

    /// `"true"` when the tutor filled the step in for the student
    #[serde(default, deserialize_with = "lenient_string")]
    pub is_autofil: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub total_time: String,
}

/// A record in one of the supported input shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "kebab-case")]
pub enum RawRecord {
    TutoringLog(TutoringLogRecord),
    PathAnalysis(PathAnalysisRecord),
}

impl RawRecord {
    pub fn shape(&self) -> RecordShape {
        match self {
            RawRecord::TutoringLog(_) => RecordShape::Tutoring,
            RawRecord::PathAnalysis(_) => RecordShape::PathAnalysis,
        }
    }
}

impl From<TutoringLogRecord> for RawRecord {
    fn from(record: TutoringLogRecord) -> Self {
        RawRecord::TutoringLog(record)
    }
}

impl From<PathAnalysisRecord> for RawRecord {
    fn from(record: PathAnalysisRecord) -> Self {
        RawRecord::PathAnalysis(record)
    }
}

/// Accept a string, integer, float or boolean and keep its textual form.
///
/// Exports disagree on whether counters are quoted; coercion happens later.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct LenientString;

    impl Visitor<'_> for LenientString {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string or a scalar value")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_unit<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(LenientString)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tutoring_record_from_json() {
        let json = r#"{
            "Anon Student Id": "stu_1",
            "Session Id": "no_session_tracking",
            "Time": "2023-03-01 10:15:00",
            "Problem Name": "EQ-1",
            "Step Name": null,
            "Outcome": "INITIAL_HINT",
            "Help Level": 1
        }"#;

        let record: TutoringLogRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.student_id, "stu_1");
        assert_eq!(record.step_name, None);
        assert_eq!(record.outcome, Outcome::InitialHint);
    }

    #[test]
    fn test_path_analysis_numbers_are_kept_as_text() {
        let json = r#"{
            "section_id": "sec",
            "problem_id": "12",
            "tutor_goalnode_id": "a-b",
            "next_tutor_goalnode_id": null,
            "current_step": 3,
            "evaluation": "CORRECT",
            "current_time": "1700000000",
            "attempt": 2,
            "is_autofil": true
        }"#;

        let record: PathAnalysisRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.current_step, "3");
        assert_eq!(record.next_tutor_goalnode_id, None);
        assert_eq!(record.attempt, "2");
        assert_eq!(record.is_autofil, "true");
        assert_eq!(record.max_step, "");
        assert_eq!(RawRecord::from(record).shape(), RecordShape::PathAnalysis);
    }
}
