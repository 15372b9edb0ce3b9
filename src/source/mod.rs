//! Record source module - Loading raw records from local files
//!
//! Records are read as a JSON array of objects or as delimited text with a header
//! row. The delimiter is always chosen by the caller; nothing here sniffs content.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

pub mod models;

pub use models::{PathAnalysisRecord, RawRecord, RecordShape, TutoringLogRecord};

/// Encoding of an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Json,
    Csv,
    /// Tab-separated, the DataShop export default
    #[default]
    Tsv,
}

impl InputFormat {
    /// Field delimiter used when the caller does not pick one
    pub fn default_delimiter(&self) -> u8 {
        match self {
            InputFormat::Tsv => b'\t',
            InputFormat::Csv | InputFormat::Json => b',',
        }
    }
}

/// How to read an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub shape: RecordShape,
    pub format: InputFormat,
    pub delimiter: Option<u8>,
}

impl LoadOptions {
    pub fn new(shape: RecordShape, format: InputFormat) -> Self {
        Self {
            shape,
            format,
            delimiter: None,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }
}

/// Load raw records from a file
pub fn load_records(path: &Path, options: LoadOptions) -> Result<Vec<RawRecord>> {
    let file = File::open(path)
        .map_err(|e| Error::custom(format!("Failed to open {:?}: {}", path, e)))?;
    let records = read_records(BufReader::new(file), options)?;
    tracing::info!("Loaded {} records from {:?}", records.len(), path);
    Ok(records)
}

/// Read raw records from any reader
pub fn read_records<R: Read>(reader: R, options: LoadOptions) -> Result<Vec<RawRecord>> {
    match options.shape {
        RecordShape::Tutoring => read_as::<TutoringLogRecord, _>(reader, options),
        RecordShape::PathAnalysis => read_as::<PathAnalysisRecord, _>(reader, options),
    }
}

fn read_as<T, R>(reader: R, options: LoadOptions) -> Result<Vec<RawRecord>>
where
    T: DeserializeOwned + Into<RawRecord>,
    R: Read,
{
    let rows: Vec<T> = match options.format {
        InputFormat::Json => serde_json::from_reader(reader)?,
        InputFormat::Csv | InputFormat::Tsv => {
            let delimiter = options
                .delimiter
                .unwrap_or_else(|| options.format.default_delimiter());
            let mut rdr = csv::ReaderBuilder::new()
                .delimiter(delimiter)
                .from_reader(reader);
            rdr.deserialize().collect::<std::result::Result<_, csv::Error>>()?
        }
    };
    Ok(rows.into_iter().map(Into::into).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::record::Outcome;
    use std::io::Write;

    const TUTORING_TSV: &str = "Row\tAnon Student Id\tTime\tProblem Name\tStep Name\tOutcome\n\
        1\tstu_1\t2023-03-01 10:00:00\tEQ-1\tfind-x\tOK\n\
        2\tstu_1\t2023-03-01 10:00:09\tEQ-1\t\tERROR\n";

    #[test]
    fn test_read_tutoring_tsv() {
        let records = read_records(
            TUTORING_TSV.as_bytes(),
            LoadOptions::new(RecordShape::Tutoring, InputFormat::Tsv),
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        match &records[1] {
            RawRecord::TutoringLog(r) => {
                assert_eq!(r.step_name, None);
                assert_eq!(r.outcome, Outcome::Error);
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_read_path_analysis_csv_with_custom_delimiter() {
        let csv = "section_id;problem_id;tutor_goalnode_id;next_tutor_goalnode_id;current_step;evaluation;current_time\n\
            sec;p1;a;b;1;CORRECT;100\n\
            sec;p1;b;;2;ERROR;200\n";

        let records = read_records(
            csv.as_bytes(),
            LoadOptions::new(RecordShape::PathAnalysis, InputFormat::Csv).with_delimiter(b';'),
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        match &records[1] {
            RawRecord::PathAnalysis(r) => {
                assert_eq!(r.next_tutor_goalnode_id, None);
                assert_eq!(r.current_step, "2");
                assert_eq!(r.evaluation, Outcome::Error);
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_answer_text_is_kept_verbatim() {
        let csv = "section_id,problem_id,tutor_goalnode_id,next_tutor_goalnode_id,current_step,evaluation,input,attempt\n\
            sec,p1,a,b,1,CORRECT,1.50,1\n\
            sec,p1,b,,2,ERROR,+3,2\n";

        let records = read_records(
            csv.as_bytes(),
            LoadOptions::new(RecordShape::PathAnalysis, InputFormat::Csv),
        )
        .unwrap();

        let inputs: Vec<Option<String>> = records
            .iter()
            .map(|r| match r {
                RawRecord::PathAnalysis(r) => r.input.clone(),
                other => panic!("unexpected record {:?}", other),
            })
            .collect();
        assert_eq!(inputs, vec![Some("1.50".to_string()), Some("+3".to_string())]);
    }

    #[test]
    fn test_load_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"section_id": "s", "problem_id": "p", "tutor_goalnode_id": "a",
                 "next_tutor_goalnode_id": "b", "current_step": "1",
                 "evaluation": "CORRECT", "current_time": "5"}}]"#
        )
        .unwrap();

        let records = load_records(
            file.path(),
            LoadOptions::new(RecordShape::PathAnalysis, InputFormat::Json),
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].shape(), RecordShape::PathAnalysis);
    }

    #[test]
    fn test_missing_file() {
        let result = load_records(
            Path::new("/nonexistent/records.tsv"),
            LoadOptions::new(RecordShape::Tutoring, InputFormat::Tsv),
        );
        assert!(result.is_err());
    }
}
