//! CSV batch scoring: one output row per input row, failures included.

use crate::artifact::ArtifactError;
use crate::records::Record;
use crate::serving::{Confidence, StrokeService};
use serde::Serialize;
use std::io::{Read, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("batch i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("model not ready: {0}")]
    NotReady(#[from] ArtifactError),
}

#[derive(Debug, Serialize)]
struct Outcome {
    row: usize,
    label: Option<String>,
    probability: Option<f64>,
    error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub scored: usize,
    pub failed: usize,
}

/// Scores every row of `input` (header row = field names) and writes
/// `row,label,probability,error` to `output`. Empty cells are left out of the
/// record, so a blank `bmi` is imputed and a blank required field is reported.
pub fn score_csv<R: Read, W: Write>(
    service: &StrokeService,
    input: R,
    output: W,
) -> Result<BatchSummary, BatchError> {
    service.handle().ensure_loaded()?;
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);
    let headers = reader.headers()?.clone();
    let mut writer = csv::Writer::from_writer(output);
    let mut summary = BatchSummary::default();

    for (row, result) in reader.records().enumerate() {
        let outcome = match result {
            Err(e) => Outcome {
                row,
                label: None,
                probability: None,
                error: Some(e.to_string()),
            },
            Ok(raw) => {
                let record: Record = headers
                    .iter()
                    .zip(raw.iter())
                    .filter(|(_, v)| !v.is_empty())
                    .collect();
                match service.predict(&record, Confidence::WithProbability) {
                    Ok(p) => Outcome {
                        row,
                        label: Some(p.label.to_string()),
                        probability: p.probability,
                        error: None,
                    },
                    Err(e) => Outcome {
                        row,
                        label: None,
                        probability: None,
                        error: Some(e.to_string()),
                    },
                }
            }
        };
        if outcome.error.is_some() {
            log::warn!("row {}: {}", row, outcome.error.as_deref().unwrap_or_default());
            summary.failed += 1;
        } else {
            summary.scored += 1;
        }
        writer.serialize(&outcome)?;
    }
    writer.flush()?;
    log::info!("batch scored {} rows, {} failed", summary.scored, summary.failed);
    Ok(summary)
}
