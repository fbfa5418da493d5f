mod common;

use std::sync::Arc;
use stroke_risk::batch::{score_csv, BatchError};
use stroke_risk::training::fit_model;
use stroke_risk::{ArtifactHandle, StrokeService, UnseenPolicy};

fn service() -> StrokeService {
    let artifact = fit_model(&common::corpus(120), UnseenPolicy::Remap)
        .unwrap()
        .artifact;
    StrokeService::new(Arc::new(ArtifactHandle::with_artifact("model.json", artifact)))
}

const INPUT: &str = "\
gender,age,hypertension,heart_disease,ever_married,work_type,Residence_type,avg_glucose_level,bmi,smoking_status
Male,67,0,1,Yes,Private,Urban,228.69,36.6,formerly smoked
Female,49,0,0,Yes,Private,Urban,171.23,,smokes
Female,79,1,0,Yes,Self-employed,Rural,174.12,24,
Male,81,0,0,Yes,Private,Urban,abc,29,never smoked
";

#[test]
fn every_row_gets_an_outcome() {
    let mut out = Vec::new();
    let summary = score_csv(&service(), INPUT.as_bytes(), &mut out).unwrap();
    assert_eq!(summary.scored, 2);
    assert_eq!(summary.failed, 2);

    let mut reader = csv::Reader::from_reader(out.as_slice());
    let headers = reader.headers().unwrap().clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        vec!["row", "label", "probability", "error"]
    );
    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 4);

    assert!(rows[0][1].ends_with("by Stroke"));
    assert!(rows[0][3].is_empty());
    // blank bmi is imputed, not an error
    assert!(rows[1][3].is_empty());
    // blank smoking_status is a missing required field
    assert!(rows[2][1].is_empty());
    assert!(rows[2][3].contains("smoking_status"));
    assert!(rows[3][3].contains("avg_glucose_level"));
}

#[test]
fn missing_model_fails_before_reading_rows() {
    let dir = tempfile::tempdir().unwrap();
    let service = StrokeService::new(Arc::new(ArtifactHandle::new(dir.path().join("none.json"))));
    let mut out = Vec::new();
    assert!(matches!(
        score_csv(&service, INPUT.as_bytes(), &mut out),
        Err(BatchError::NotReady(_))
    ));
    assert!(out.is_empty());
}
