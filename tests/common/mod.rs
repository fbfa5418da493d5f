#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use stroke_risk::corpus::TrainingCorpus;
use stroke_risk::Record;

const GENDERS: [&str; 2] = ["Male", "Female"];
const WORK_TYPES: [&str; 5] = ["Private", "Self-employed", "Govt_job", "children", "Never_worked"];
const RESIDENCES: [&str; 2] = ["Urban", "Rural"];
const SMOKING: [&str; 4] = ["never smoked", "formerly smoked", "smokes", "Unknown"];

pub struct Row {
    pub gender: &'static str,
    pub age: f64,
    pub hypertension: i32,
    pub heart_disease: i32,
    pub ever_married: &'static str,
    pub work_type: &'static str,
    pub residence: &'static str,
    pub glucose: f64,
    pub bmi: Option<f64>,
    pub smoking: &'static str,
    pub stroke: i32,
}

impl Row {
    pub fn record(&self) -> Record {
        let mut r = Record::new()
            .with("gender", self.gender)
            .with("age", self.age)
            .with("hypertension", self.hypertension)
            .with("heart_disease", self.heart_disease)
            .with("ever_married", self.ever_married)
            .with("work_type", self.work_type)
            .with("Residence_type", self.residence)
            .with("avg_glucose_level", self.glucose)
            .with("smoking_status", self.smoking);
        if let Some(bmi) = self.bmi {
            r.insert("bmi", bmi);
        }
        r
    }
}

/// Deterministic synthetic cohort: older patients with high glucose have strokes.
pub fn rows(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| {
            let age = 20.0 + ((i * 7) % 65) as f64;
            let glucose = 70.0 + ((i * 13) % 180) as f64;
            Row {
                gender: GENDERS[i % 2],
                age,
                hypertension: i32::from(i % 5 == 0),
                heart_disease: i32::from(i % 7 == 0),
                ever_married: if age > 30.0 { "Yes" } else { "No" },
                work_type: WORK_TYPES[i % 5],
                residence: RESIDENCES[(i / 2) % 2],
                glucose,
                bmi: if i % 9 == 0 {
                    None
                } else {
                    Some(18.0 + ((i * 3) % 20) as f64)
                },
                smoking: SMOKING[i % 4],
                stroke: i32::from(age > 60.0 && glucose > 150.0),
            }
        })
        .collect()
}

pub fn corpus(n: usize) -> TrainingCorpus {
    let rows = rows(n);
    TrainingCorpus {
        records: rows.iter().map(Row::record).collect(),
        labels: rows.iter().map(|r| r.stroke).collect(),
    }
}

/// Writes the cohort in the public dataset's CSV layout, `N/A` for missing bmi.
pub fn write_csv(dir: &Path, n: usize) -> PathBuf {
    let mut text = String::from(
        "id,gender,age,hypertension,heart_disease,ever_married,work_type,Residence_type,avg_glucose_level,bmi,smoking_status,stroke\n",
    );
    for (i, r) in rows(n).iter().enumerate() {
        let bmi = r.bmi.map(|b| b.to_string()).unwrap_or_else(|| "N/A".into());
        writeln!(
            text,
            "{},{},{},{},{},{},{},{},{},{},{},{}",
            1000 + i,
            r.gender,
            r.age,
            r.hypertension,
            r.heart_disease,
            r.ever_married,
            r.work_type,
            r.residence,
            r.glucose,
            bmi,
            r.smoking,
            r.stroke
        )
        .unwrap();
    }
    let path = dir.join("healthcare-dataset-stroke-data.csv");
    fs::write(&path, text).unwrap();
    path
}

pub fn scenario_one() -> Record {
    Record::new()
        .with("gender", "Male")
        .with("age", 67.0)
        .with("hypertension", 0)
        .with("heart_disease", 1)
        .with("ever_married", "Yes")
        .with("work_type", "Private")
        .with("Residence_type", "Urban")
        .with("avg_glucose_level", 228.69)
        .with("bmi", 36.6)
        .with("smoking_status", "formerly smoked")
}
