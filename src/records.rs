use polars::prelude::{DataType, Field, Schema};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// How a field is turned into its numeric slot in the feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Text category, encoded through the field's fitted encoder.
    Categorical,
    /// Non-negative real, always present.
    Continuous,
    /// 0 or 1, always present.
    Binary,
    /// Non-negative real that may be absent; filled by the mean imputer.
    Imputed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }

    pub fn required(&self) -> bool {
        self.kind != FieldKind::Imputed
    }
}

pub const FEATURE_COUNT: usize = 10;

/// Column order of every feature vector, at training and at serving time.
pub static FEATURE_LAYOUT: [FieldDescriptor; FEATURE_COUNT] = [
    FieldDescriptor::new("gender", FieldKind::Categorical),
    FieldDescriptor::new("age", FieldKind::Continuous),
    FieldDescriptor::new("hypertension", FieldKind::Binary),
    FieldDescriptor::new("heart_disease", FieldKind::Binary),
    FieldDescriptor::new("ever_married", FieldKind::Categorical),
    FieldDescriptor::new("work_type", FieldKind::Categorical),
    FieldDescriptor::new("Residence_type", FieldKind::Categorical),
    FieldDescriptor::new("avg_glucose_level", FieldKind::Continuous),
    FieldDescriptor::new("bmi", FieldKind::Imputed),
    FieldDescriptor::new("smoking_status", FieldKind::Categorical),
];

pub const LABEL_COLUMN: &str = "stroke";

pub fn categorical_fields() -> impl Iterator<Item = &'static FieldDescriptor> {
    FEATURE_LAYOUT
        .iter()
        .filter(|d| d.kind == FieldKind::Categorical)
}

pub fn feature_names() -> Vec<String> {
    FEATURE_LAYOUT.iter().map(|d| d.name.to_string()).collect()
}

pub struct StrokeRecord {}

impl StrokeRecord {
    /// Column types forced onto the corpus when it is read as CSV. `bmi` is
    /// read as text because the public dataset spells missing values `N/A`.
    pub fn raw_schema() -> Schema {
        Schema::from_iter(vec![
            Field::new("gender", DataType::Utf8),
            Field::new("age", DataType::Float64),
            Field::new("hypertension", DataType::Int32),
            Field::new("heart_disease", DataType::Int32),
            Field::new("ever_married", DataType::Utf8),
            Field::new("work_type", DataType::Utf8),
            Field::new("Residence_type", DataType::Utf8),
            Field::new("avg_glucose_level", DataType::Float64),
            Field::new("bmi", DataType::Utf8),
            Field::new("smoking_status", DataType::Utf8),
            Field::new(LABEL_COLUMN, DataType::Int32),
        ])
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("required field '{field}' is missing")]
    MissingField { field: String },
    #[error("field '{field}' expects a number, got '{value}'")]
    ExpectedNumber { field: String, value: String },
    #[error("field '{field}' expects text, got the number {value}")]
    ExpectedText { field: String, value: f64 },
    #[error("field '{field}' must be a finite non-negative number, got {value}")]
    OutOfRange { field: String, value: f64 },
    #[error("field '{field}' must be 0 or 1, got {value}")]
    NotBinary { field: String, value: f64 },
    #[error("field '{field}' has value '{value}' which the model never saw during training")]
    UnseenCategory { field: String, value: String },
}

/// A single raw value as supplied by a form, a prompt or a CSV cell.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<i32> for RawValue {
    fn from(value: i32) -> Self {
        RawValue::Number(f64::from(value))
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Text(s) => f.write_str(s),
            RawValue::Number(n) => write!(f, "{n}"),
        }
    }
}

/// One patient's attributes, keyed by field name. Key order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: HashMap<String, RawValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl Into<RawValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<RawValue>) {
        self.values.insert(field.to_string(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<RawValue> {
        self.values.remove(field)
    }

    pub fn get(&self, field: &str) -> Option<&RawValue> {
        self.values.get(field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Text of a categorical field.
    pub fn text(&self, field: &str) -> Result<&str, RecordError> {
        match self.values.get(field) {
            Some(RawValue::Text(s)) if !s.trim().is_empty() => Ok(s.trim()),
            Some(RawValue::Text(_)) => Err(RecordError::MissingField {
                field: field.to_string(),
            }),
            Some(RawValue::Number(n)) => Err(RecordError::ExpectedText {
                field: field.to_string(),
                value: *n,
            }),
            None => Err(RecordError::MissingField {
                field: field.to_string(),
            }),
        }
    }

    /// Numeric value of a field; `Ok(None)` when it is absent or blank/`N/A`.
    pub fn optional_number(&self, field: &str) -> Result<Option<f64>, RecordError> {
        match self.values.get(field) {
            None => Ok(None),
            Some(RawValue::Number(n)) => Ok(Some(*n)),
            Some(RawValue::Text(s)) => {
                let s = s.trim();
                if s.is_empty() || s.eq_ignore_ascii_case("N/A") {
                    return Ok(None);
                }
                s.parse::<f64>()
                    .map(Some)
                    .map_err(|_| RecordError::ExpectedNumber {
                        field: field.to_string(),
                        value: s.to_string(),
                    })
            }
        }
    }

    pub fn number(&self, field: &str) -> Result<f64, RecordError> {
        self.optional_number(field)?
            .ok_or_else(|| RecordError::MissingField {
                field: field.to_string(),
            })
    }
}

impl<K: AsRef<str>, V: Into<RawValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k.as_ref(), v);
        }
        record
    }
}

pub fn check_non_negative(field: &str, value: f64) -> Result<f64, RecordError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(RecordError::OutOfRange {
            field: field.to_string(),
            value,
        })
    }
}

pub fn check_binary(field: &str, value: f64) -> Result<f64, RecordError> {
    if value == 0.0 || value == 1.0 {
        Ok(value)
    } else {
        Err(RecordError::NotBinary {
            field: field.to_string(),
            value,
        })
    }
}

/// Numeric encoding of a record in `FEATURE_LAYOUT` order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        FEATURE_LAYOUT
            .iter()
            .position(|d| d.name == field)
            .map(|i| self.0[i])
    }
}
