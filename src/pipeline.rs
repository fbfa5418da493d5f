//! Record -> feature vector transformation shared by training and serving.
//!
//! Both sides call [`FeaturePipeline::transform`]; the column order comes from
//! `FEATURE_LAYOUT` and never from the key order of the incoming record.

use crate::encoder::{CategoricalEncoder, UnseenPolicy};
use crate::imputer::MeanImputer;
use crate::records::{
    categorical_fields, check_binary, check_non_negative, FeatureVector, FieldKind, Record,
    RecordError, FEATURE_COUNT, FEATURE_LAYOUT,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

const IMPUTED_FIELD: &str = "bmi";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("cannot fit the feature pipeline on an empty corpus")]
    EmptyCorpus,
    #[error("training row {row}: {source}")]
    InvalidRow {
        row: usize,
        #[source]
        source: RecordError,
    },
    #[error("column '{0}' has no observed values to fit on")]
    NoObservations(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePipeline {
    imputer: MeanImputer,
    encoders: BTreeMap<String, CategoricalEncoder>,
    unseen: UnseenPolicy,
}

impl FeaturePipeline {
    /// Fits the `bmi` imputer, then one encoder per categorical field.
    pub fn fit(records: &[Record], unseen: UnseenPolicy) -> Result<Self, PipelineError> {
        if records.is_empty() {
            return Err(PipelineError::EmptyCorpus);
        }

        let bmi = records
            .iter()
            .enumerate()
            .map(|(row, r)| {
                r.optional_number(IMPUTED_FIELD)
                    .and_then(|v| v.map(|v| check_non_negative(IMPUTED_FIELD, v)).transpose())
                    .map_err(|source| PipelineError::InvalidRow { row, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let imputer = MeanImputer::fit(bmi)
            .ok_or_else(|| PipelineError::NoObservations(IMPUTED_FIELD.to_string()))?;
        log::debug!("bmi fill value {:.4}", imputer.fill_value());

        let mut encoders = BTreeMap::new();
        for descriptor in categorical_fields() {
            let values = records
                .iter()
                .enumerate()
                .map(|(row, r)| {
                    r.text(descriptor.name)
                        .map_err(|source| PipelineError::InvalidRow { row, source })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let encoder = CategoricalEncoder::fit(descriptor.name, values)
                .ok_or_else(|| PipelineError::NoObservations(descriptor.name.to_string()))?;
            log::debug!("{} classes: {:?}", descriptor.name, encoder.classes());
            encoders.insert(descriptor.name.to_string(), encoder);
        }

        Ok(Self {
            imputer,
            encoders,
            unseen,
        })
    }

    pub fn transform(&self, record: &Record) -> Result<FeatureVector, RecordError> {
        let mut values = [0.0; FEATURE_COUNT];
        for (slot, descriptor) in values.iter_mut().zip(FEATURE_LAYOUT.iter()) {
            let name = descriptor.name;
            *slot = match descriptor.kind {
                FieldKind::Categorical => {
                    let encoder = self.encoder(name).ok_or_else(|| RecordError::MissingField {
                        field: name.to_string(),
                    })?;
                    encoder.encode(record.text(name)?, self.unseen)? as f64
                }
                FieldKind::Continuous => check_non_negative(name, record.number(name)?)?,
                FieldKind::Binary => check_binary(name, record.number(name)?)?,
                FieldKind::Imputed => {
                    let value = record
                        .optional_number(name)?
                        .map(|v| check_non_negative(name, v))
                        .transpose()?;
                    self.imputer.apply(value)
                }
            };
        }
        Ok(FeatureVector::new(values))
    }

    /// Names the first categorical field without a usable encoder, if any.
    pub fn incomplete_field(&self) -> Option<&'static str> {
        categorical_fields()
            .map(|d| d.name)
            .find(|name| !self.encoder(name).is_some_and(CategoricalEncoder::is_consistent))
    }

    pub fn encoder(&self, field: &str) -> Option<&CategoricalEncoder> {
        self.encoders.get(field)
    }

    pub fn imputer(&self) -> &MeanImputer {
        &self.imputer
    }

    pub fn unseen_policy(&self) -> UnseenPolicy {
        self.unseen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient(gender: &str, work: &str, smoking: &str, bmi: Option<f64>) -> Record {
        let mut r = Record::new()
            .with("gender", gender)
            .with("age", 54.0)
            .with("hypertension", 0)
            .with("heart_disease", 1)
            .with("ever_married", "Yes")
            .with("work_type", work)
            .with("Residence_type", "Urban")
            .with("avg_glucose_level", 101.5)
            .with("smoking_status", smoking);
        if let Some(b) = bmi {
            r.insert("bmi", b);
        }
        r
    }

    fn fitted(policy: UnseenPolicy) -> FeaturePipeline {
        let corpus = vec![
            patient("Male", "Private", "smokes", Some(20.0)),
            patient("Female", "Govt_job", "Unknown", None),
            patient("Female", "children", "never smoked", Some(30.0)),
        ];
        FeaturePipeline::fit(&corpus, policy).unwrap()
    }

    #[test]
    fn transform_emits_layout_order() {
        let p = fitted(UnseenPolicy::Remap);
        let v = p.transform(&patient("Male", "Private", "smokes", Some(22.0))).unwrap();
        assert_eq!(
            v.as_slice(),
            &[1.0, 54.0, 0.0, 1.0, 0.0, 1.0, 0.0, 101.5, 22.0, 2.0]
        );
    }

    #[test]
    fn key_insertion_order_is_irrelevant() {
        let p = fitted(UnseenPolicy::Remap);
        let forward = patient("Female", "children", "never smoked", None);
        let reversed: Record = [
            ("smoking_status", "never smoked"),
            ("Residence_type", "Urban"),
            ("work_type", "children"),
            ("ever_married", "Yes"),
            ("gender", "Female"),
        ]
        .into_iter()
        .collect::<Record>()
        .with("avg_glucose_level", 101.5)
        .with("heart_disease", 1)
        .with("hypertension", 0)
        .with("age", 54.0);
        assert_eq!(p.transform(&forward).unwrap(), p.transform(&reversed).unwrap());
    }

    #[test]
    fn missing_bmi_takes_training_mean() {
        let p = fitted(UnseenPolicy::Remap);
        let v = p.transform(&patient("Male", "Private", "smokes", None)).unwrap();
        assert_eq!(v.get("bmi"), Some(25.0));
        assert_eq!(v.get("bmi"), Some(p.imputer().fill_value()));
    }

    #[test]
    fn missing_required_field_is_malformed() {
        let p = fitted(UnseenPolicy::Remap);
        let mut r = patient("Male", "Private", "smokes", None);
        r.remove("smoking_status");
        assert_eq!(
            p.transform(&r),
            Err(RecordError::MissingField {
                field: "smoking_status".into()
            })
        );
    }

    #[test]
    fn policy_travels_with_the_pipeline() {
        let remap = fitted(UnseenPolicy::Remap);
        let v = remap
            .transform(&patient("Male", "Retired", "smokes", None))
            .unwrap();
        let enc = remap.encoder("work_type").unwrap();
        assert_eq!(v.get("work_type"), Some(enc.fallback_code() as f64));

        let reject = fitted(UnseenPolicy::Reject);
        assert!(matches!(
            reject.transform(&patient("Male", "Retired", "smokes", None)),
            Err(RecordError::UnseenCategory { .. })
        ));
    }

    #[test]
    fn fitted_pipeline_covers_every_categorical_field() {
        let mut p = fitted(UnseenPolicy::Remap);
        assert_eq!(p.incomplete_field(), None);
        p.encoders.remove("gender");
        assert_eq!(p.incomplete_field(), Some("gender"));
    }

    #[test]
    fn fit_reports_bad_rows() {
        let mut bad = patient("Male", "Private", "smokes", None);
        bad.remove("gender");
        let err = FeaturePipeline::fit(&[bad], UnseenPolicy::Remap).unwrap_err();
        assert!(matches!(err, PipelineError::NoObservations(ref f) if f == "bmi"));

        let mut bad = patient("Male", "Private", "smokes", Some(30.0));
        bad.remove("gender");
        let err = FeaturePipeline::fit(&[bad], UnseenPolicy::Remap).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRow { row: 0, .. }));
    }
}
