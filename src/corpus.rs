//! Training corpus I/O through polars: CSV or Parquet in, encoded feature
//! table out.

use crate::records::{
    FeatureVector, FieldKind, Record, StrokeRecord, FEATURE_LAYOUT, LABEL_COLUMN,
};
use polars::prelude::*;
use polars_io::parquet::{ParquetReader, ParquetWriter};
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("cannot open corpus file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("polars failed on the corpus: {0}")]
    Polars(#[from] PolarsError),
    #[error("unsupported corpus format {path:?} (expected .csv or .parquet)")]
    Format { path: PathBuf },
    #[error("required column '{0}' not found in the corpus")]
    MissingColumn(String),
    #[error("column '{column}' has a missing value at row {row}")]
    MissingValue { column: String, row: usize },
    #[error("label column must be 0 or 1, found {value} at row {row}")]
    InvalidLabel { value: i32, row: usize },
    #[error("the corpus contains no rows")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Parquet,
}

impl TableFormat {
    pub fn infer(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(TableFormat::Csv),
            "parquet" | "pq" => Some(TableFormat::Parquet),
            _ => None,
        }
    }
}

/// Raw training rows plus their 0/1 stroke labels.
#[derive(Debug, Clone)]
pub struct TrainingCorpus {
    pub records: Vec<Record>,
    pub labels: Vec<i32>,
}

impl TrainingCorpus {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&y| y == 1).count()
    }
}

fn open(path: &Path) -> Result<File, CorpusError> {
    File::open(path).map_err(|source| CorpusError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_parquet<P: AsRef<Path>>(path: P) -> Result<DataFrame, CorpusError> {
    let file = open(path.as_ref())?;

    Ok(ParquetReader::new(file).finish()?)
}

pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<DataFrame, CorpusError> {
    let file = open(path.as_ref())?;

    Ok(CsvReader::new(file)
        .has_header(true)
        .with_dtypes(Option::from(Arc::new(StrokeRecord::raw_schema())))
        .finish()?)
}

pub fn write_csv(file_name: &Path, df: &mut DataFrame) -> Result<(), CorpusError> {
    let mut file = File::create(file_name).map_err(|source| CorpusError::Io {
        path: file_name.to_path_buf(),
        source,
    })?;

    CsvWriter::new(&mut file).finish(df)?;

    Ok(())
}

pub fn write_parquet(file_name: &Path, df: &mut DataFrame) -> Result<(), CorpusError> {
    let mut file = File::create(file_name).map_err(|source| CorpusError::Io {
        path: file_name.to_path_buf(),
        source,
    })?;

    ParquetWriter::new(&mut file).finish(df)?;

    Ok(())
}

pub fn read_corpus(path: &Path) -> Result<TrainingCorpus, CorpusError> {
    let df = match TableFormat::infer(path) {
        Some(TableFormat::Csv) => read_csv(path)?,
        Some(TableFormat::Parquet) => read_parquet(path)?,
        None => {
            return Err(CorpusError::Format {
                path: path.to_path_buf(),
            })
        }
    };
    log::info!("read {} rows x {} columns from {:?}", df.height(), df.width(), path);
    corpus_from_frame(df)
}

/// Selects the model columns, coerces their types and splits rows into records.
pub fn corpus_from_frame(df: DataFrame) -> Result<TrainingCorpus, CorpusError> {
    let present = df.get_column_names();
    for name in FEATURE_LAYOUT.iter().map(|d| d.name).chain([LABEL_COLUMN]) {
        if !present.contains(&name) {
            return Err(CorpusError::MissingColumn(name.to_string()));
        }
    }

    // bmi may arrive as text ("N/A"); a non-strict cast turns those into nulls.
    let mut selection: Vec<Expr> = FEATURE_LAYOUT
        .iter()
        .map(|d| match d.kind {
            FieldKind::Categorical => col(d.name).cast(DataType::Utf8),
            _ => col(d.name).cast(DataType::Float64),
        })
        .collect();
    selection.push(col(LABEL_COLUMN).cast(DataType::Int32));
    let df = df.lazy().select(selection).collect()?;

    let height = df.height();
    if height == 0 {
        return Err(CorpusError::Empty);
    }
    let mut records = vec![Record::new(); height];

    for descriptor in FEATURE_LAYOUT.iter() {
        let column = df.column(descriptor.name)?;
        match descriptor.kind {
            FieldKind::Categorical => {
                for (row, value) in column.utf8()?.into_iter().enumerate() {
                    let value = value.ok_or_else(|| CorpusError::MissingValue {
                        column: descriptor.name.to_string(),
                        row,
                    })?;
                    records[row].insert(descriptor.name, value);
                }
            }
            FieldKind::Imputed => {
                for (row, value) in column.f64()?.into_iter().enumerate() {
                    if let Some(value) = value {
                        records[row].insert(descriptor.name, value);
                    }
                }
            }
            FieldKind::Continuous | FieldKind::Binary => {
                for (row, value) in column.f64()?.into_iter().enumerate() {
                    let value = value.ok_or_else(|| CorpusError::MissingValue {
                        column: descriptor.name.to_string(),
                        row,
                    })?;
                    records[row].insert(descriptor.name, value);
                }
            }
        }
    }

    let labels = df
        .column(LABEL_COLUMN)?
        .i32()?
        .into_iter()
        .enumerate()
        .map(|(row, y)| match y {
            Some(y @ (0 | 1)) => Ok(y),
            Some(value) => Err(CorpusError::InvalidLabel { value, row }),
            None => Err(CorpusError::MissingValue {
                column: LABEL_COLUMN.to_string(),
                row,
            }),
        })
        .collect::<Result<Vec<i32>, _>>()?;

    Ok(TrainingCorpus { records, labels })
}

/// Writes the encoded training matrix (one column per feature, then the label)
/// as CSV or Parquet depending on the file extension.
pub fn export_features(
    path: &Path,
    features: &[FeatureVector],
    labels: &[i32],
) -> Result<(), CorpusError> {
    let mut columns: Vec<Series> = FEATURE_LAYOUT
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let values: Vec<f64> = features.iter().map(|v| v.as_slice()[i]).collect();
            Series::new(d.name, values)
        })
        .collect();
    columns.push(Series::new(LABEL_COLUMN, labels.to_vec()));
    let mut df = DataFrame::new(columns)?;

    match TableFormat::infer(path) {
        Some(TableFormat::Parquet) => write_parquet(path, &mut df),
        Some(TableFormat::Csv) => write_csv(path, &mut df),
        None => Err(CorpusError::Format {
            path: path.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "id,gender,age,hypertension,heart_disease,ever_married,work_type,Residence_type,avg_glucose_level,bmi,smoking_status,stroke";

    fn write_corpus(dir: &Path, rows: &[&str]) -> PathBuf {
        let path = dir.join("stroke.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "{HEADER}").unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        path
    }

    #[test]
    fn reads_csv_with_na_bmi() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_corpus(
            dir.path(),
            &[
                "9046,Male,67,0,1,Yes,Private,Urban,228.69,36.6,formerly smoked,1",
                "51676,Female,61,0,0,Yes,Self-employed,Rural,202.21,N/A,never smoked,1",
                "31112,Male,80,0,1,Yes,Private,Rural,105.92,32.5,never smoked,0",
            ],
        );
        let corpus = read_corpus(&path).unwrap();
        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.labels, vec![1, 1, 0]);
        assert_eq!(corpus.positives(), 2);
        assert_eq!(corpus.records[1].optional_number("bmi").unwrap(), None);
        assert_eq!(corpus.records[0].number("bmi").unwrap(), 36.6);
        assert_eq!(corpus.records[2].text("work_type").unwrap(), "Private");
        assert_eq!(corpus.records[0].number("hypertension").unwrap(), 0.0);
    }

    #[test]
    fn missing_column_is_reported() {
        let df = DataFrame::new(vec![
            Series::new("gender", &["Male"]),
            Series::new("age", &[3.0]),
        ])
        .unwrap();
        assert!(matches!(
            corpus_from_frame(df),
            Err(CorpusError::MissingColumn(ref c)) if c == "hypertension"
        ));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(matches!(
            read_corpus(Path::new("stroke.xlsx")),
            Err(CorpusError::Format { .. })
        ));
    }

    #[test]
    fn export_round_trips_through_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.csv");
        let rows = vec![
            FeatureVector::new([1.0, 67.0, 0.0, 1.0, 1.0, 2.0, 1.0, 228.69, 36.6, 0.0]),
            FeatureVector::new([0.0, 61.0, 0.0, 0.0, 1.0, 3.0, 0.0, 202.21, 28.9, 1.0]),
        ];
        export_features(&path, &rows, &[1, 0]).unwrap();

        let df = CsvReader::from_path(&path).unwrap().has_header(true).finish().unwrap();
        assert_eq!(df.height(), 2);
        let names: Vec<&str> = df.get_column_names();
        assert_eq!(names.first(), Some(&"gender"));
        assert_eq!(names.last(), Some(&LABEL_COLUMN));
        assert_eq!(names.len(), 11);
    }
}
