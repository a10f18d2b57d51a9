use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("data source is missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("no records to aggregate")]
    EmptyTable,

    #[error("failed to open {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV input")]
    Csv(#[from] csv::Error),

    #[error("line {line}: column {column} is empty")]
    MissingValue { line: u64, column: String },

    #[error("line {line}: column {column} has invalid value {value:?}")]
    InvalidValue {
        line: u64,
        column: String,
        value: String,
    },

    #[error("line {line}: {column} score {value} is outside 0..=100")]
    ScoreOutOfRange { line: u64, column: String, value: f64 },
}
