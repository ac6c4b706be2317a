use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Dataset contains no records")]
    EmptyDataset,

    #[error("Record {row} is missing column '{column}'")]
    MissingColumn { row: usize, column: String },

    #[error("Invalid numeric value '{value}' in column '{column}' (record {row})")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Unknown metric column '{0}'")]
    UnknownMetric(String),

    #[error("Sample data generation failed: {0}")]
    SampleError(String),

    #[error("Invalid month key '{0}': expected YYYY-MM")]
    InvalidMonthKey(String),

    #[error("Invalid year range {start}..={end}: start is after end")]
    InvalidYearRange { start: i32, end: i32 },

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
