use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Failures that abort one analysis run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// No row carried a usable sample.
    #[error("no usable samples in the strip")]
    EmptySeries,

    /// The strip spans no time, so the sampling rate is undefined.
    #[error("degenerate strip: duration is {duration}")]
    DegenerateInput { duration: f64 },

    /// Running-mean window collapsed to zero samples or exceeds twice the series.
    #[error("invalid running-mean window of {size} samples for {len} values")]
    InvalidWindow { size: usize, len: usize },

    /// Every offset candidate was outside the plausible interval range.
    #[error("all offset scores are out of range")]
    AllNan,

    #[error("invalid analysis configuration: {0}")]
    InvalidConfig(String),
}

/// Why a single raw row was dropped during cleaning.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowError {
    #[error("missing {0} field")]
    MissingField(&'static str),

    #[error("{field} field is not numeric: {value:?}")]
    NotNumeric { field: &'static str, value: String },

    #[error("{0} value is NaN")]
    Missing(&'static str),
}

/// A row dropped during cleaning, with its position in the input.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("row {index}: {reason}")]
pub struct MalformedRow {
    pub index: usize,
    pub reason: RowError,
}
