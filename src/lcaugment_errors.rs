use thiserror::Error;

#[derive(Error, Debug)]
pub enum LcAugmentError {
    #[error("Mismatched observation columns: time={time}, magnitude={mag}, error={err}")]
    MismatchedColumns { time: usize, mag: usize, err: usize },

    #[error("Observation set is empty")]
    EmptyObservationSet,

    #[error("Degenerate period estimate: {0}")]
    DegenerateEstimate(String),

    #[error("Regression model fit failed: {0}")]
    ModelFitFailure(String),

    #[error("Regression model queried before being fitted")]
    ModelNotFitted,

    #[error("Invalid period: {0}")]
    InvalidPeriod(f64),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid sampling range: {0}")]
    InvalidSamplingRange(String),

    #[error("Missing reference data for star {0}")]
    MissingReference(String),

    #[error("Missing column in table: {0}")]
    MissingColumn(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

impl PartialEq for LcAugmentError {
    fn eq(&self, other: &Self) -> bool {
        use LcAugmentError::*;
        match (self, other) {
            (
                MismatchedColumns {
                    time: t1,
                    mag: m1,
                    err: e1,
                },
                MismatchedColumns {
                    time: t2,
                    mag: m2,
                    err: e2,
                },
            ) => t1 == t2 && m1 == m2 && e1 == e2,
            (DegenerateEstimate(a), DegenerateEstimate(b)) => a == b,
            (ModelFitFailure(a), ModelFitFailure(b)) => a == b,
            (InvalidPeriod(a), InvalidPeriod(b)) => a.to_bits() == b.to_bits(),
            (InvalidParameter(a), InvalidParameter(b)) => a == b,
            (InvalidSamplingRange(a), InvalidSamplingRange(b)) => a == b,
            (MissingReference(a), MissingReference(b)) => a == b,
            (MissingColumn(a), MissingColumn(b)) => a == b,

            // Wrapped foreign errors are not comparable: equal if same variant
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,

            (EmptyObservationSet, EmptyObservationSet) => true,
            (ModelNotFitted, ModelNotFitted) => true,

            _ => false,
        }
    }
}

impl LcAugmentError {
    /// `true` for the errors that end a star's processing without being a
    /// fault of the pipeline itself (degenerate estimates).
    pub fn is_degenerate_estimate(&self) -> bool {
        matches!(self, LcAugmentError::DegenerateEstimate(_))
    }
}
