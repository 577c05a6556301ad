use thiserror::Error;

/// Failure kinds raised by the backtesting core.
///
/// `Configuration` aborts before any simulation starts, `DataIntegrity` aborts
/// the run that hit it, and `InsufficientData` is only raised for genuinely
/// unexpected gaps (the engine turns it into a zero-buy day).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("data integrity error: {0}")]
    DataIntegrity(String),
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    #[error("i/o error: {0}")]
    Io(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("worker failure: {0}")]
    Worker(String),
}

impl BacktestError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn data_integrity(message: impl Into<String>) -> Self {
        Self::DataIntegrity(message.into())
    }

    pub fn insufficient_data(message: impl Into<String>) -> Self {
        Self::InsufficientData(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::DataIntegrity(_) => "data_integrity",
            Self::InsufficientData(_) => "insufficient_data",
            Self::Io(_) => "io",
            Self::Decode(_) => "decode",
            Self::Worker(_) => "worker",
        }
    }
}

impl From<std::io::Error> for BacktestError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BacktestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<bincode::Error> for BacktestError {
    fn from(err: bincode::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

pub type BacktestResult<T> = std::result::Result<T, BacktestError>;
