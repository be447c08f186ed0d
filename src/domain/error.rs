//! Domain error types.
//!
//! Every failure of a backtest request maps to exactly one variant. The
//! `Display` text of the request-level variants is the message surfaced to
//! the caller verbatim.

/// Stable, machine-readable classification of a [`BacktestError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    DataUnavailable,
    InsufficientData,
    Engine,
    Cancelled,
    Config,
    Io,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::DataUnavailable => "data_unavailable",
            ErrorKind::InsufficientData => "insufficient_data",
            ErrorKind::Engine => "engine_error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Config => "config_error",
            ErrorKind::Io => "io_error",
        }
    }
}

/// Top-level error type for blindquants.
#[derive(Debug, thiserror::Error)]
pub enum BacktestError {
    #[error("{reason}")]
    Validation { reason: String },

    #[error("Stock {symbol} not found.")]
    NotFound { symbol: String },

    #[error("{reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error(
        "Data length ({bars}) for {symbol} insufficient (needs ~{required} bars for {timeframe})."
    )]
    InsufficientData {
        symbol: String,
        bars: usize,
        required: usize,
        timeframe: String,
    },

    #[error("Error during backtest: {reason}")]
    Engine { reason: String },

    #[error("Backtest cancelled.")]
    Cancelled,

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BacktestError {
    pub fn validation(reason: impl Into<String>) -> Self {
        BacktestError::Validation {
            reason: reason.into(),
        }
    }

    pub fn data_unavailable(symbol: &str, reason: impl Into<String>) -> Self {
        BacktestError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    pub fn engine(reason: impl Into<String>) -> Self {
        BacktestError::Engine {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BacktestError::Validation { .. } => ErrorKind::Validation,
            BacktestError::NotFound { .. } => ErrorKind::NotFound,
            BacktestError::DataUnavailable { .. } => ErrorKind::DataUnavailable,
            BacktestError::InsufficientData { .. } => ErrorKind::InsufficientData,
            BacktestError::Engine { .. } => ErrorKind::Engine,
            BacktestError::Cancelled => ErrorKind::Cancelled,
            BacktestError::ConfigParse { .. }
            | BacktestError::ConfigMissing { .. }
            | BacktestError::ConfigInvalid { .. } => ErrorKind::Config,
            BacktestError::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<&BacktestError> for std::process::ExitCode {
    fn from(err: &BacktestError) -> Self {
        let code: u8 = match err.kind() {
            ErrorKind::Io => 1,
            ErrorKind::Config => 2,
            ErrorKind::Validation => 3,
            ErrorKind::NotFound => 4,
            ErrorKind::DataUnavailable | ErrorKind::InsufficientData => 5,
            ErrorKind::Engine => 6,
            ErrorKind::Cancelled => 7,
        };
        std::process::ExitCode::from(code)
    }
}
