//! Domain error types.

/// Top-level error type for portopt.
///
/// The ordered index and the frontier never return these: a contract
/// violation there panics, and an expected negative result is a `bool` or an
/// `Option`. Everything that touches files, the price cache or user config
/// reports through this enum.
#[derive(Debug, thiserror::Error)]
pub enum PortoptError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

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

    #[error("CSV parse error in {source_name}: {reason}")]
    CsvParse { source_name: String, reason: String },

    #[error("no price data for {ticker}")]
    NoData { ticker: String },

    #[error("insufficient price data for {ticker}: have {samples} samples, need {minimum}")]
    InsufficientData {
        ticker: String,
        samples: usize,
        minimum: usize,
    },

    #[error("cannot intersect date ranges sampled every {left} and {right} days")]
    IntervalMismatch { left: i64, right: i64 },

    #[error("portfolio has no weighted securities")]
    EmptyPortfolio,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PortoptError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            PortoptError::Io(_) => 1,
            PortoptError::ConfigParse { .. }
            | PortoptError::ConfigMissing { .. }
            | PortoptError::ConfigInvalid { .. } => 2,
            PortoptError::Database { .. } | PortoptError::DatabaseQuery { .. } => 3,
            PortoptError::CsvParse { .. } => 4,
            PortoptError::NoData { .. }
            | PortoptError::InsufficientData { .. }
            | PortoptError::IntervalMismatch { .. }
            | PortoptError::EmptyPortfolio => 5,
        }
    }
}

impl From<&PortoptError> for std::process::ExitCode {
    fn from(err: &PortoptError) -> Self {
        std::process::ExitCode::from(err.exit_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_map_to_exit_code_two() {
        let err = PortoptError::ConfigMissing {
            section: "search".into(),
            key: "tickers".into(),
        };
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.to_string(), "missing config key [search] tickers");
    }

    #[test]
    fn data_errors_map_to_exit_code_five() {
        let err = PortoptError::InsufficientData {
            ticker: "VTI".into(),
            samples: 1,
            minimum: 2,
        };
        assert_eq!(err.exit_code(), 5);
        assert_eq!(
            err.to_string(),
            "insufficient price data for VTI: have 1 samples, need 2"
        );
    }

    #[test]
    fn csv_errors_map_to_exit_code_four() {
        let err = PortoptError::CsvParse {
            source_name: "C.csv".into(),
            reason: "invalid close value".into(),
        };
        assert_eq!(err.exit_code(), 4);
    }
}
