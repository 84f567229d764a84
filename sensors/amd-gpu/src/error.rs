//! Error handling for gpu_metrics decoding and device access.

use gpumetrics_rs_core::SensorError;
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to decode a metrics record.
///
/// A correctly sized buffer always decodes, so a short buffer is the only
/// way a parse can fail.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MetricsError {
    /// Buffer shorter than the fixed record size
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },
}

/// Errors raised while reading one card's metrics file.
#[derive(Debug, Error)]
pub enum CardError {
    /// The metrics file could not be opened or read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file was read but its contents did not decode
    #[error("card {card}: {source}")]
    Metrics {
        card: u32,
        #[source]
        source: MetricsError,
    },
}

impl From<MetricsError> for SensorError {
    fn from(err: MetricsError) -> Self {
        match err {
            MetricsError::ShortRead { expected, actual } => SensorError::invalid_data_with_value(
                "gpu_metrics record too short",
                format!("expected {expected} bytes, read {actual}"),
            ),
        }
    }
}

impl CardError {
    /// True for read failures that may clear on the next attempt, such as a
    /// device that is busy or resuming.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Io { source, .. } => matches!(
                source.kind(),
                ErrorKind::ResourceBusy
                    | ErrorKind::WouldBlock
                    | ErrorKind::Interrupted
                    | ErrorKind::TimedOut
            ),
            Self::Metrics { .. } => false,
        }
    }
}

impl From<CardError> for SensorError {
    fn from(err: CardError) -> Self {
        if err.is_transient() {
            return SensorError::temporarily_unavailable(err.to_string());
        }
        match err {
            CardError::Io { source, .. } => SensorError::Io(source),
            CardError::Metrics { source, .. } => source.into(),
        }
    }
}
