//! Shared data types and error enums for the pit monitoring service.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Water level reading
// ---------------------------------------------------------------------------

/// One timestamped water depth measurement.
///
/// `timestamp` is milliseconds since the Unix epoch; `value` is the water
/// depth in centimeters. Readings are constructed by the measurement loop
/// after a successful sample + convert cycle and are never mutated
/// afterwards; they end their life serialized into the database or into a
/// query response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: i64,
    pub value: f64,
}

impl Reading {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Checks that both fields are non-negative.
    ///
    /// Runs before any persistence attempt: a reading that fails here is
    /// rejected outright and never partially stored. All violations are
    /// collected into a single error message.
    pub fn validate(&self) -> Result<(), ReadingError> {
        let mut errors = Vec::new();
        if self.timestamp < 0 {
            errors.push("timestamp must be non-negative");
        }
        if !(self.value >= 0.0) {
            errors.push("value must be non-negative");
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ReadingError::InvalidReading(errors.join(", ")))
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Reading validation error.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadingError {
    /// Timestamp or value missing the non-negativity invariant.
    /// Retrying with the same data will fail again.
    InvalidReading(String),
}

impl std::fmt::Display for ReadingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadingError::InvalidReading(msg) => write!(f, "invalid reading: {}", msg),
        }
    }
}

impl std::error::Error for ReadingError {}

/// Sampling error.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleError {
    /// The sample window collapsed to empty after extremes removal.
    /// The caller should skip the cycle and retry next period.
    InsufficientSamples { collected: usize },
}

impl std::fmt::Display for SampleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleError::InsufficientSamples { collected } => write!(
                f,
                "insufficient samples: window of {} collapsed to empty after dropping extremes",
                collected
            ),
        }
    }
}

impl std::error::Error for SampleError {}

/// Storage-layer error.
#[derive(Debug)]
pub enum StorageError {
    /// Opening the database file failed.
    ConnectionFailed(rusqlite::Error),
    /// Schema DDL failed at startup. Fatal: the service cannot operate
    /// without its table.
    InitializationFailed(rusqlite::Error),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::ConnectionFailed(e) => {
                write!(f, "failed to open database connection: {}", e)
            }
            StorageError::InitializationFailed(e) => {
                write!(f, "failed to initialize database schema: {}", e)
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::ConnectionFailed(e) => Some(e),
            StorageError::InitializationFailed(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
