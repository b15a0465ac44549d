//! Error handling for the gait orientation pipeline
//!
//! One error type covers every stage. Each variant carries enough context
//! for an operator to locate the offending sensor file or review input.

use core::fmt;

/// Result type alias for pipeline operations
pub type GaitResult<T> = Result<T, GaitError>;

/// Error type for all pipeline operations
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum GaitError {
    /// Nearest-timestamp search over an empty index
    EmptySequence,

    /// Sensor class name not in the known set
    InvalidSensorClass {
        /// The name that failed to parse
        name: String,
    },

    /// Calibration windows cannot produce an orthogonal triad
    DegenerateCalibration {
        /// What went wrong (zero norm, collinear poses, empty window)
        reason: String,
    },

    /// Axis map has no row for a required target axis
    MissingAxisMapEntry {
        /// Target axis label (X, Y or Z)
        axis: char,
    },

    /// Axis map row could not be interpreted
    InvalidAxisMap {
        /// Description of the bad row
        reason: String,
    },

    /// Required sensor recording is absent
    MissingInputFile {
        /// Path that was looked up
        path: String,
    },

    /// Reviewer typed something that is not a usable window bound
    MalformedReviewInput {
        /// Raw text entered by the reviewer
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// Acquisition profile or filter parameters are unusable
    InvalidConfiguration {
        /// Description of the configuration error
        reason: String,
    },

    /// Too few samples for the requested operation
    InsufficientSamples {
        /// Samples needed
        required: usize,
        /// Samples present
        available: usize,
    },

    /// Stream violates its structural invariants
    InvalidStream {
        /// Description of the violation
        reason: String,
    },

    /// Time window bounds are unusable
    InvalidWindow {
        /// Description of the window problem
        reason: String,
    },

    /// Filesystem failure while reading or writing an artefact
    Io {
        /// File or operation involved
        context: String,
        /// Underlying error message
        message: String,
    },

    /// Tabular content could not be parsed
    Parse {
        /// File and row involved
        context: String,
        /// Underlying error message
        message: String,
    },
}

impl GaitError {
    /// Conditions the pipeline degrades around instead of aborting
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GaitError::MissingInputFile { .. } | GaitError::MalformedReviewInput { .. }
        )
    }

    /// Wrap an I/O error with the file it concerns
    pub fn io(context: impl Into<String>, err: impl fmt::Display) -> Self {
        GaitError::Io {
            context: context.into(),
            message: err.to_string(),
        }
    }

    /// Wrap a parse failure with the file/row it concerns
    pub fn parse(context: impl Into<String>, err: impl fmt::Display) -> Self {
        GaitError::Parse {
            context: context.into(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for GaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GaitError::EmptySequence => {
                write!(f, "Empty sequence: cannot search an empty timestamp index")
            }
            GaitError::InvalidSensorClass { name } => {
                write!(f, "Invalid sensor class: '{}'", name)
            }
            GaitError::DegenerateCalibration { reason } => {
                write!(f, "Degenerate calibration: {}", reason)
            }
            GaitError::MissingAxisMapEntry { axis } => {
                write!(f, "Axis map has no entry for target axis {}", axis)
            }
            GaitError::InvalidAxisMap { reason } => {
                write!(f, "Invalid axis map: {}", reason)
            }
            GaitError::MissingInputFile { path } => {
                write!(f, "Missing input file: {}", path)
            }
            GaitError::MalformedReviewInput { input, reason } => {
                write!(f, "Malformed review input '{}': {}", input, reason)
            }
            GaitError::InvalidConfiguration { reason } => {
                write!(f, "Invalid configuration: {}", reason)
            }
            GaitError::InsufficientSamples { required, available } => {
                write!(f, "Insufficient samples: required more than {}, available {}",
                       required, available)
            }
            GaitError::InvalidStream { reason } => {
                write!(f, "Invalid sensor stream: {}", reason)
            }
            GaitError::InvalidWindow { reason } => {
                write!(f, "Invalid time window: {}", reason)
            }
            GaitError::Io { context, message } => {
                write!(f, "I/O error ({}): {}", context, message)
            }
            GaitError::Parse { context, message } => {
                write!(f, "Parse error ({}): {}", context, message)
            }
        }
    }
}

impl std::error::Error for GaitError {}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::error::GaitError::InvalidConfiguration {
            reason: format!($($arg)*),
        }
    };
}

/// Convenience macro for creating degenerate-calibration errors
#[macro_export]
macro_rules! calibration_error {
    ($($arg:tt)*) => {
        $crate::error::GaitError::DegenerateCalibration {
            reason: format!($($arg)*),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = GaitError::InsufficientSamples {
            required: 15,
            available: 4,
        };
        let display = format!("{}", error);
        assert!(display.contains("Insufficient samples"));
        assert!(display.contains("15"));
        assert!(display.contains("4"));
    }

    #[test]
    fn test_error_equality() {
        let error1 = GaitError::MissingAxisMapEntry { axis: 'Y' };
        let error2 = GaitError::MissingAxisMapEntry { axis: 'Y' };
        assert_eq!(error1, error2);
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(GaitError::MissingInputFile { path: "DEV.csv".into() }.is_recoverable());
        assert!(GaitError::MalformedReviewInput {
            input: "abc".into(),
            reason: "not a number".into(),
        }
        .is_recoverable());
        assert!(!GaitError::EmptySequence.is_recoverable());
        assert!(!calibration_error!("zero norm").is_recoverable());
    }

    #[test]
    fn test_error_macros() {
        let err = config_error!("cutoff {} Hz above Nyquist", 30.0);
        assert_eq!(
            err,
            GaitError::InvalidConfiguration {
                reason: "cutoff 30 Hz above Nyquist".to_string()
            }
        );
    }
}
