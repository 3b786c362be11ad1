//! Engine error types

use thiserror::Error;

/// Errors reported by the waveform engine and region store
///
/// None of these are fatal: the engine stays usable after every one of them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The decode/playback collaborator could not load the source
    #[error("Failed to load audio source: {0}")]
    LoadFailure(String),

    /// Command issued in a state that forbids it (e.g. seek while idle)
    #[error("Cannot {command} while {state}")]
    InvalidState {
        command: &'static str,
        state: &'static str,
    },

    /// Region operation on an unknown id
    #[error("Region not found: {0}")]
    NotFound(String),

    /// Malformed time, zoom, or region bounds
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Reject negative or non-finite time values
pub(crate) fn check_time(value: f64, what: &str) -> EngineResult<f64> {
    if !value.is_finite() {
        return Err(EngineError::InvalidArgument(format!("{what} is not finite")));
    }
    if value < 0.0 {
        return Err(EngineError::InvalidArgument(format!(
            "{what} must not be negative (got {value})"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_time() {
        assert_eq!(check_time(1.5, "start"), Ok(1.5));
        assert_eq!(check_time(0.0, "start"), Ok(0.0));
        assert!(matches!(
            check_time(-0.1, "start"),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            check_time(f64::NAN, "start"),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_invalid_state_message() {
        let err = EngineError::InvalidState {
            command: "seek",
            state: "idle",
        };
        assert_eq!(err.to_string(), "Cannot seek while idle");
    }
}
