//! Process exit codes.

use cadence_config::ConfigError;
use cadence_core::{PipelineError, RunOutcome};

/// Every branch completed.
pub const SUCCESS: u8 = 0;
/// Configuration, I/O or usage error.
pub const FAILURE: u8 = 1;
/// The pipeline graph was rejected before any frame flowed.
pub const GRAPH_INVALID: u8 = 2;
/// The source could not be decoded.
pub const DECODE_FAILURE: u8 = 3;
/// Some branches failed, at least one produced output.
pub const PARTIAL: u8 = 4;
/// Every branch failed.
pub const ALL_FAILED: u8 = 5;
/// Interrupted with Ctrl+C.
pub const CANCELLED: u8 = 130;

/// Exit code for a finished run.
pub fn code_for_outcome(outcome: RunOutcome) -> u8 {
    match outcome {
        RunOutcome::Complete => SUCCESS,
        RunOutcome::Partial => PARTIAL,
        RunOutcome::Failed => ALL_FAILED,
        RunOutcome::Cancelled => CANCELLED,
    }
}

/// Exit code for an error that aborted a command.
pub fn code_for_error(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(err) = cause.downcast_ref::<PipelineError>() {
            return match err {
                PipelineError::GraphInvalid(_) => GRAPH_INVALID,
                PipelineError::Decode(_) => DECODE_FAILURE,
                _ => FAILURE,
            };
        }
        if let Some(ConfigError::Graph(_)) = cause.downcast_ref::<ConfigError>() {
            return GRAPH_INVALID;
        }
    }
    FAILURE
}
