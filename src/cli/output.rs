//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::cli::help::usage_hint;
use crate::error::MirrorError;

/// Map run errors to the single diagnostic the binary prints.
pub fn map_error(e: &MirrorError) -> String {
    match e {
        MirrorError::Usage(msg) => format!("{}\n{}", msg, usage_hint()),
        other => other.to_string(),
    }
}
