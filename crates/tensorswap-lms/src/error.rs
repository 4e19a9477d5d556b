//! Error types for the large-model-support engine.

use tensorswap_ir::IrError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LmsError {
    #[error("The dataflow graph is required but has not been provided")]
    MissingGraph,
    #[error("Invalid value for sync_mode: {0} (expected 0, 1, 2 or 3)")]
    InvalidSyncMode(u8),
    #[error("Graph error: {0}")]
    Graph(#[from] IrError),
}

pub type LmsResult<T> = Result<T, LmsError>;
