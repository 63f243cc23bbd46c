use thiserror::Error;

use market::error::BookError;
use market::wire::WireError;

/// Reasons an update is dropped before any metrics are produced.
///
/// None of these stop the ingestion loop.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("undecodable message: {0}")]
    Wire(#[from] WireError),

    #[error("update rejected: {0}")]
    Book(#[from] BookError),
}
