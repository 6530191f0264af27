use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No nearby vertices found for snapping")]
    NoVertexFound,
    #[error("Invalid vertex index")]
    InvalidVertexIndex,
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Elevation cache error: {0}")]
    CacheError(String),
    #[error("Elevation build did not finish within {0:?}")]
    BuildDeadlineExceeded(std::time::Duration),
}
