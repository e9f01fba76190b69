use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Bitshuffle(#[from] bitshuffle_core::BitshuffleError),
    #[error(transparent)]
    ZStandard(#[from] bitshuffle_zstd::ZStandardError),
    /// The input does not fit the requested element size or is not a compressed chunk.
    #[error("{0}")]
    InvalidInput(String),
    #[cfg(feature = "multithreaded")]
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
