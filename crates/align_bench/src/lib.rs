// top-level library module


pub mod bench;
pub mod buffer;
pub mod config;
pub mod kernels;
pub mod layout;
pub mod results;
pub mod system_info;

use cache_partition::InvalidArgument;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("offset of {offset} bytes does not keep {type_name} values aligned to {align} bytes")]
    UnalignedOffset {
        offset: usize,
        align: usize,
        type_name: &'static str,
    },

    #[error(transparent)]
    Partition(#[from] InvalidArgument),

    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("{path}:{line}: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BenchError>;
