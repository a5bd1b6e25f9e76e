#[cfg(test)]
mod tests;

// Home of the thread range partitioning and the false sharing analysis.

pub mod overlap;
pub mod partition;

pub use overlap::{
    AddressedRange, CACHE_LINE_SIZE, Conflict, OverlapDetector, OverlapReport, ScanMode, UnitSpan,
    detect_false_sharing, elements_per_unit, is_aligned,
};
pub use partition::{IndexRange, PartitionRequest, partition_all, thread_block_partition};

use thiserror::Error;

/// Arguments rejected by the partitioner or the overlap detector.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidArgument {
    #[error("worker_count must be greater than 0")]
    NoWorkers,

    #[error("worker_id {worker_id} is out of range for {worker_count} workers")]
    WorkerOutOfRange {
        worker_id: usize,
        worker_count: usize,
    },

    #[error("block_size must be greater than 0")]
    ZeroBlockSize,

    #[error("element_size must be greater than 0")]
    ZeroElementSize,

    #[error("alignment unit size must be greater than 0")]
    ZeroUnitSize,
}

pub type Result<T> = std::result::Result<T, InvalidArgument>;
