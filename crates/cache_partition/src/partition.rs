// Splitting an index range into contiguous per-worker blocks.

use crate::{InvalidArgument, Result};
use std::fmt;

/// Half-open interval `[start, end)` of array indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IndexRange {
    pub start: usize,
    pub end: usize,
}

impl IndexRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "range start {start} past end {end}");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index < self.end
    }

    pub fn as_range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

impl From<IndexRange> for std::ops::Range<usize> {
    fn from(range: IndexRange) -> Self {
        range.as_range()
    }
}

impl fmt::Display for IndexRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Everything needed to compute the range of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionRequest {
    pub worker_count: usize,
    pub total_elements: usize,
    /// Elements per alignment unit, e.g. `64 / size_of::<f32>()`.
    pub block_size: usize,
    pub worker_id: usize,
    pub handle_edge_low: bool,
}

impl PartitionRequest {
    pub fn range(&self) -> Result<IndexRange> {
        thread_block_partition(
            self.worker_count,
            self.total_elements,
            self.block_size,
            self.worker_id,
            self.handle_edge_low,
        )
    }
}

/// Computes the contiguous range of indices owned by `worker_id`.
///
/// The ranges of workers `0..worker_count` are contiguous, disjoint, ordered
/// by worker id and together cover `[0, total_elements)`.
///
/// __Arguments:__
///
/// + `worker_count` - number of workers sharing the range, at least 1
///
/// + `total_elements` - length of the range being split
///
/// + `block_size` - elements per alignment unit, at least 1
///
/// + `worker_id` - the worker whose range is computed, below `worker_count`
///
/// + `handle_edge_low` - if false the elements are split evenly with the
///   remainder going one element each to the lowest worker ids, and
///   `block_size` has no effect; if true the range is split in whole blocks
///   of `block_size` elements, extra blocks go to the lowest worker ids, and
///   the partial edge block is attached to the low end of worker 0
///
/// With `handle_edge_low` false the range lengths differ by at most one
/// element. With it true only the whole block counts differ by at most one:
/// worker 0 also carries the edge, so element lengths can differ by up to a
/// block plus the edge. `partition_all(2, 70, 16, true)` gives lengths 38
/// and 32.
pub fn thread_block_partition(
    worker_count: usize,
    total_elements: usize,
    block_size: usize,
    worker_id: usize,
    handle_edge_low: bool,
) -> Result<IndexRange> {
    check_arguments(worker_count, block_size)?;
    if worker_id >= worker_count {
        return Err(InvalidArgument::WorkerOutOfRange {
            worker_id,
            worker_count,
        });
    }

    if !handle_edge_low {
        let start = spread_start(worker_count, total_elements, worker_id);
        let end = spread_start(worker_count, total_elements, worker_id + 1);
        return Ok(IndexRange::new(start, end));
    }

    let blocks = total_elements / block_size;
    let edge = total_elements % block_size;

    let start = if worker_id == 0 {
        0
    } else {
        edge + spread_start(worker_count, blocks, worker_id) * block_size
    };
    let end = edge + spread_start(worker_count, blocks, worker_id + 1) * block_size;

    Ok(IndexRange::new(start, end))
}

/// Ranges for every worker id in order.
pub fn partition_all(
    worker_count: usize,
    total_elements: usize,
    block_size: usize,
    handle_edge_low: bool,
) -> Result<Vec<IndexRange>> {
    check_arguments(worker_count, block_size)?;

    (0..worker_count)
        .map(|worker_id| {
            thread_block_partition(
                worker_count,
                total_elements,
                block_size,
                worker_id,
                handle_edge_low,
            )
        })
        .collect()
}

fn check_arguments(worker_count: usize, block_size: usize) -> Result<()> {
    if worker_count == 0 {
        return Err(InvalidArgument::NoWorkers);
    }
    if block_size == 0 {
        return Err(InvalidArgument::ZeroBlockSize);
    }
    Ok(())
}

// Start of worker `id` when `total` items are split into `count` shares and
// the first `total % count` shares get one extra item. Valid for `id == count`,
// which gives `total`.
fn spread_start(count: usize, total: usize, id: usize) -> usize {
    let chunk = total / count;
    let leftover = total % count;
    id * chunk + id.min(leftover)
}
