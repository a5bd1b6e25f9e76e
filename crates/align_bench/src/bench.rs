// Benchmark drivers: allocate, time, check for false sharing.

use crate::buffer::Element;
use crate::config::BenchConfig;
use crate::kernels::{OutputBuffer, arithmetic_input};
use crate::results::ResultRow;
use crate::{BenchError, Result};
use cache_partition::{IndexRange, OverlapDetector, OverlapReport, elements_per_unit, partition_all};
use ndarray::Array1;
use rayon::ThreadPool;
use std::time::{Duration, Instant};

/// Mean wall time of `runs` calls to `f`.
pub fn time_runs<F>(runs: usize, mut f: F) -> Result<Duration>
where
    F: FnMut() -> Result<()>,
{
    if runs == 0 {
        return Err(BenchError::InvalidConfig("runs must be at least 1".into()));
    }

    let mut total = Duration::ZERO;
    for run in 0..runs {
        let start = Instant::now();
        f()?;
        let elapsed = start.elapsed();
        log::debug!("run {run}: {:.6}s", elapsed.as_secs_f64());
        total += elapsed;
    }
    Ok(total.div_f64(runs as f64))
}

/// Partitions `data` over `threads` workers the way the blocked kernels do
/// and checks the resulting spans against the real buffer address.
pub fn find_false_sharing<T>(data: &[T], threads: usize, cache_line_size: usize) -> Result<OverlapReport> {
    false_sharing_at::<T>(data.as_ptr() as usize, data.len(), threads, cache_line_size)
}

/// As `find_false_sharing`, for `len` values of `T` at `address`, which need
/// not be aligned for `T`.
pub fn false_sharing_at<T>(
    address: usize,
    len: usize,
    threads: usize,
    cache_line_size: usize,
) -> Result<OverlapReport> {
    let block_size = elements_per_unit::<T>(cache_line_size);
    let ranges = partition_all(threads, len, block_size, false)?;
    let detector = OverlapDetector::new(address, std::mem::size_of::<T>(), cache_line_size)?;
    Ok(detector.detect(&ranges))
}

fn contiguous(array: &Array1<f32>) -> Result<&[f32]> {
    array
        .as_slice()
        .ok_or_else(|| BenchError::InvalidConfig("input array is not contiguous".into()))
}

fn worker_ranges<T: Element>(config: &BenchConfig) -> Result<Vec<IndexRange>> {
    let block_size = elements_per_unit::<T>(config.cache_line_size);
    Ok(partition_all(
        config.threads,
        config.array_size,
        block_size,
        false,
    )?)
}

fn log_placement(label: &str, buffer: &OutputBuffer, cache_line_size: usize) {
    log::info!(
        "{label} data address: {:#x} (aligned: {})",
        buffer.address(),
        if buffer.is_aligned_to(cache_line_size) { "YES" } else { "NO" }
    );
}

fn buffer_false_sharing(buffer: &OutputBuffer, config: &BenchConfig) -> Result<OverlapReport> {
    false_sharing_at::<f32>(
        buffer.address(),
        buffer.len(),
        config.threads,
        config.cache_line_size,
    )
}

/// Vector addition timings for one output buffer placement.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementTimings {
    pub address: usize,
    pub static_chunks: Duration,
    pub blocked: Duration,
    pub interleaved: Duration,
    pub false_sharing: OverlapReport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorAddReport {
    pub threads: usize,
    pub offset_bytes: usize,
    pub aligned: PlacementTimings,
    pub misaligned: PlacementTimings,
}

fn time_vector_add(
    a: &[f32],
    b: &[f32],
    c: &mut OutputBuffer,
    ranges: &[IndexRange],
    thread_pool: &ThreadPool,
    config: &BenchConfig,
) -> Result<PlacementTimings> {
    let static_chunks = time_runs(config.runs, || {
        c.add_static(a, b, thread_pool);
        Ok(())
    })?;
    let blocked = time_runs(config.runs, || c.add_blocked(a, b, ranges, thread_pool))?;
    let interleaved = time_runs(config.runs, || {
        c.add_interleaved(a, b, thread_pool);
        Ok(())
    })?;
    let false_sharing = buffer_false_sharing(c, config)?;

    Ok(PlacementTimings {
        address: c.address(),
        static_chunks,
        blocked,
        interleaved,
        false_sharing,
    })
}

/// `C = A + B` into an aligned and a misaligned output buffer. Any byte
/// offset is accepted; offsets that break `f32` alignment use unaligned
/// stores.
pub fn run_vector_add(config: &BenchConfig) -> Result<VectorAddReport> {
    config.validate()?;
    let thread_pool = config.thread_pool()?;
    let n = config.array_size;

    let a = Array1::<f32>::from_elem(n, 1.0);
    let b = Array1::<f32>::from_elem(n, 2.0);
    let (a, b) = (contiguous(&a)?, contiguous(&b)?);
    let ranges = worker_ranges::<f32>(config)?;

    let mut c_aligned = OutputBuffer::new(n, config.cache_line_size, 0)?;
    log_placement("Aligned", &c_aligned, config.cache_line_size);
    let aligned = time_vector_add(a, b, &mut c_aligned, &ranges, &thread_pool, config)?;

    let mut c_misaligned = OutputBuffer::new(n, config.cache_line_size, config.offset_bytes)?;
    log_placement("Misaligned", &c_misaligned, config.cache_line_size);
    let misaligned = time_vector_add(a, b, &mut c_misaligned, &ranges, &thread_pool, config)?;

    Ok(VectorAddReport {
        threads: config.threads,
        offset_bytes: config.offset_bytes,
        aligned,
        misaligned,
    })
}

/// Aligned vs misaligned timing of one kernel, with the false sharing
/// verdict for each placement.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentComparison {
    pub threads: usize,
    pub offset_bytes: usize,
    pub aligned_address: usize,
    pub misaligned_address: usize,
    pub aligned_time: Duration,
    pub misaligned_time: Duration,
    pub aligned_report: OverlapReport,
    pub misaligned_report: OverlapReport,
}

impl AlignmentComparison {
    /// How many times slower the misaligned run was.
    pub fn speedup(&self) -> f64 {
        self.misaligned_time.as_secs_f64() / self.aligned_time.as_secs_f64()
    }

    pub fn to_row(&self) -> ResultRow {
        ResultRow {
            threads: self.threads,
            offset: self.offset_bytes,
            aligned_time: self.aligned_time.as_secs_f64(),
            misaligned_time: self.misaligned_time.as_secs_f64(),
            speedup: self.speedup(),
            aligned_false_sharing: self.aligned_report.has_false_sharing(),
            misaligned_false_sharing: self.misaligned_report.has_false_sharing(),
        }
    }
}

/// In place `sqrt(x) + sin(x) * cos(x)` over an aligned and a misaligned
/// copy of the same input.
pub fn run_arithmetic(config: &BenchConfig) -> Result<AlignmentComparison> {
    config.validate()?;
    let thread_pool = config.thread_pool()?;

    let input = arithmetic_input(config.array_size);
    let input = contiguous(&input)?;
    let ranges = worker_ranges::<f32>(config)?;

    let mut aligned = OutputBuffer::from_slice(input, config.cache_line_size, 0)?;
    log_placement("Aligned", &aligned, config.cache_line_size);
    let aligned_time = time_runs(config.runs, || aligned.arithmetic(&ranges, &thread_pool))?;
    log::info!("Aligned: {:.6} sec", aligned_time.as_secs_f64());
    let aligned_report = buffer_false_sharing(&aligned, config)?;

    let mut misaligned =
        OutputBuffer::from_slice(input, config.cache_line_size, config.offset_bytes)?;
    log_placement("Misaligned", &misaligned, config.cache_line_size);
    let misaligned_time = time_runs(config.runs, || misaligned.arithmetic(&ranges, &thread_pool))?;
    log::info!("Misaligned: {:.6} sec", misaligned_time.as_secs_f64());
    let misaligned_report = buffer_false_sharing(&misaligned, config)?;

    Ok(AlignmentComparison {
        threads: config.threads,
        offset_bytes: config.offset_bytes,
        aligned_address: aligned.address(),
        misaligned_address: misaligned.address(),
        aligned_time,
        misaligned_time,
        aligned_report,
        misaligned_report,
    })
}
