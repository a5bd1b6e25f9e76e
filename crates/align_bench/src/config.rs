// Benchmark parameters, formerly compile-time constants.

use crate::{BenchError, Result};
use cache_partition::CACHE_LINE_SIZE;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::path::PathBuf;

/// Elements in the vector addition benchmark.
pub const ADD_ARRAY_SIZE: usize = 1024 * 1024;
/// Elements in the arithmetic benchmark; one extra block of 1024 so the
/// size is not a power of two.
pub const ARITHMETIC_ARRAY_SIZE: usize = 1024 * 1025;
pub const NUM_RUNS: usize = 10;
/// One `f32` past a cache line boundary.
pub const OFFSET_BYTES: usize = std::mem::size_of::<f32>();

pub const CSV_PATH: &str = "benchmark_results.csv";
pub const SYSTEM_INFO_PATH: &str = "system_info.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    pub array_size: usize,
    pub runs: usize,
    pub threads: usize,
    pub offset_bytes: usize,
    pub cache_line_size: usize,
    pub csv_path: PathBuf,
    pub system_info_path: PathBuf,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            array_size: ADD_ARRAY_SIZE,
            runs: NUM_RUNS,
            threads: num_cpus::get(),
            offset_bytes: OFFSET_BYTES,
            cache_line_size: CACHE_LINE_SIZE,
            csv_path: PathBuf::from(CSV_PATH),
            system_info_path: PathBuf::from(SYSTEM_INFO_PATH),
        }
    }
}

impl BenchConfig {
    /// Defaults for the sqrt + sin * cos benchmark.
    pub fn arithmetic() -> Self {
        Self {
            array_size: ARITHMETIC_ARRAY_SIZE,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(BenchError::InvalidConfig("threads must be at least 1".into()));
        }
        if self.runs == 0 {
            return Err(BenchError::InvalidConfig("runs must be at least 1".into()));
        }
        if self.array_size == 0 {
            return Err(BenchError::InvalidConfig(
                "array size must be at least 1".into(),
            ));
        }
        if !self.cache_line_size.is_power_of_two() {
            return Err(BenchError::InvalidConfig(format!(
                "cache line size {} is not a power of two",
                self.cache_line_size
            )));
        }
        Ok(())
    }

    /// Rayon pool with exactly `threads` workers.
    pub fn thread_pool(&self) -> Result<ThreadPool> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|i| format!("bench-worker-{i}"))
            .build()?;
        Ok(pool)
    }
}
