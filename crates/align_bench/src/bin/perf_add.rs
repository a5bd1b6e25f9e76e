//! A single vector addition run for analyzing with perf.

use align_bench::config::{ADD_ARRAY_SIZE, OFFSET_BYTES};
use align_bench::kernels::OutputBuffer;
use cache_partition::{CACHE_LINE_SIZE, elements_per_unit, partition_all};
use clap::Parser;
use rayon::ThreadPoolBuilder;
use std::time::Instant;

#[derive(Parser)]
#[command(about, long_about = None)]
struct Args {
    /// Worker threads, defaults to the number of logical CPUs.
    threads: Option<usize>,
    /// Bytes past a cache line boundary for the output array; any value works.
    offset: Option<usize>,
    /// Give neighbouring elements to different threads.
    #[arg(long, action)]
    interleaved: bool,
}

fn main() -> Result<(), String> {
    env_logger::init();
    let args = Args::parse();

    let threads = args.threads.unwrap_or_else(num_cpus::get);
    let offset = args.offset.unwrap_or(OFFSET_BYTES);

    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| e.to_string())?;

    let a = vec![1f32; ADD_ARRAY_SIZE];
    let b = vec![2f32; ADD_ARRAY_SIZE];
    let mut c = OutputBuffer::new(ADD_ARRAY_SIZE, CACHE_LINE_SIZE, offset)
        .map_err(|e| e.to_string())?;
    let ranges = partition_all(
        threads,
        ADD_ARRAY_SIZE,
        elements_per_unit::<f32>(CACHE_LINE_SIZE),
        false,
    )
    .map_err(|e| e.to_string())?;

    let start = Instant::now();
    if args.interleaved {
        c.add_interleaved(&a, &b, &pool);
    } else {
        c.add_blocked(&a, &b, &ranges, &pool)
            .map_err(|e| e.to_string())?;
    }
    let elapsed = start.elapsed();

    log::info!("C[0]: {}", c.to_vec().first().copied().unwrap_or_default());
    log::info!(
        "Time to add numbers {} at {:#x} (offset {offset}): {:?}",
        if args.interleaved { "interleaved" } else { "blocked" },
        c.address(),
        elapsed
    );

    Ok(())
}

// See cache traffic caused by false sharing:
//  sudo perf stat -e cache-references,cache-misses,cycles,instructions ./target/release/perf_add 8 4
//  sudo perf stat -e cache-references,cache-misses,cycles,instructions ./target/release/perf_add 8 4 --interleaved
// Values straddling two cache lines:
//  sudo perf stat -e cache-references,cache-misses,cycles,instructions ./target/release/perf_add 8 37
// or
//  sudo perf c2c record ./target/release/perf_add 8 4 --interleaved
