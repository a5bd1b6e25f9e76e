// Checks a partition of a float array for false sharing at a chosen misalignment.

use cache_partition::{CACHE_LINE_SIZE, OverlapDetector, ScanMode, elements_per_unit, partition_all};

/// Defaults taken from the classic 4 threads over 256 floats example.
const THREADS: usize = 4;
const ELEMENTS: usize = 256;
const OFFSET_BYTES: usize = 32;

/// Pretend allocation address, a multiple of the cache line size.
const SIMULATED_BASE: usize = 0x1000;

use clap::Parser;

#[derive(Parser)]
#[command(about, long_about = None)]
struct Args {
    #[arg(long)]
    threads: Option<usize>,
    #[arg(long)]
    elements: Option<usize>,
    /// Byte offset added to a cache line aligned base address.
    #[arg(long)]
    offset: Option<usize>,
    /// Partition in whole cache lines with the edge on the first worker.
    #[arg(long, action)]
    edge_low: bool,
    /// List every conflicting pair instead of stopping at the first.
    #[arg(long, action)]
    all: bool,
}

fn main() -> Result<(), String> {
    env_logger::init();
    let args = Args::parse();

    let threads = args.threads.unwrap_or(THREADS);
    let elements = args.elements.unwrap_or(ELEMENTS);
    let offset = args.offset.unwrap_or(OFFSET_BYTES);
    let element_size = std::mem::size_of::<f32>();

    println!(
        "Checking false sharing with {} threads on {} float elements (offset {} bytes)",
        threads, elements, offset
    );

    let block_size = elements_per_unit::<f32>(CACHE_LINE_SIZE);
    let ranges =
        partition_all(threads, elements, block_size, args.edge_low).map_err(|e| e.to_string())?;
    for (worker, range) in ranges.iter().enumerate() {
        log::info!("worker {worker}: {range}");
    }

    let mode = if args.all {
        ScanMode::AllConflicts
    } else {
        ScanMode::FirstConflict
    };
    let base_address = SIMULATED_BASE
        .checked_add(offset)
        .ok_or_else(|| format!("offset of {offset} bytes is too large"))?;
    let detector = OverlapDetector::new(base_address, element_size, CACHE_LINE_SIZE)
        .map_err(|e| e.to_string())?
        .with_mode(mode);

    println!("{}", detector.detect(&ranges));

    Ok(())
}
