// CLI for the alignment and false sharing benchmarks

use align_bench::bench::{PlacementTimings, run_arithmetic, run_vector_add};
use align_bench::config::BenchConfig;
use align_bench::layout::{overlapping_doubles_example, render_unit_map};
use align_bench::results::{append_row, read_rows, summarize};
use align_bench::system_info::{SystemInfo, ensure_captured};
use cache_partition::{CACHE_LINE_SIZE, OverlapDetector, elements_per_unit, partition_all};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

// setup command line args

#[derive(Parser)]
#[command(about, long_about = None)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// C = A + B into aligned and misaligned output buffers.
    Add(RunArgs),
    /// In place sqrt(x) + sin(x) * cos(x); appends a line to the CSV log.
    Arith(RunArgs),
    /// Tabulate the CSV log by thread count.
    Summary(SummaryArgs),
    /// Show which workers touch which cache lines.
    Layout(LayoutArgs),
    /// Print the system snapshot stored with the results.
    Sysinfo,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Worker threads (default: number of logical CPUs).
    threads: Option<usize>,
    /// Bytes past the cache line boundary for the misaligned buffer.
    offset: Option<usize>,
    #[clap(long)]
    size: Option<usize>,
    #[clap(long)]
    runs: Option<usize>,
    #[clap(long)]
    csv: Option<PathBuf>,
}

impl RunArgs {
    fn apply(self, mut config: BenchConfig) -> BenchConfig {
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(offset) = self.offset {
            config.offset_bytes = offset;
        }
        if let Some(size) = self.size {
            config.array_size = size;
        }
        if let Some(runs) = self.runs {
            config.runs = runs;
        }
        if let Some(csv) = self.csv {
            config.csv_path = csv;
        }
        config
    }
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    #[clap(long, default_value = align_bench::config::CSV_PATH)]
    csv: PathBuf,
}

#[derive(Debug, Args)]
pub struct LayoutArgs {
    #[clap(long, default_value_t = 4)]
    threads: usize,
    #[clap(long, default_value_t = 256)]
    elements: usize,
    #[clap(long, default_value_t = 0)]
    offset: usize,
    /// Use 8 byte doubles instead of floats.
    #[clap(long, action)]
    double: bool,
    #[clap(long, action)]
    edge_low: bool,
    /// Show two threads writing overlapping doubles 0-7 and 7-15.
    #[clap(long, action)]
    overlap_demo: bool,
}

fn print_placement(label: &str, timings: &PlacementTimings) {
    println!(
        "{label} C at {:#x} (aligned: {})",
        timings.address,
        if timings.address % CACHE_LINE_SIZE == 0 { "YES" } else { "NO" }
    );
    println!(
        "  static:      {:.6} sec",
        timings.static_chunks.as_secs_f64()
    );
    println!("  blocked:     {:.6} sec", timings.blocked.as_secs_f64());
    println!(
        "  interleaved: {:.6} sec",
        timings.interleaved.as_secs_f64()
    );
    println!("  {}", timings.false_sharing);
}

fn add(args: RunArgs) -> align_bench::Result<()> {
    let config = args.apply(BenchConfig::default());
    println!("Using {} threads", config.threads);

    let report = run_vector_add(&config)?;
    print_placement("Aligned", &report.aligned);
    print_placement("Misaligned", &report.misaligned);
    Ok(())
}

fn arith(args: RunArgs) -> align_bench::Result<()> {
    let config = args.apply(BenchConfig::arithmetic());
    ensure_captured(&config.system_info_path);

    println!("Vector Arithmetic Benchmark");
    println!("Using {} threads", config.threads);
    println!("Vector size: {} elements", config.array_size);
    println!("Operations: sqrt(x) + sin(x) * cos(x)\n");

    let comparison = run_arithmetic(&config)?;
    println!(
        "Aligned ({:#x}): {:.6} sec",
        comparison.aligned_address,
        comparison.aligned_time.as_secs_f64()
    );
    println!("{}\n", comparison.aligned_report);
    println!(
        "Misaligned ({:#x}): {:.6} sec",
        comparison.misaligned_address,
        comparison.misaligned_time.as_secs_f64()
    );
    println!("{}\n", comparison.misaligned_report);

    println!("Performance Summary:");
    println!("Aligned: {:.6}s", comparison.aligned_time.as_secs_f64());
    println!("Misaligned: {:.6}s", comparison.misaligned_time.as_secs_f64());
    println!("Speedup: {:.3}x", comparison.speedup());

    append_row(&config.csv_path, &comparison.to_row())
}

fn layout(args: LayoutArgs) -> align_bench::Result<()> {
    if args.overlap_demo {
        let detector = OverlapDetector::new(0, std::mem::size_of::<f64>(), CACHE_LINE_SIZE)?;
        let ranges = overlapping_doubles_example();
        print!("{}", render_unit_map(&detector, &ranges));
        println!("{}", detector.detect(&ranges));
        return Ok(());
    }

    let (element_size, block_size) = if args.double {
        (8, elements_per_unit::<f64>(CACHE_LINE_SIZE))
    } else {
        (4, elements_per_unit::<f32>(CACHE_LINE_SIZE))
    };
    let ranges = partition_all(args.threads, args.elements, block_size, args.edge_low)?;
    let detector = OverlapDetector::new(args.offset, element_size, CACHE_LINE_SIZE)?;

    print!("{}", render_unit_map(&detector, &ranges));
    println!("{}", detector.detect(&ranges));
    Ok(())
}

fn main() -> Result<(), String> {
    env_logger::init();
    let args = CliArgs::parse();

    let result = match args.command {
        Command::Add(args) => add(args),
        Command::Arith(args) => arith(args),
        Command::Summary(args) => {
            read_rows(&args.csv).map(|rows| println!("{}", summarize(rows)))
        }
        Command::Layout(args) => layout(args),
        Command::Sysinfo => {
            print!("{}", SystemInfo::capture());
            Ok(())
        }
    };

    result.map_err(|e| e.to_string())
}
