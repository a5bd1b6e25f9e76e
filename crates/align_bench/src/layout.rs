//! Text map of which workers touch which cache lines.
//!
//! Every worker gets a line with its element range, byte span and cache
//! line span. Cache lines touched by more than one worker are listed
//! individually; private lines are listed too when the whole span is short
//! enough to read.

use cache_partition::{IndexRange, OverlapDetector, UnitSpan};
use std::collections::BTreeMap;

/// Spans longer than this many cache lines only list the shared ones.
pub const MAX_LISTED_LINES: usize = 32;

/// Thread 0 on doubles 0-7 and thread 1 on doubles 7-15: the two threads
/// both write double 7, so they share cache line 0.
pub fn overlapping_doubles_example() -> [IndexRange; 2] {
    [IndexRange::new(0, 8), IndexRange::new(7, 16)]
}

/// Workers whose first or last cache line is each line, keyed by cache line
/// index.
///
/// Lines strictly inside a worker's span are not recorded. For a partition
/// (contiguous, disjoint ranges) those can never be shared, so the map holds
/// every shared line; for overlapping ranges such as
/// `overlapping_doubles_example` it can miss some.
pub fn line_owners(detector: &OverlapDetector, ranges: &[IndexRange]) -> BTreeMap<usize, Vec<usize>> {
    let mut owners: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (worker, range) in ranges.iter().enumerate() {
        if let Some(span) = detector.units(*range) {
            for line in [span.first, span.last] {
                let entry = owners.entry(line).or_default();
                if !entry.contains(&worker) {
                    entry.push(worker);
                }
            }
        }
    }
    owners
}

fn join_workers(workers: &[usize]) -> String {
    workers
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render_unit_map(detector: &OverlapDetector, ranges: &[IndexRange]) -> String {
    let mut out = String::new();
    let mut spans: Vec<(usize, UnitSpan)> = Vec::new();

    for (worker, range) in ranges.iter().enumerate() {
        match (detector.addressed(*range), detector.units(*range)) {
            (Some(addressed), Some(span)) => {
                spans.push((worker, span));
                out.push_str(&format!(
                    "worker {worker}: elements {range}, bytes {:#x}-{:#x}, cache lines {span}\n",
                    addressed.first_byte, addressed.last_byte
                ));
            }
            _ => {
                out.push_str(&format!("worker {worker}: elements {range}, no memory touched\n"));
            }
        }
    }

    let (Some(first), Some(last)) = (
        spans.iter().map(|(_, s)| s.first).min(),
        spans.iter().map(|(_, s)| s.last).max(),
    ) else {
        return out;
    };

    let list_all = last - first < MAX_LISTED_LINES;

    if list_all {
        for line in first..=last {
            let workers: Vec<usize> = spans
                .iter()
                .filter(|(_, s)| s.contains(line))
                .map(|(w, _)| *w)
                .collect();
            let marker = if workers.len() > 1 { "  <- shared" } else { "" };
            out.push_str(&format!(
                "cache line {line}: workers {}{marker}\n",
                join_workers(&workers)
            ));
        }
    } else {
        // the short listing above handles overlapping ranges exactly; this
        // path relies on the ranges forming a partition
        let owners = line_owners(detector, ranges);
        let shared: Vec<(&usize, &Vec<usize>)> =
            owners.iter().filter(|(_, w)| w.len() > 1).collect();
        for (line, workers) in &shared {
            out.push_str(&format!(
                "cache line {line}: workers {}  <- shared\n",
                join_workers(workers)
            ));
        }
        out.push_str(&format!(
            "{} of {} cache lines shared\n",
            shared.len(),
            last - first + 1
        ));
    }

    out
}
