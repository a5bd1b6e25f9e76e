// CSV log of arithmetic benchmark results, one line per invocation.

use crate::{BenchError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

pub const CSV_HEADER: &str = "threads,offset,aligned_time,misaligned_time,speedup,aligned_false_sharing,misaligned_false_sharing";

const COLUMNS: usize = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub threads: usize,
    pub offset: usize,
    /// Seconds.
    pub aligned_time: f64,
    /// Seconds.
    pub misaligned_time: f64,
    pub speedup: f64,
    pub aligned_false_sharing: bool,
    pub misaligned_false_sharing: bool,
}

impl ResultRow {
    pub fn to_csv_line(&self) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            self.threads,
            self.offset,
            self.aligned_time,
            self.misaligned_time,
            self.speedup,
            self.aligned_false_sharing as u8,
            self.misaligned_false_sharing as u8
        )
    }

    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != COLUMNS {
            return Err(format!("expected {COLUMNS} columns, found {}", fields.len()));
        }

        let int = |i: usize| {
            fields[i]
                .parse::<usize>()
                .map_err(|e| format!("column {}: {e}", i + 1))
        };
        let float = |i: usize| {
            fields[i]
                .parse::<f64>()
                .map_err(|e| format!("column {}: {e}", i + 1))
        };
        let flag = |i: usize| match fields[i] {
            "0" | "false" => Ok(false),
            "1" | "true" => Ok(true),
            other => Err(format!("column {}: not a flag: {other:?}", i + 1)),
        };

        Ok(Self {
            threads: int(0)?,
            offset: int(1)?,
            aligned_time: float(2)?,
            misaligned_time: float(3)?,
            speedup: float(4)?,
            aligned_false_sharing: flag(5)?,
            misaligned_false_sharing: flag(6)?,
        })
    }
}

/// Appends `row` to the CSV at `path`, writing the header first if the file
/// is new or empty.
pub fn append_row(path: &Path, row: &ResultRow) -> Result<()> {
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if needs_header {
        writeln!(file, "{CSV_HEADER}")?;
    }
    writeln!(file, "{}", row.to_csv_line())?;

    log::info!("appended results to {}", path.display());
    Ok(())
}

/// Reads every result row, skipping blank lines and header lines wherever
/// they appear.
pub fn read_rows(path: &Path) -> Result<Vec<ResultRow>> {
    let contents = fs::read_to_string(path)?;
    let mut rows = Vec::new();

    for (i, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("threads") {
            continue;
        }
        let row = ResultRow::parse(line).map_err(|reason| BenchError::Parse {
            path: path.to_path_buf(),
            line: i + 1,
            reason,
        })?;
        rows.push(row);
    }

    Ok(rows)
}

/// Result rows grouped by thread count, each group ordered by offset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Summary {
    groups: BTreeMap<usize, Vec<ResultRow>>,
}

impl Summary {
    pub fn thread_counts(&self) -> impl Iterator<Item = usize> + '_ {
        self.groups.keys().copied()
    }

    pub fn rows_for(&self, threads: usize) -> &[ResultRow] {
        self.groups.get(&threads).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

pub fn summarize(rows: impl IntoIterator<Item = ResultRow>) -> Summary {
    let mut groups: BTreeMap<usize, Vec<ResultRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.threads).or_default().push(row);
    }
    for group in groups.values_mut() {
        group.sort_by_key(|row| row.offset);
    }
    Summary { groups }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.groups.is_empty() {
            return write!(f, "no results");
        }

        for (n, (threads, rows)) in self.groups.iter().enumerate() {
            if n > 0 {
                writeln!(f)?;
            }
            writeln!(f, "Threads = {threads}")?;
            writeln!(
                f,
                "{:>6}  {:>12}  {:>14}  {:>8}  {:>10}  {:>13}",
                "offset", "aligned (s)", "misaligned (s)", "speedup", "aligned FS", "misaligned FS"
            )?;
            for row in rows {
                writeln!(
                    f,
                    "{:>6}  {:>12.5}  {:>14.5}  {:>7.3}x  {:>10}  {:>13}",
                    row.offset,
                    row.aligned_time,
                    row.misaligned_time,
                    row.speedup,
                    yes_no(row.aligned_false_sharing),
                    yes_no(row.misaligned_false_sharing)
                )?;
            }
        }
        Ok(())
    }
}
