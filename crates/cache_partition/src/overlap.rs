// Offline false sharing analysis: do two workers' byte spans land in the
// same cache line?

use crate::{IndexRange, InvalidArgument, Result};
use std::fmt;

/// Cache line size assumed by the benchmarks.
pub const CACHE_LINE_SIZE: usize = 64;

/// Number of `T` values that fit in one alignment unit, at least 1.
pub fn elements_per_unit<T>(unit_size: usize) -> usize {
    (unit_size / std::mem::size_of::<T>().max(1)).max(1)
}

pub fn is_aligned(address: usize, unit_size: usize) -> bool {
    unit_size != 0 && address % unit_size == 0
}

/// An index range together with the byte addresses of its first and last
/// elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressedRange {
    pub range: IndexRange,
    pub first_byte: usize,
    pub last_byte: usize,
}

/// Inclusive span of alignment unit indices (`address / unit_size`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitSpan {
    pub first: usize,
    pub last: usize,
}

impl UnitSpan {
    pub fn intersects(&self, other: &UnitSpan) -> bool {
        !(self.last < other.first || other.last < self.first)
    }

    pub fn contains(&self, unit: usize) -> bool {
        self.first <= unit && unit <= self.last
    }
}

impl fmt::Display for UnitSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.last)
    }
}

/// Two workers whose spans share at least one alignment unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conflict {
    pub first_worker: usize,
    pub second_worker: usize,
    pub first_units: UnitSpan,
    pub second_units: UnitSpan,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "False sharing detected between threads {} and {}!",
            self.first_worker, self.second_worker
        )?;
        write!(
            f,
            "   Thread {}: cache lines {}, Thread {}: cache lines {}",
            self.first_worker, self.first_units, self.second_worker, self.second_units
        )
    }
}

/// How far `OverlapDetector::detect` scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    /// Stop at the first conflicting pair in `(i, j > i)` order.
    #[default]
    FirstConflict,
    /// Report every conflicting pair.
    AllConflicts,
}

/// Result of an overlap scan. Empty means no false sharing was found.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OverlapReport {
    conflicts: Vec<Conflict>,
}

impl OverlapReport {
    pub fn has_false_sharing(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn first(&self) -> Option<&Conflict> {
        self.conflicts.first()
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }
}

impl fmt::Display for OverlapReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conflicts.is_empty() {
            return write!(
                f,
                "No false sharing detected - threads access separate cache lines"
            );
        }
        for (i, conflict) in self.conflicts.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{conflict}")?;
        }
        Ok(())
    }
}

/// Maps worker ranges onto alignment units of a buffer at a known address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlapDetector {
    base_address: usize,
    element_size: usize,
    unit_size: usize,
    mode: ScanMode,
}

impl OverlapDetector {
    pub fn new(base_address: usize, element_size: usize, unit_size: usize) -> Result<Self> {
        if element_size == 0 {
            return Err(InvalidArgument::ZeroElementSize);
        }
        if unit_size == 0 {
            return Err(InvalidArgument::ZeroUnitSize);
        }
        Ok(Self {
            base_address,
            element_size,
            unit_size,
            mode: ScanMode::default(),
        })
    }

    /// Detector for the memory actually backing `data`.
    pub fn for_slice<T>(data: &[T], unit_size: usize) -> Result<Self> {
        Self::new(
            data.as_ptr() as usize,
            std::mem::size_of::<T>(),
            unit_size,
        )
    }

    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn base_address(&self) -> usize {
        self.base_address
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    pub fn unit_size(&self) -> usize {
        self.unit_size
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    /// Byte span of `range`, or `None` if the range is empty or its bytes
    /// would lie past the end of the address space.
    pub fn addressed(&self, range: IndexRange) -> Option<AddressedRange> {
        if range.is_empty() {
            return None;
        }
        let byte_of = |index: usize| {
            index
                .checked_mul(self.element_size)
                .and_then(|offset| self.base_address.checked_add(offset))
        };
        Some(AddressedRange {
            range,
            first_byte: byte_of(range.start)?,
            last_byte: byte_of(range.end - 1)?,
        })
    }

    /// Alignment units touched by the first and last element of `range`.
    pub fn units(&self, range: IndexRange) -> Option<UnitSpan> {
        self.addressed(range).map(|addressed| UnitSpan {
            first: addressed.first_byte / self.unit_size,
            last: addressed.last_byte / self.unit_size,
        })
    }

    /// Checks every pair of worker ranges for a shared alignment unit.
    ///
    /// `ranges` must be ordered by worker id. Pairs are visited with
    /// ascending `i`, then ascending `j > i`. With fewer than two ranges
    /// there is nothing to share and the report is empty.
    pub fn detect(&self, ranges: &[IndexRange]) -> OverlapReport {
        let mut report = OverlapReport::default();
        if ranges.len() < 2 {
            return report;
        }

        let spans: Vec<Option<UnitSpan>> = ranges.iter().map(|r| self.units(*r)).collect();

        for (i, span) in spans.iter().enumerate() {
            let Some(first_units) = *span else {
                continue;
            };
            for (j, other) in spans.iter().enumerate().skip(i + 1) {
                let Some(second_units) = *other else {
                    continue;
                };
                if first_units.intersects(&second_units) {
                    log::debug!(
                        "workers {i} and {j} share cache lines ({first_units} vs {second_units})"
                    );
                    report.conflicts.push(Conflict {
                        first_worker: i,
                        second_worker: j,
                        first_units,
                        second_units,
                    });
                    if self.mode == ScanMode::FirstConflict {
                        return report;
                    }
                }
            }
        }

        report
    }
}

/// Convenience wrapper around `OverlapDetector::detect` with early exit.
///
/// __Arguments:__
///
/// + `ranges` - per-worker ranges ordered by worker id
///
/// + `base_address` - byte address of element 0
///
/// + `element_size` - bytes per element
///
/// + `unit_size` - alignment unit (cache line) size in bytes
///
pub fn detect_false_sharing(
    ranges: &[IndexRange],
    base_address: usize,
    element_size: usize,
    unit_size: usize,
) -> Result<OverlapReport> {
    Ok(OverlapDetector::new(base_address, element_size, unit_size)?.detect(ranges))
}
