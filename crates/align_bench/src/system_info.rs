// Snapshot of the machine a benchmark ran on, written next to the results.

use crate::Result;
use cache_partition::CACHE_LINE_SIZE;
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInfo {
    pub logical_cpus: usize,
    pub physical_cpus: usize,
    pub arch: &'static str,
    pub os: &'static str,
    pub family: &'static str,
    pub cache_line_size: usize,
    pub rayon_threads: usize,
}

impl SystemInfo {
    pub fn capture() -> Self {
        Self {
            logical_cpus: num_cpus::get(),
            physical_cpus: num_cpus::get_physical(),
            arch: std::env::consts::ARCH,
            os: std::env::consts::OS,
            family: std::env::consts::FAMILY,
            cache_line_size: CACHE_LINE_SIZE,
            rayon_threads: rayon::current_num_threads(),
        }
    }
}

impl fmt::Display for SystemInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "logical_cpus: {}", self.logical_cpus)?;
        writeln!(f, "physical_cpus: {}", self.physical_cpus)?;
        writeln!(f, "arch: {}", self.arch)?;
        writeln!(f, "os: {}", self.os)?;
        writeln!(f, "family: {}", self.family)?;
        writeln!(f, "assumed_cache_line_size: {}", self.cache_line_size)?;
        writeln!(f, "rayon_default_threads: {}", self.rayon_threads)
    }
}

/// Writes the system snapshot to `path` unless the file already exists.
/// Returns whether a new file was written.
pub fn write_if_missing(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    fs::write(path, SystemInfo::capture().to_string())?;
    Ok(true)
}

/// Like `write_if_missing`, but a failure only produces a warning.
pub fn ensure_captured(path: &Path) {
    match write_if_missing(path) {
        Ok(true) => log::info!("captured system information in {}", path.display()),
        Ok(false) => log::debug!("{} already present", path.display()),
        Err(e) => log::warn!("Could not capture system information: {e}"),
    }
}
