pub mod clear;
pub mod config;
pub mod describe;
pub mod load;
pub mod query;
pub mod tables;

use std::io::Write;

/// Write one output line, treating a closed pipe as a normal end of output.
pub(crate) fn write_line(out: &mut impl Write, line: &str) -> anyhow::Result<bool> {
    match writeln!(out, "{}", line) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Failed to write output: {}", e)),
    }
}
