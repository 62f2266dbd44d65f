//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Compress
//!
//! ```text
//! photo.jpg → photo.min.jpg (jpeg)
//!     Size: 2.4 MB → 1.1 MB (-54.2%)
//!     WARNING 211: Unsupported color model, falling back to optimization only.
//! ```
//!
//! A failed run shows the error line in place of the size line:
//!
//! ```text
//! banner.png → out.png (png)
//!     ERROR 305: Invalid scale factor.
//! ```
//!
//! ## Sniff
//!
//! ```text
//! photo.jpg: jpeg
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::compress::Outcome;
use crate::error::{ErrorCode, Severity};
use crate::format::ImageType;
use crate::report::format_report;
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count with one decimal above 1 KB.
///
/// ```text
/// 512 B
/// 1.5 KB
/// 2.4 MB
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Relative size change, e.g. `-54.2%`.
fn format_change(before: u64, after: u64) -> String {
    if before == 0 {
        return "n/a".to_string();
    }
    let change = (after as f64 - before as f64) / before as f64 * 100.0;
    format!("{change:+.1}%")
}

/// Sizes of the input and output files, when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeReport {
    pub before: u64,
    pub after: u64,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn format_compress_output(
    input: &Path,
    output: &Path,
    outcome: &Outcome,
    sizes: Option<SizeReport>,
) -> Vec<String> {
    let mut lines = Vec::new();
    let header = match outcome.image_type {
        Some(kind) => format!("{} → {} ({kind})", file_name(input), file_name(output)),
        None => format!("{} → {}", file_name(input), file_name(output)),
    };
    lines.push(header);

    if outcome.success
        && let Some(sizes) = sizes
    {
        lines.push(format!(
            "{}Size: {} → {} ({})",
            indent(1),
            format_bytes(sizes.before),
            format_bytes(sizes.after),
            format_change(sizes.before, sizes.after)
        ));
    }

    match &outcome.error {
        Some(err) => lines.push(format!("{}{err}", indent(1))),
        None if outcome.last_error_code != 0 => {
            let severity = ErrorCode::from_code(outcome.last_error_code)
                .map(ErrorCode::severity)
                .unwrap_or(Severity::Warning);
            lines.push(format!(
                "{}{}",
                indent(1),
                format_report(severity, outcome.last_error_code)
            ));
        }
        None => {}
    }
    lines
}

pub fn print_compress_output(
    input: &Path,
    output: &Path,
    outcome: &Outcome,
    sizes: Option<SizeReport>,
) {
    for line in format_compress_output(input, output, outcome, sizes) {
        println!("{line}");
    }
}

pub fn format_sniff_output(input: &Path, kind: ImageType) -> String {
    format!("{}: {kind}", input.display())
}

pub fn print_sniff_output(input: &Path, kind: ImageType) {
    println!("{}", format_sniff_output(input, kind));
}
