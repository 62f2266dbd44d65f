//! Last-error slot and diagnostic output.
//!
//! A [`Reporter`] holds a single `(code, severity)` record. Every
//! [`report`](Reporter::report) overwrites it: there is no queue, and a
//! warning followed by a successful step leaves the warning's code behind.
//! The owning [`Compressor`](crate::Compressor) resets the slot at the start
//! of each orchestration call and at no other point.
//!
//! When verbose, each report also writes one line to the diagnostic sink:
//!
//! ```text
//! WARNING 103: File type not supported.
//! ERROR 305: Invalid scale factor.
//! ```
//!
//! [`format_report`] builds that line and is pure; `Reporter` owns the I/O.

use crate::error::{ErrorCode, Severity, message_for};
use std::io::Write;

/// Code stored in a freshly reset slot.
pub const NO_ERROR: u32 = 0;

/// Format one diagnostic line (without trailing newline).
pub fn format_report(severity: Severity, code: u32) -> String {
    format!("{} {}: {}", severity, code, message_for(code))
}

/// The most recent report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorRecord {
    pub code: u32,
    pub severity: Severity,
}

/// Single-slot error state plus the verbose diagnostic stream.
pub struct Reporter {
    verbose: bool,
    last: Option<ErrorRecord>,
    sink: Box<dyn Write + Send>,
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("verbose", &self.verbose)
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Reporter {
    /// Reporter writing to stderr when `verbose`.
    pub fn new(verbose: bool) -> Self {
        Self::with_sink(verbose, Box::new(std::io::stderr()))
    }

    pub fn with_sink(verbose: bool, sink: Box<dyn Write + Send>) -> Self {
        Self {
            verbose,
            last: None,
            sink,
        }
    }

    /// Record `code` and, when verbose, print it.
    pub fn report(&mut self, severity: Severity, code: u32) {
        self.last = Some(ErrorRecord { code, severity });
        match severity {
            Severity::Error => tracing::debug!(code, "error reported"),
            Severity::Warning => tracing::debug!(code, "warning reported"),
        }
        if self.verbose {
            // The diagnostic stream is best effort; a closed stderr must not
            // turn into a pipeline failure.
            let _ = writeln!(self.sink, "{}", format_report(severity, code));
        }
    }

    /// Report a known code with its default severity.
    pub fn report_code(&mut self, code: ErrorCode) {
        self.report(code.severity(), code.code());
    }

    pub fn last(&self) -> Option<ErrorRecord> {
        self.last
    }

    /// Last reported code, or [`NO_ERROR`].
    pub fn last_code(&self) -> u32 {
        self.last.map(|r| r.code).unwrap_or(NO_ERROR)
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
