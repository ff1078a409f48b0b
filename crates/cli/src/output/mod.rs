//! Output formatting utilities
//!
//! Formatters for human-readable and JSON output, plus the progress-bar
//! observer driven by the copy engine.

mod formatter;
mod progress;

pub use formatter::Formatter;
pub use progress::ProgressObserver;

/// Output configuration derived from CLI flags
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Use JSON output format
    pub json: bool,
    /// Disable colored output
    pub no_color: bool,
    /// Disable progress bar
    pub no_progress: bool,
    /// Suppress non-error output
    pub quiet: bool,
}
