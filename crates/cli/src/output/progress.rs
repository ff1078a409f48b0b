//! Transfer progress and per-object reporting
//!
//! Implements the engine's observer: a progress bar for the in-flight
//! object and one line per terminal outcome. In quiet or JSON mode the
//! progress bar is suppressed.

use std::sync::Mutex;

use humansize::{format_size, BINARY};
use is3_core::{
    S3Location, SourceLeaf, TransferObserver, TransferOutcome, TransferStatus, Verification,
};

use super::{Formatter, OutputConfig};

/// Progress-bar observer for the copy engine
pub struct ProgressObserver {
    config: OutputConfig,
    formatter: Formatter,
    bar: Mutex<Option<indicatif::ProgressBar>>,
}

impl ProgressObserver {
    pub fn new(config: OutputConfig) -> Self {
        Self {
            formatter: Formatter::new(config.clone()),
            config,
            bar: Mutex::new(None),
        }
    }

    fn bar_enabled(&self) -> bool {
        !self.config.quiet && !self.config.json && !self.config.no_progress
    }
}

impl TransferObserver for ProgressObserver {
    fn transfer_started(&self, leaf: &SourceLeaf, _dest: &S3Location) {
        if !self.bar_enabled() {
            return;
        }

        let bar = indicatif::ProgressBar::new(leaf.size);
        bar.set_style(
            indicatif::ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                .expect("valid template")
                .progress_chars("#>-"),
        );
        bar.set_message(leaf.path.clone());

        *self.bar.lock().unwrap() = Some(bar);
    }

    fn transfer_progress(&self, bytes_so_far: u64, _total: u64) {
        if let Some(bar) = &*self.bar.lock().unwrap() {
            bar.set_position(bytes_so_far);
        }
    }

    fn transfer_outcome(&self, outcome: &TransferOutcome) {
        if let Some(bar) = self.bar.lock().unwrap().take() {
            bar.finish_and_clear();
        }

        // JSON mode reports the whole run at the end instead
        if self.config.json {
            return;
        }

        let source = &outcome.source;
        let dest = &outcome.dest;

        match &outcome.status {
            TransferStatus::Transferred {
                bytes,
                verification,
                metadata_error,
            } => {
                self.formatter
                    .success(&format!("{source} -> {dest} ({})", format_size(*bytes, BINARY)));
                self.report_annotations(dest, *verification, metadata_error.as_deref());
            }
            TransferStatus::Overwritten {
                bytes,
                verification,
                metadata_error,
            } => {
                self.formatter.success(&format!(
                    "{source} -> {dest} ({}, overwritten)",
                    format_size(*bytes, BINARY)
                ));
                self.report_annotations(dest, *verification, metadata_error.as_deref());
            }
            TransferStatus::SkippedExists => {
                self.formatter
                    .warning(&format!("File already exists on S3: {dest}"));
            }
            TransferStatus::SkippedDryRun {
                bytes,
                would_overwrite,
            } => {
                let note = if *would_overwrite { ", overwriting" } else { "" };
                self.formatter.println(&format!(
                    "Would copy: {source} -> {dest} ({}{note})",
                    format_size(*bytes, BINARY)
                ));
            }
            TransferStatus::Failed(err) => {
                self.formatter.error(&format!("Failed to copy {source}: {err}"));
            }
        }
    }
}

impl ProgressObserver {
    fn report_annotations(
        &self,
        dest: &S3Location,
        verification: Verification,
        metadata_error: Option<&str>,
    ) {
        if let Some(err) = metadata_error {
            self.formatter
                .warning(&format!("AVUs were not replicated to {dest}: {err}"));
        }

        match verification {
            Verification::Mismatched => {
                self.formatter
                    .error(&format!("Checksum mismatch on {dest}"));
            }
            Verification::Inconclusive => {
                self.formatter.warning(&format!(
                    "Checksum on {dest} could not be compared (different algorithm or multipart upload)"
                ));
            }
            Verification::Matched | Verification::NotRequested => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_suppressed_in_quiet_mode() {
        let observer = ProgressObserver::new(OutputConfig {
            quiet: true,
            ..Default::default()
        });
        assert!(!observer.bar_enabled());
    }

    #[test]
    fn test_bar_suppressed_in_json_mode() {
        let observer = ProgressObserver::new(OutputConfig {
            json: true,
            ..Default::default()
        });
        assert!(!observer.bar_enabled());
    }

    #[test]
    fn test_bar_enabled_by_default() {
        let observer = ProgressObserver::new(OutputConfig::default());
        assert!(observer.bar_enabled());
    }
}
