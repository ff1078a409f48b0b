//! Command execution
//!
//! Bootstraps both gateways from configuration, wires the copy engine to
//! the terminal observer, and maps the run's results to an exit code.

use humansize::{format_size, BINARY};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use is3_core::{
    Copier, IrodsConfig, S3Config, S3Location, TransferOutcome, TransferStatus, Verification,
};
use is3_irods::IrodsSource;
use is3_s3::S3Sink;

use crate::args::Cli;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressObserver};

/// Execute the copy run described by the CLI arguments
pub async fn execute(cli: Cli) -> ExitCode {
    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    };
    let formatter = Formatter::new(output_config.clone());

    // Input validation happens before any remote call
    let target = match S3Location::parse(&cli.target) {
        Ok(target) => target,
        Err(err) => {
            formatter.error(&err.to_string());
            return ExitCode::from_error(&err);
        }
    };

    let irods_config = match IrodsConfig::from_environment() {
        Ok(config) => config,
        Err(err) => {
            formatter.error(&err.to_string());
            return ExitCode::from_error(&err);
        }
    };

    let s3_config = match &cli.s3cfg {
        Some(path) => S3Config::from_s3cmd(path),
        None => S3Config::from_environment(),
    };
    let s3_config = match s3_config {
        Ok(config) => config,
        Err(err) => {
            formatter.error(&err.to_string());
            return ExitCode::from_error(&err);
        }
    };

    let source = match IrodsSource::connect(irods_config).await {
        Ok(source) => source,
        Err(err) => {
            formatter.error(&format!("Couldn't connect to iRODS: {err}"));
            return ExitCode::from_error(&err);
        }
    };
    let sink = S3Sink::new(s3_config).await;

    // Stop before the next object on interrupt; the in-flight one is left
    // to finish or abort cleanly
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; finishing the current object");
                cancel.cancel();
            }
        });
    }

    let observer = ProgressObserver::new(output_config);
    let copier = Copier::new(&source, &sink, cli.copy_options(), cancel.clone());

    let outcomes = match copier.run(&cli.sources, &target, &observer).await {
        Ok(outcomes) => outcomes,
        Err(err) => {
            formatter.error(&err.to_string());
            return ExitCode::from_error(&err);
        }
    };

    report(&formatter, &outcomes);

    if cancel.is_cancelled() {
        return ExitCode::Interrupted;
    }

    // Skipped objects are not failures; the exit code reflects only
    // objects that could not be copied
    match outcomes.iter().find_map(|outcome| match &outcome.status {
        TransferStatus::Failed(err) => Some(ExitCode::from_error(err)),
        _ => None,
    }) {
        Some(code) => code,
        None => ExitCode::Success,
    }
}

/// Per-object record for JSON output
#[derive(Debug, Serialize)]
struct OutcomeReport<'a> {
    source: &'a str,
    target: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    verification: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata_error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> From<&'a TransferOutcome> for OutcomeReport<'a> {
    fn from(outcome: &'a TransferOutcome) -> Self {
        let mut report = Self {
            source: &outcome.source,
            target: outcome.dest.url(),
            status: outcome.status.label(),
            size_bytes: None,
            verification: None,
            metadata_error: None,
            error: None,
        };

        match &outcome.status {
            TransferStatus::Transferred {
                bytes,
                verification,
                metadata_error,
            }
            | TransferStatus::Overwritten {
                bytes,
                verification,
                metadata_error,
            } => {
                report.size_bytes = Some(*bytes);
                report.verification = verification_label(*verification);
                report.metadata_error = metadata_error.as_deref();
            }
            TransferStatus::SkippedDryRun { bytes, .. } => {
                report.size_bytes = Some(*bytes);
            }
            TransferStatus::SkippedExists => {}
            TransferStatus::Failed(err) => {
                report.error = Some(err.to_string());
            }
        }

        report
    }
}

const fn verification_label(verification: Verification) -> Option<&'static str> {
    match verification {
        Verification::NotRequested => None,
        Verification::Matched => Some("matched"),
        Verification::Mismatched => Some("mismatched"),
        Verification::Inconclusive => Some("inconclusive"),
    }
}

/// Final run report: a JSON array in JSON mode, a summary line otherwise
fn report(formatter: &Formatter, outcomes: &[TransferOutcome]) {
    if formatter.is_json() {
        let reports: Vec<OutcomeReport<'_>> = outcomes.iter().map(OutcomeReport::from).collect();
        formatter.json(&reports);
        return;
    }

    let mut transferred = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;
    let mut bytes = 0u64;

    for outcome in outcomes {
        match &outcome.status {
            TransferStatus::Transferred { bytes: b, .. }
            | TransferStatus::Overwritten { bytes: b, .. } => {
                transferred += 1;
                bytes += b;
            }
            TransferStatus::SkippedExists | TransferStatus::SkippedDryRun { .. } => skipped += 1,
            TransferStatus::Failed(_) => failed += 1,
        }
    }

    formatter.println(&format!(
        "{transferred} transferred ({}), {skipped} skipped, {failed} failed",
        format_size(bytes, BINARY)
    ));
}

#[cfg(test)]
mod tests {
    use is3_core::Error;

    use super::*;

    fn outcome(status: TransferStatus) -> TransferOutcome {
        TransferOutcome {
            source: "/zone/data.cram".to_string(),
            dest: S3Location::parse("s3://bucket/zone/data.cram").unwrap(),
            status,
        }
    }

    #[test]
    fn test_outcome_report_transferred() {
        let outcome = outcome(TransferStatus::Transferred {
            bytes: 1024,
            verification: Verification::Matched,
            metadata_error: None,
        });

        let report = OutcomeReport::from(&outcome);
        assert_eq!(report.status, "transferred");
        assert_eq!(report.size_bytes, Some(1024));
        assert_eq!(report.verification, Some("matched"));
        assert!(report.error.is_none());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["target"], "s3://bucket/zone/data.cram");
        // Absent fields are omitted, not null
        assert!(json.get("metadata_error").is_none());
    }

    #[test]
    fn test_outcome_report_failed() {
        let outcome = outcome(TransferStatus::Failed(Error::Network("reset".into())));

        let report = OutcomeReport::from(&outcome);
        assert_eq!(report.status, "failed");
        assert!(report.error.unwrap().contains("reset"));
        assert_eq!(report.size_bytes, None);
    }

    #[test]
    fn test_verification_labels() {
        assert_eq!(verification_label(Verification::NotRequested), None);
        assert_eq!(verification_label(Verification::Matched), Some("matched"));
        assert_eq!(
            verification_label(Verification::Inconclusive),
            Some("inconclusive")
        );
    }
}
