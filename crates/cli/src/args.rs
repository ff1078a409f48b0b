//! Command-line argument definitions
//!
//! A single-command CLI: copy iRODS data objects or collections to an S3
//! destination.

use std::path::PathBuf;

use clap::Parser;
use is3_core::{CopyOptions, KeyCharPolicy};

/// Copy files from iRODS to S3
#[derive(Parser, Debug)]
#[command(name = "is3")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Overwrite files that exist at the destination
    #[arg(short, long)]
    pub force: bool,

    /// Copy iRODS collections recursively
    #[arg(short = 'R', long)]
    pub recursive: bool,

    /// Make the S3 bucket if it does not exist
    #[arg(long)]
    pub make_bucket: bool,

    /// Don't replicate the iRODS AVUs on S3
    #[arg(long)]
    pub ignore_avus: bool,

    /// Don't transfer any data, only log what will happen
    #[arg(long)]
    pub dry_run: bool,

    /// Check the destination checksum against the iRODS checksum
    #[arg(long)]
    pub verify: bool,

    /// Forbid S3 special characters in the destination keys
    #[arg(long, group = "key_chars", help_heading = "S3 key character control")]
    pub forbid_special: bool,

    /// Allow S3 restricted characters in the destination keys
    #[arg(long, group = "key_chars", help_heading = "S3 key character control")]
    pub allow_restricted: bool,

    /// Use s3cmd configuration, rather than from environment
    #[arg(long, value_name = "FILE", help_heading = "s3cmd interaction")]
    pub s3cfg: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Disable progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// iRODS source data objects or collections
    #[arg(value_name = "SOURCE", required = true)]
    pub sources: Vec<String>,

    /// S3 destination
    #[arg(value_name = "s3://BUCKET[/KEY]")]
    pub target: String,
}

impl Cli {
    /// Engine options derived from the flags
    pub fn copy_options(&self) -> CopyOptions {
        let key_chars = if self.forbid_special {
            KeyCharPolicy::ForbidSpecial
        } else if self.allow_restricted {
            KeyCharPolicy::AllowRestricted
        } else {
            KeyCharPolicy::Warn
        };

        CopyOptions {
            force: self.force,
            recursive: self.recursive,
            make_bucket: self.make_bucket,
            ignore_avus: self.ignore_avus,
            dry_run: self.dry_run,
            verify: self.verify,
            key_chars,
        }
    }
}
