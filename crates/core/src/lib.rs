//! is3-core: engine for copying iRODS data objects into S3
//!
//! This crate provides everything the copy engine needs short of talking to
//! a real endpoint:
//! - Destination URL parsing, bucket-name validation and key classification
//! - Source tree expansion into a flat sequence of data objects
//! - The copy orchestrator (conflict policy, dry run, AVU replication,
//!   verification)
//! - Gateway traits for the two remote systems
//! - Connection configuration resolution
//!
//! The crate is independent of any specific SDK; the iRODS and S3 adapters
//! live in their own crates and are swappable for testing.

pub mod config;
pub mod copy;
pub mod error;
pub mod expand;
pub mod path;
pub mod source;
pub mod traits;

pub use config::{IrodsConfig, S3Config};
pub use copy::{
    Copier, CopyOptions, KeyCharPolicy, NullObserver, TransferObserver, TransferOutcome,
    TransferStatus, Verification,
};
pub use error::{Error, Result};
pub use expand::{resolve_roots, Expansion};
pub use path::{classify, KeyChars, S3Location};
pub use source::{collapse_avus, Avu, Digest, DigestAlgorithm, SourceLeaf, SourceNode};
pub use traits::{
    ByteStream, IntegrityToken, ObjectSink, ProgressFn, SourceStore, TokenAlgorithm, UploadSummary,
};
