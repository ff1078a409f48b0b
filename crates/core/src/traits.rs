//! Gateway trait definitions
//!
//! These traits define the capability surfaces over the two remote systems.
//! The engine is written against them, so concrete adapters (iRODS HTTP API,
//! aws-sdk-s3) are swappable and the orchestrator is testable with in-memory
//! fakes, without either remote endpoint.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::Result;
use crate::path::S3Location;
use crate::source::{Avu, SourceLeaf, SourceNode};

/// A readable byte stream from the source store
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Cumulative-progress callback, invoked with total bytes transferred so far
pub type ProgressFn<'a> = &'a (dyn Fn(u64) + Send + Sync);

/// What the destination reports after a completed upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    /// Bytes written
    pub bytes: u64,
    /// Number of parts the destination fragmented the upload into
    /// (1 for a single-part upload)
    pub parts: usize,
}

/// Algorithm behind a destination integrity token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAlgorithm {
    /// Plain MD5 of the object content (single-part ETag)
    Md5,
    /// MD5-of-part-MD5s (multipart ETag); not comparable with any
    /// whole-content digest
    MultipartMd5,
}

/// A destination-side integrity token with its algorithm tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityToken {
    pub algorithm: TokenAlgorithm,
    pub bytes: Vec<u8>,
}

/// Capability surface over the source store (iRODS)
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Resolve an absolute path to a data object or collection
    ///
    /// Fails with `SourceNotAbsolute` for relative paths and
    /// `SourceNotFound` when nothing exists at the path. Leaves come back
    /// as snapshots carrying size and content digest.
    async fn resolve(&self, path: &str) -> Result<SourceNode>;

    /// List the direct children of a collection: data objects first,
    /// subcollections second, each in enumeration order
    async fn list_children(&self, collection: &str) -> Result<(Vec<SourceLeaf>, Vec<String>)>;

    /// Open a readable byte stream over a data object
    async fn open(&self, leaf: &SourceLeaf) -> Result<ByteStream>;

    /// Read the descriptive AVU metadata of a data object
    ///
    /// An object without metadata yields an empty list; that is not an error.
    async fn attributes(&self, leaf: &SourceLeaf) -> Result<Vec<Avu>>;
}

/// Capability surface over the destination store (S3)
#[async_trait]
pub trait ObjectSink: Send + Sync {
    /// Whether the bucket exists
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Create the bucket
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// Whether an object exists at the location
    ///
    /// Absence is the normal, anticipated answer during conflict checks,
    /// never an error.
    async fn exists(&self, dest: &S3Location) -> Result<bool>;

    /// Delete the object at the location
    async fn delete(&self, dest: &S3Location) -> Result<()>;

    /// Stream a single logical upload to the location
    ///
    /// The sink decides whether to fragment into parts internally; `progress`
    /// is invoked with cumulative bytes after each chunk.
    async fn upload(
        &self,
        dest: &S3Location,
        body: ByteStream,
        size: u64,
        progress: ProgressFn<'_>,
    ) -> Result<UploadSummary>;

    /// Attach descriptive metadata to an existing object
    async fn put_attributes(
        &self,
        dest: &S3Location,
        attributes: &BTreeMap<String, String>,
    ) -> Result<()>;

    /// Fetch the destination-side integrity token for an object, if the
    /// store exposes one
    async fn integrity_token(&self, dest: &S3Location) -> Result<Option<IntegrityToken>>;
}
