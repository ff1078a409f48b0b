//! Copy orchestration
//!
//! The engine proper: for each expanded data object, decide whether to
//! proceed under the conflict policy, perform (or simulate) the streamed
//! transfer, replicate AVU metadata, optionally verify, and report a
//! per-object outcome. Data objects are processed strictly one at a time in
//! expansion order, so progress output and outcomes are reproducible.

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::expand::{resolve_roots, Expansion};
use crate::path::{KeyChars, S3Location};
use crate::source::{collapse_avus, Digest, DigestAlgorithm, SourceLeaf, SourceNode};
use crate::traits::{IntegrityToken, ObjectSink, SourceStore, TokenAlgorithm};

/// Key character-content policy
///
/// Classification itself never blocks; this decides whether a class warns
/// or rejects the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyCharPolicy {
    /// Warn on both special and restricted characters
    #[default]
    Warn,
    /// Reject keys with special characters; still warn on restricted
    ForbidSpecial,
    /// Warn on special characters only; restricted are silently allowed
    AllowRestricted,
}

/// Operator-facing configuration for a copy run
#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    /// Delete and overwrite destination objects that already exist
    pub force: bool,
    /// Descend into collections
    pub recursive: bool,
    /// Create the destination bucket if it does not exist
    pub make_bucket: bool,
    /// Skip AVU metadata replication
    pub ignore_avus: bool,
    /// Simulate only: no destination mutation, no data transfer
    pub dry_run: bool,
    /// Compare the destination integrity token against the source digest
    pub verify: bool,
    /// Key character policy
    pub key_chars: KeyCharPolicy,
}

/// Post-transfer verification result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Verification was not enabled
    NotRequested,
    /// Same algorithm, same transfer shape, equal digests
    Matched,
    /// Same algorithm, same transfer shape, different digests
    Mismatched,
    /// Digest algorithms or transfer shapes differ; equality cannot be
    /// asserted either way
    Inconclusive,
}

/// Terminal state of one data object
#[derive(Debug)]
pub enum TransferStatus {
    /// Uploaded to a previously-empty destination
    Transferred {
        bytes: u64,
        verification: Verification,
        /// Metadata replication failed after a successful transfer; the
        /// data stands, so this annotates rather than fails
        metadata_error: Option<String>,
    },
    /// Destination existed and was deleted before the upload
    Overwritten {
        bytes: u64,
        verification: Verification,
        metadata_error: Option<String>,
    },
    /// Destination existed and the force flag was unset
    SkippedExists,
    /// Dry run: what would have happened, without doing it
    SkippedDryRun { bytes: u64, would_overwrite: bool },
    /// The object could not be copied
    Failed(Error),
}

impl TransferStatus {
    /// Short machine-readable label
    pub const fn label(&self) -> &'static str {
        match self {
            TransferStatus::Transferred { .. } => "transferred",
            TransferStatus::Overwritten { .. } => "overwritten",
            TransferStatus::SkippedExists => "skipped-exists",
            TransferStatus::SkippedDryRun { .. } => "skipped-dry-run",
            TransferStatus::Failed(_) => "failed",
        }
    }

    pub const fn is_failed(&self) -> bool {
        matches!(self, TransferStatus::Failed(_))
    }
}

/// Per-object result, produced in expansion order
#[derive(Debug)]
pub struct TransferOutcome {
    /// Absolute iRODS source path
    pub source: String,
    /// Resolved destination
    pub dest: S3Location,
    pub status: TransferStatus,
}

/// Observer for operator-facing progress and results
///
/// Implemented by the CLI for progress bars and per-object reporting;
/// the default methods make a null observer trivial.
pub trait TransferObserver: Send + Sync {
    /// A transfer is about to start (not called for skips)
    fn transfer_started(&self, _leaf: &SourceLeaf, _dest: &S3Location) {}

    /// Cumulative bytes transferred for the in-flight object
    fn transfer_progress(&self, _bytes_so_far: u64, _total: u64) {}

    /// A data object reached a terminal state
    fn transfer_outcome(&self, _outcome: &TransferOutcome) {}
}

/// Observer that ignores everything
pub struct NullObserver;

impl TransferObserver for NullObserver {}

/// The copy engine
///
/// Owns no cross-call state; each [`Copier::run`] invocation is independent.
pub struct Copier<'a> {
    source: &'a dyn SourceStore,
    sink: &'a dyn ObjectSink,
    options: CopyOptions,
    cancel: CancellationToken,
}

impl<'a> Copier<'a> {
    pub fn new(
        source: &'a dyn SourceStore,
        sink: &'a dyn ObjectSink,
        options: CopyOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            sink,
            options,
            cancel,
        }
    }

    /// Copy the given source paths to the target location
    ///
    /// Fails fast (before any object is processed) on unresolvable sources
    /// and on a missing destination bucket without auto-creation. Per-object
    /// failures are recorded as outcomes and processing continues, unless
    /// the failure is systemic, in which case the remaining run is
    /// abandoned. Cancellation stops before the next object's transfer.
    pub async fn run(
        &self,
        sources: &[String],
        target: &S3Location,
        observer: &dyn TransferObserver,
    ) -> Result<Vec<TransferOutcome>> {
        self.preflight_bucket(target.bucket()).await?;

        let roots = resolve_roots(self.source, sources).await?;

        // A destination key named by the operator maps one explicit data
        // object verbatim; in every other case the key is a prefix and each
        // object lands under its own absolute source path
        let verbatim_key = !target.is_root()
            && roots.len() == 1
            && matches!(roots[0], SourceNode::Leaf(_));

        let mut expansion = Expansion::new(self.source, roots, self.options.recursive);
        let mut outcomes = Vec::new();

        while let Some(next) = expansion.next().await {
            if self.cancel.is_cancelled() {
                tracing::warn!("interrupted; stopping before the next object");
                break;
            }

            let leaf = next?;

            let dest = if verbatim_key {
                target.clone()
            } else {
                target.join(&leaf.path)
            };

            let outcome = self.copy_leaf(leaf, dest, observer).await;
            observer.transfer_outcome(&outcome);

            let abort = match &outcome.status {
                TransferStatus::Failed(err) if err.is_systemic() => true,
                _ => false,
            };
            outcomes.push(outcome);

            if abort {
                tracing::error!("systemic failure; abandoning the remaining run");
                break;
            }
        }

        Ok(outcomes)
    }

    /// Bucket preflight: create or fail before any object-level operation
    async fn preflight_bucket(&self, bucket: &str) -> Result<()> {
        if self.sink.bucket_exists(bucket).await? {
            return Ok(());
        }

        if !self.options.make_bucket {
            return Err(Error::BucketMissing(bucket.to_string()));
        }

        if self.options.dry_run {
            tracing::info!("dry run: would create bucket {bucket}");
            return Ok(());
        }

        tracing::info!("creating bucket {bucket}");
        self.sink.create_bucket(bucket).await
    }

    /// Drive one data object to a terminal state
    async fn copy_leaf(
        &self,
        leaf: SourceLeaf,
        dest: S3Location,
        observer: &dyn TransferObserver,
    ) -> TransferOutcome {
        let status = self.leaf_status(&leaf, &dest, observer).await;
        TransferOutcome {
            source: leaf.path,
            dest,
            status,
        }
    }

    async fn leaf_status(
        &self,
        leaf: &SourceLeaf,
        dest: &S3Location,
        observer: &dyn TransferObserver,
    ) -> TransferStatus {
        if let Err(err) = self.apply_key_policy(dest) {
            return TransferStatus::Failed(err);
        }

        let exists = match self.sink.exists(dest).await {
            Ok(exists) => exists,
            Err(err) => return TransferStatus::Failed(err),
        };

        if exists && !self.options.force {
            return TransferStatus::SkippedExists;
        }

        if self.options.dry_run {
            return TransferStatus::SkippedDryRun {
                bytes: leaf.size,
                would_overwrite: exists,
            };
        }

        if exists {
            tracing::info!("object exists at {dest}, deleting");
            if let Err(err) = self.sink.delete(dest).await {
                return TransferStatus::Failed(err);
            }
        }

        observer.transfer_started(leaf, dest);

        match self.transfer(leaf, dest, observer).await {
            Ok((bytes, parts)) => {
                let metadata_error = self.replicate_avus(leaf, dest).await;
                let verification = self.verify(leaf, dest, parts).await;
                if exists {
                    TransferStatus::Overwritten {
                        bytes,
                        verification,
                        metadata_error,
                    }
                } else {
                    TransferStatus::Transferred {
                        bytes,
                        verification,
                        metadata_error,
                    }
                }
            }
            // Past the delete there is no object to fall back to, so a
            // forced overwrite that fails here is its own failure mode
            Err(err) if exists => TransferStatus::Failed(Error::DeletedNotReplaced {
                url: dest.url(),
                cause: Box::new(err),
            }),
            Err(err) => TransferStatus::Failed(err),
        }
    }

    fn apply_key_policy(&self, dest: &S3Location) -> Result<()> {
        let KeyChars {
            has_special,
            has_restricted,
        } = dest.key_chars();

        if has_special {
            if self.options.key_chars == KeyCharPolicy::ForbidSpecial {
                return Err(Error::RejectedKeyCharacters(dest.url()));
            }
            tracing::warn!("S3 key contains special characters: {dest}");
        }

        if has_restricted && self.options.key_chars != KeyCharPolicy::AllowRestricted {
            tracing::warn!("S3 key contains restricted characters: {dest}");
        }

        Ok(())
    }

    /// Stream the object's bytes to the destination
    async fn transfer(
        &self,
        leaf: &SourceLeaf,
        dest: &S3Location,
        observer: &dyn TransferObserver,
    ) -> Result<(u64, usize)> {
        let body = self.source.open(leaf).await?;

        let total = leaf.size;
        let progress = move |bytes_so_far: u64| observer.transfer_progress(bytes_so_far, total);

        let summary = self.sink.upload(dest, body, leaf.size, &progress).await?;
        Ok((summary.bytes, summary.parts))
    }

    /// Replicate AVUs; failures annotate the outcome rather than fail it
    async fn replicate_avus(&self, leaf: &SourceLeaf, dest: &S3Location) -> Option<String> {
        if self.options.ignore_avus {
            return None;
        }

        let avus = match self.source.attributes(leaf).await {
            Ok(avus) => avus,
            Err(err) => {
                tracing::warn!("couldn't read AVUs for {}: {err}", leaf.path);
                return Some(err.to_string());
            }
        };

        if avus.is_empty() {
            return None;
        }

        let collapsed = collapse_avus(&avus);
        match self.sink.put_attributes(dest, &collapsed).await {
            Ok(()) => None,
            Err(err) => {
                tracing::warn!("couldn't replicate AVUs to {dest}: {err}");
                Some(err.to_string())
            }
        }
    }

    async fn verify(&self, leaf: &SourceLeaf, dest: &S3Location, parts: usize) -> Verification {
        if !self.options.verify {
            return Verification::NotRequested;
        }

        if parts > 1 {
            // Multipart uploads use a different addressing scheme; the
            // tokens are not comparable
            return Verification::Inconclusive;
        }

        let token = match self.sink.integrity_token(dest).await {
            Ok(token) => token,
            Err(err) => {
                tracing::warn!("couldn't fetch integrity token for {dest}: {err}");
                return Verification::Inconclusive;
            }
        };

        compare_digests(leaf.digest.as_ref(), token.as_ref())
    }
}

/// Compare a source digest with a destination token
///
/// Equality is only asserted when both sides carry the same algorithm over
/// the same transfer shape; anything else is inconclusive, never a failure.
fn compare_digests(digest: Option<&Digest>, token: Option<&IntegrityToken>) -> Verification {
    let (Some(digest), Some(token)) = (digest, token) else {
        return Verification::Inconclusive;
    };

    match (digest.algorithm, token.algorithm) {
        (DigestAlgorithm::Md5, TokenAlgorithm::Md5) => {
            if digest.bytes == token.bytes {
                Verification::Matched
            } else {
                Verification::Mismatched
            }
        }
        _ => Verification::Inconclusive,
    }
}
