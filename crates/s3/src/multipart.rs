//! Multipart upload sizing
//!
//! Decides when an upload is fragmented into parts and how large the parts
//! are, within the S3 service limits.

/// Default part size: 16 MiB
pub const DEFAULT_PART_SIZE: u64 = 16 * 1024 * 1024;

/// Uploads at or below this size go up in a single PutObject
pub const DEFAULT_THRESHOLD: u64 = 16 * 1024 * 1024;

/// Minimum part size: 5 MiB (S3 requirement)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum part size: 5 GiB
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum number of parts: 10,000 (S3 limit)
pub const MAX_PARTS: u64 = 10_000;

/// Multipart upload configuration
#[derive(Debug, Clone)]
pub struct MultipartConfig {
    /// Part size in bytes
    pub part_size: u64,

    /// Single-part threshold in bytes
    pub threshold: u64,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl MultipartConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn part_size(mut self, size: u64) -> Self {
        self.part_size = size.clamp(MIN_PART_SIZE, MAX_PART_SIZE);
        self
    }

    pub fn threshold(mut self, size: u64) -> Self {
        self.threshold = size;
        self
    }

    /// Whether an object of this size is uploaded in parts
    pub fn is_multipart(&self, object_size: u64) -> bool {
        object_size > self.threshold
    }

    /// Calculate the part size for an object, growing it when the
    /// configured size would exceed the 10,000-part limit
    pub fn calculate_part_size(&self, object_size: u64) -> u64 {
        let parts = object_size.div_ceil(self.part_size);

        if parts <= MAX_PARTS {
            self.part_size
        } else {
            object_size
                .div_ceil(MAX_PARTS)
                .clamp(MIN_PART_SIZE, MAX_PART_SIZE)
        }
    }
}
