//! Destination path parsing and validation
//!
//! Handles parsing of destination URLs in the format: s3://BUCKET[/KEY]
//! Bucket names are validated against the S3 naming rules; keys are never
//! rejected at parse time, only classified by character content.

use std::net::IpAddr;

use crate::error::{Error, Result};

/// Characters in a key that require URL-encoding when used over REST
const SPECIAL_CHARS: &[char] = &['&', '$', '@', '=', ';', ':', '+', ' ', ',', '?'];

/// Characters S3 vendors advise avoiding in keys altogether
const RESTRICTED_CHARS: &[char] = &[
    '^', '"', '\\', '{', '}', '[', ']', '<', '>', '#', '~', '%', '`', '|',
];

/// Character-content classification of a destination key
///
/// Advisory only: classification never blocks an operation by itself.
/// The orchestrator decides whether a class warns or rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyChars {
    /// Key contains characters that require URL-encoding
    pub has_special: bool,
    /// Key contains characters vendors advise avoiding
    pub has_restricted: bool,
}

/// Classify a key by its character content
pub fn classify(key: &str) -> KeyChars {
    KeyChars {
        has_special: key
            .chars()
            .any(|c| SPECIAL_CHARS.contains(&c) || c.is_ascii_control()),
        has_restricted: key
            .chars()
            .any(|c| RESTRICTED_CHARS.contains(&c) || !c.is_ascii()),
    }
}

/// A parsed S3 destination: bucket plus optional object key
///
/// The key is `None` for the bucket root. Construction goes through
/// [`S3Location::parse`], which validates the bucket name before any
/// remote call is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    bucket: String,
    key: Option<String>,
}

impl S3Location {
    /// Parse an `s3://BUCKET[/KEY]` URL
    ///
    /// Fails with [`Error::InvalidUrl`] when the string doesn't have the
    /// scheme or a bucket, and [`Error::InvalidBucketName`] when the bucket
    /// fails the length, character or IP-address checks.
    pub fn parse(s3_url: &str) -> Result<Self> {
        let rest = s3_url
            .strip_prefix("s3://")
            .ok_or_else(|| Error::InvalidUrl(s3_url.to_string()))?;

        let (bucket, key) = match rest.split_once('/') {
            Some((bucket, key)) => (bucket, Some(key)),
            None => (rest, None),
        };

        if bucket.is_empty() {
            return Err(Error::InvalidUrl(s3_url.to_string()));
        }

        validate_bucket_name(bucket)?;

        // An empty key after the slash still means the bucket root
        let key = key.filter(|k| !k.is_empty()).map(String::from);

        Ok(Self {
            bucket: bucket.to_string(),
            key,
        })
    }

    /// Bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key, if any (`None` means the bucket root)
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Whether this location addresses the bucket root
    pub fn is_root(&self) -> bool {
        self.key.is_none()
    }

    /// Append a path to the key, yielding a new location
    ///
    /// Absolute paths are rebased under the root first (the leading slash is
    /// stripped), so `s3://bucket/prefix` joined with `/zone/data` becomes
    /// `s3://bucket/prefix/zone/data`. Joining an empty path onto the bucket
    /// root yields the bucket root again.
    pub fn join(&self, path: &str) -> Self {
        let path = path.trim_start_matches('/');

        let key = match (self.key.as_deref(), path) {
            (None, "") => None,
            (None, p) => Some(p.to_string()),
            (Some(k), "") => Some(k.to_string()),
            (Some(k), p) => Some(format!("{}/{}", k.trim_end_matches('/'), p)),
        };

        Self {
            bucket: self.bucket.clone(),
            key,
        }
    }

    /// Character-content classification of the key
    ///
    /// The bucket root classifies as neither special nor restricted.
    pub fn key_chars(&self) -> KeyChars {
        classify(self.key.as_deref().unwrap_or(""))
    }

    /// Re-serialize to an `s3://` URL
    pub fn url(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key.as_deref().unwrap_or(""))
    }
}

impl std::fmt::Display for S3Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url())
    }
}

impl std::str::FromStr for S3Location {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Validate a bucket name against the S3 naming rules
///
/// Dot-separated labels of lowercase alphanumerics and hyphens, no label
/// starting or ending with a hyphen, total length strictly between 3 and 63
/// characters, and not an IP address.
fn validate_bucket_name(bucket: &str) -> Result<()> {
    let invalid = || Error::InvalidBucketName(bucket.to_string());

    if !(3..=63).contains(&bucket.len()) {
        return Err(invalid());
    }

    for label in bucket.split('.') {
        if label.is_empty() || label.starts_with('-') || label.ends_with('-') {
            return Err(invalid());
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(invalid());
        }
    }

    if is_ip(bucket) {
        return Err(invalid());
    }

    Ok(())
}

/// Whether a name reads as an IP address, either dotted or as a plain
/// decimal integer (`3232235777` is `192.168.1.1`)
fn is_ip(name: &str) -> bool {
    if name.chars().all(|c| c.is_ascii_digit()) {
        return name.parse::<u32>().is_ok();
    }

    name.parse::<IpAddr>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bucket_and_key() {
        let loc = S3Location::parse("s3://my-bucket/path/to/object").unwrap();
        assert_eq!(loc.bucket(), "my-bucket");
        assert_eq!(loc.key(), Some("path/to/object"));
        assert!(!loc.is_root());
    }

    #[test]
    fn test_parse_bucket_root() {
        let loc = S3Location::parse("s3://my-bucket").unwrap();
        assert_eq!(loc.bucket(), "my-bucket");
        assert_eq!(loc.key(), None);
        assert!(loc.is_root());

        // A trailing slash is still the bucket root
        let loc = S3Location::parse("s3://my-bucket/").unwrap();
        assert!(loc.is_root());
    }

    #[test]
    fn test_parse_rejects_malformed_urls() {
        for url in ["", "my-bucket/key", "http://my-bucket/key", "s3://", "s3:///key"] {
            assert!(
                matches!(S3Location::parse(url), Err(Error::InvalidUrl(_))),
                "expected InvalidUrl for {url:?}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_bad_bucket_lengths() {
        assert!(matches!(
            S3Location::parse("s3://ab"),
            Err(Error::InvalidBucketName(_))
        ));
        let long = format!("s3://{}", "a".repeat(64));
        assert!(matches!(
            S3Location::parse(&long),
            Err(Error::InvalidBucketName(_))
        ));

        // Boundary cases are allowed
        assert!(S3Location::parse("s3://abc").is_ok());
        assert!(S3Location::parse(&format!("s3://{}", "a".repeat(63))).is_ok());
    }

    #[test]
    fn test_parse_rejects_bad_bucket_grammar() {
        for bucket in [
            "My-Bucket",
            "bucket_name",
            "-bucket",
            "bucket-",
            "bu..cket",
            "bucket.-leading",
            "trailing-.bucket",
        ] {
            let url = format!("s3://{bucket}/key");
            assert!(
                matches!(S3Location::parse(&url), Err(Error::InvalidBucketName(_))),
                "expected InvalidBucketName for {bucket:?}"
            );
        }

        assert!(S3Location::parse("s3://dotted.bucket.name/key").is_ok());
    }

    #[test]
    fn test_parse_rejects_ip_address_buckets() {
        assert!(matches!(
            S3Location::parse("s3://192.168.1.1"),
            Err(Error::InvalidBucketName(_))
        ));
        // A pure decimal integer is also an IPv4 address
        assert!(matches!(
            S3Location::parse("s3://3232235777"),
            Err(Error::InvalidBucketName(_))
        ));
        // Too big to be an IPv4 address, and not otherwise invalid
        assert!(S3Location::parse("s3://99999999999999").is_ok());
    }

    #[test]
    fn test_url_round_trip() {
        for url in ["s3://bucket/a/b/c", "s3://bucket/"] {
            let loc = S3Location::parse(url).unwrap();
            assert_eq!(loc.url(), *url);
            let again = S3Location::parse(&loc.url()).unwrap();
            assert_eq!(again, loc);
        }

        // The bare-bucket form normalizes to a single trailing slash
        let loc = S3Location::parse("s3://bucket").unwrap();
        assert_eq!(loc.url(), "s3://bucket/");
    }

    #[test]
    fn test_join_relative_and_absolute() {
        let root = S3Location::parse("s3://bucket").unwrap();

        let joined = root.join("path/to/object");
        assert_eq!(joined.key(), Some("path/to/object"));

        // Absolute paths are rebased under the root
        let joined = root.join("/zone/home/user/data.cram");
        assert_eq!(joined.key(), Some("zone/home/user/data.cram"));
        assert_eq!(joined.url(), "s3://bucket/zone/home/user/data.cram");
    }

    #[test]
    fn test_join_onto_prefix() {
        let prefix = S3Location::parse("s3://bucket/archive").unwrap();
        let joined = prefix.join("/zone/data.cram");
        assert_eq!(joined.key(), Some("archive/zone/data.cram"));
    }

    #[test]
    fn test_join_empty_components() {
        let root = S3Location::parse("s3://bucket").unwrap();
        assert!(root.join("").is_root());
        assert!(root.join("/").is_root());
    }

    #[test]
    fn test_classify_special() {
        let chars = classify("a&b");
        assert!(chars.has_special);
        assert!(!chars.has_restricted);

        assert!(classify("a b").has_special);
        assert!(classify("a\x01b").has_special);
        assert!(classify("a\x7fb").has_special);
    }

    #[test]
    fn test_classify_restricted() {
        let chars = classify("a{b}");
        assert!(!chars.has_special);
        assert!(chars.has_restricted);

        assert!(classify("a#b").has_restricted);
        assert!(classify("naïve").has_restricted);
    }

    #[test]
    fn test_classify_clean() {
        let chars = classify("plain/path/to-object_1.txt");
        assert_eq!(chars, KeyChars::default());
    }

    #[test]
    fn test_key_chars_on_location() {
        let loc = S3Location::parse("s3://bucket/a&b").unwrap();
        assert!(loc.key_chars().has_special);

        let root = S3Location::parse("s3://bucket").unwrap();
        assert_eq!(root.key_chars(), KeyChars::default());
    }
}
