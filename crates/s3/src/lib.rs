//! is3-s3: S3 destination gateway for irods-to-s3
//!
//! This crate provides the implementation of the ObjectSink trait using
//! aws-sdk-s3. It is the only crate that directly depends on the AWS SDK.

pub mod client;
pub mod multipart;

pub use client::S3Sink;
pub use multipart::MultipartConfig;
