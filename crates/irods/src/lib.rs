//! is3-irods: iRODS source gateway for irods-to-s3
//!
//! This crate provides the implementation of the SourceStore trait over the
//! iRODS HTTP API. It is the only crate that knows about iRODS wire formats.

pub mod api;
pub mod client;

pub use client::IrodsSource;
