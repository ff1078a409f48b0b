//! Connection configuration
//!
//! Bootstrap settings for both remote systems, resolved from the usual
//! places: the iRODS environment file (`~/.irods/irods_environment.json`)
//! plus `IRODS_*` variables on one side, and either `AWS_*`/`S3_ENDPOINT_URL`
//! environment variables or an s3cmd configuration file on the other.
//! Everything is resolved up front and passed into the gateway constructors;
//! there is no process-wide session state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};

/// Environment variable naming the iRODS environment file
pub const IRODS_ENVIRONMENT_FILE: &str = "IRODS_ENVIRONMENT_FILE";

/// Environment variable holding the iRODS password
pub const IRODS_PASSWORD: &str = "IRODS_PASSWORD";

/// Environment variable naming the iRODS HTTP API base URL
pub const IRODS_HTTP_API_URL: &str = "IRODS_HTTP_API_URL";

/// The subset of irods_environment.json this tool needs
#[derive(Debug, Clone, Deserialize)]
struct IrodsEnvironment {
    irods_user_name: String,
    irods_zone_name: String,
}

/// Resolved iRODS connection settings
#[derive(Debug, Clone)]
pub struct IrodsConfig {
    /// Base URL of the iRODS HTTP API
    pub api_url: String,
    /// User name, without the zone
    pub username: String,
    /// Zone name
    pub zone: String,
    /// Native-authentication password
    pub password: String,
}

impl IrodsConfig {
    /// Resolve from the environment: the environment file for identity,
    /// `IRODS_HTTP_API_URL` for the endpoint and `IRODS_PASSWORD` for the
    /// credential
    pub fn from_environment() -> Result<Self> {
        let env_file = std::env::var(IRODS_ENVIRONMENT_FILE)
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_irods_environment_file());

        let api_url = require_env(IRODS_HTTP_API_URL)?;
        let password = require_env(IRODS_PASSWORD)?;

        Self::from_parts(&env_file, &api_url, &password)
    }

    /// Resolve from an explicit environment file plus endpoint and password
    pub fn from_parts(env_file: &Path, api_url: &str, password: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(env_file).map_err(|_| {
            Error::Config(format!(
                "No iRODS environment found in {}",
                env_file.display()
            ))
        })?;

        let env: IrodsEnvironment = serde_json::from_str(&contents)
            .map_err(|err| Error::Config(format!("Invalid iRODS environment: {err}")))?;

        validate_url(api_url)?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            username: env.irods_user_name,
            zone: env.irods_zone_name,
            password: password.to_string(),
        })
    }

    /// Fully-qualified user name (`user#zone`)
    pub fn qualified_username(&self) -> String {
        format!("{}#{}", self.username, self.zone)
    }
}

/// Default iRODS environment file location
fn default_irods_environment_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".irods")
        .join("irods_environment.json")
}

/// Resolved S3 connection settings
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Endpoint URL
    pub endpoint: String,
    /// Access key ID
    pub access_key: String,
    /// Secret access key
    pub secret_key: String,
    /// Region (S3-compatible endpoints rarely care, but the SDK wants one)
    pub region: String,
}

impl S3Config {
    /// Resolve from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and
    /// `S3_ENDPOINT_URL`
    pub fn from_environment() -> Result<Self> {
        let access_key = require_env("AWS_ACCESS_KEY_ID")?;
        let secret_key = require_env("AWS_SECRET_ACCESS_KEY")?;
        let endpoint = require_env("S3_ENDPOINT_URL")?;
        validate_url(&endpoint)?;

        Ok(Self {
            endpoint,
            access_key,
            secret_key,
            region: default_region(),
        })
    }

    /// Resolve from an s3cmd configuration file instead of the environment
    ///
    /// Reads the `default` profile's `host_base`, `access_key` and
    /// `secret_key` options; `use_https` selects the scheme.
    pub fn from_s3cmd(config: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(config).map_err(|_| {
            Error::Config(format!(
                "No s3cmd configuration found in {}",
                config.display()
            ))
        })?;

        let profile = ini_section(&contents, "default").ok_or_else(|| {
            Error::Config("Invalid s3cmd configuration; no \"default\" profile".to_string())
        })?;

        let option = |key: &str| {
            profile.get(key).cloned().ok_or_else(|| {
                Error::Config(format!("Invalid s3cmd configuration; no \"{key}\" option"))
            })
        };

        let host_base = option("host_base")?;
        let access_key = option("access_key")?;
        let secret_key = option("secret_key")?;

        let https = profile
            .get("use_https")
            .is_some_and(|v| matches!(v.to_lowercase().as_str(), "true" | "yes" | "on" | "1"));
        let scheme = if https { "https" } else { "http" };
        let endpoint = format!("{scheme}://{host_base}");
        validate_url(&endpoint)?;

        Ok(Self {
            endpoint,
            access_key,
            secret_key,
            region: default_region(),
        })
    }
}

fn default_region() -> String {
    std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string())
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| Error::Config(format!("Environment variable not set: {name}")))
}

fn validate_url(candidate: &str) -> Result<()> {
    Url::parse(candidate)
        .map(|_| ())
        .map_err(|err| Error::Config(format!("Invalid URL {candidate}: {err}")))
}

/// Minimal INI section reader, enough for s3cmd's key = value format
fn ini_section(contents: &str, section: &str) -> Option<HashMap<String, String>> {
    let mut current: Option<&str> = None;
    let mut values = HashMap::new();
    let mut found = false;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            current = Some(name.trim());
            found |= name.trim() == section;
            continue;
        }

        if current == Some(section) {
            if let Some((key, value)) = line.split_once('=') {
                values.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
    }

    found.then_some(values)
}
