//! iRODS source implementation
//!
//! Implements the SourceStore trait over the iRODS HTTP API. Authentication
//! happens once at connection time; every subsequent call carries the bearer
//! token. This is the only crate that knows about iRODS wire formats.

use async_trait::async_trait;
use base64::Engine as _;
use futures::TryStreamExt;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio_util::io::StreamReader;

use is3_core::{
    Avu, ByteStream, Digest, DigestAlgorithm, Error, IrodsConfig, Result, SourceLeaf, SourceNode,
    SourceStore,
};

use crate::api::{CollectionList, CollectionStat, DataObjectStat, QueryResults};

/// iRODS HTTP API client
pub struct IrodsSource {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl IrodsSource {
    /// Authenticate against the HTTP API and return a connected source
    pub async fn connect(config: IrodsConfig) -> Result<Self> {
        let http = reqwest::Client::new();

        let response = http
            .post(format!("{}/authenticate", config.api_url))
            .basic_auth(&config.username, Some(&config.password))
            .send()
            .await
            .map_err(map_http_error)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(Error::Auth(format!(
                "iRODS rejected the credentials for {}",
                config.qualified_username()
            )));
        }

        let token = check_status(response)?.text().await.map_err(map_http_error)?;

        Ok(Self {
            http,
            base: config.api_url,
            token,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let response = self
            .http
            .get(format!("{}/{endpoint}", self.base))
            .query(params)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(map_http_error)?;

        check_status(response)?.json().await.map_err(map_http_error)
    }

    async fn stat_collection(&self, path: &str) -> Result<CollectionStat> {
        self.get_json("collections", &[("op", "stat"), ("lpath", path)])
            .await
    }

    async fn stat_data_object(&self, path: &str) -> Result<DataObjectStat> {
        self.get_json("data-objects", &[("op", "stat"), ("lpath", path)])
            .await
    }
}

#[async_trait]
impl SourceStore for IrodsSource {
    async fn resolve(&self, path: &str) -> Result<SourceNode> {
        if !path.starts_with('/') {
            return Err(Error::SourceNotAbsolute(path.to_string()));
        }

        if self.stat_collection(path).await?.irods_response.is_ok() {
            return Ok(SourceNode::Collection(path.to_string()));
        }

        let stat = self.stat_data_object(path).await?;
        if stat.irods_response.is_ok() {
            return Ok(SourceNode::Leaf(leaf_from_stat(path, &stat)));
        }

        Err(Error::SourceNotFound(path.to_string()))
    }

    async fn list_children(&self, collection: &str) -> Result<(Vec<SourceLeaf>, Vec<String>)> {
        let list: CollectionList = self
            .get_json("collections", &[("op", "list"), ("lpath", collection)])
            .await?;

        if !list.irods_response.is_ok() {
            return Err(Error::SourceNotFound(collection.to_string()));
        }

        let mut leaves = Vec::new();
        let mut collections = Vec::new();

        // The listing is bare paths; stat each to classify and snapshot it
        for entry in list.entries.unwrap_or_default() {
            match self.resolve(&entry).await? {
                SourceNode::Leaf(leaf) => leaves.push(leaf),
                SourceNode::Collection(path) => collections.push(path),
            }
        }

        Ok((leaves, collections))
    }

    async fn open(&self, leaf: &SourceLeaf) -> Result<ByteStream> {
        let response = self
            .http
            .get(format!("{}/data-objects", self.base))
            .query(&[("op", "read"), ("lpath", leaf.path.as_str())])
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(map_http_error)?;

        let response = check_status(response)?;
        let stream = Box::pin(response.bytes_stream().map_err(std::io::Error::other));

        Ok(Box::new(StreamReader::new(stream)))
    }

    async fn attributes(&self, leaf: &SourceLeaf) -> Result<Vec<Avu>> {
        let (collection, name) = leaf
            .path
            .rsplit_once('/')
            .ok_or_else(|| Error::SourceNotAbsolute(leaf.path.clone()))?;

        let query = format!(
            "SELECT META_DATA_ATTR_NAME, META_DATA_ATTR_VALUE, META_DATA_ATTR_UNITS \
             WHERE COLL_NAME = '{}' AND DATA_NAME = '{}'",
            escape_genquery(collection),
            escape_genquery(name),
        );

        let results: QueryResults = self
            .get_json("query", &[("op", "execute_genquery"), ("query", &query)])
            .await?;

        if !results.irods_response.is_ok() {
            return Err(Error::Network(format!(
                "metadata query for {} failed: {}",
                leaf.path,
                results.irods_response.message()
            )));
        }

        let avus = results
            .rows
            .unwrap_or_default()
            .into_iter()
            .filter_map(row_to_avu)
            .collect();

        Ok(avus)
    }
}

fn leaf_from_stat(path: &str, stat: &DataObjectStat) -> SourceLeaf {
    let mut leaf = SourceLeaf::new(path, stat.size.unwrap_or(0));

    if let Some(digest) = stat.checksum.as_deref().and_then(parse_checksum) {
        leaf = leaf.with_digest(digest);
    } else if stat.checksum.is_some() {
        tracing::debug!("unrecognized checksum format on {path}");
    }

    leaf
}

/// Decode an iRODS checksum string
///
/// Modern zones report `sha2:<base64>`; older ones a bare MD5 hex string.
/// Anything else yields `None` (the object's storage layout may not support
/// a checksum at all).
fn parse_checksum(checksum: &str) -> Option<Digest> {
    if let Some(encoded) = checksum.strip_prefix("sha2:") {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .ok()?;
        return Some(Digest {
            algorithm: DigestAlgorithm::Sha256,
            bytes,
        });
    }

    Digest::from_hex(DigestAlgorithm::Md5, checksum)
}

fn row_to_avu(row: Vec<String>) -> Option<Avu> {
    let mut fields = row.into_iter();
    let attribute = fields.next()?;
    let value = fields.next()?;
    let unit = fields.next().filter(|u| !u.is_empty());

    Some(Avu {
        attribute,
        value,
        unit,
    })
}

fn escape_genquery(value: &str) -> String {
    value.replace('\'', "\\'")
}

fn map_http_error(err: reqwest::Error) -> Error {
    match err.status() {
        Some(StatusCode::UNAUTHORIZED) | Some(StatusCode::FORBIDDEN) => Error::Auth(err.to_string()),
        _ => Error::Network(err.to_string()),
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Auth(format!(
            "iRODS HTTP API returned {}",
            response.status()
        ))),
        status => Err(Error::Network(format!(
            "iRODS HTTP API returned {status}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_checksum_sha2() {
        // sha256 of the empty string
        let digest = parse_checksum("sha2:47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=").unwrap();
        assert_eq!(digest.algorithm, DigestAlgorithm::Sha256);
        assert_eq!(
            hex::encode(&digest.bytes),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_parse_checksum_md5_hex() {
        let digest = parse_checksum("d41d8cd98f00b204e9800998ecf8427e").unwrap();
        assert_eq!(digest.algorithm, DigestAlgorithm::Md5);
        assert_eq!(digest.bytes.len(), 16);
    }

    #[test]
    fn test_parse_checksum_unrecognized() {
        assert!(parse_checksum("").is_none());
        assert!(parse_checksum("sha2:???").is_none());
        assert!(parse_checksum("zsh512:abcdef").is_none());
    }

    #[test]
    fn test_row_to_avu() {
        let avu = row_to_avu(vec!["owner".into(), "alice".into(), "lab1".into()]).unwrap();
        assert_eq!(avu.attribute, "owner");
        assert_eq!(avu.value, "alice");
        assert_eq!(avu.unit.as_deref(), Some("lab1"));

        // Empty units collapse to None
        let avu = row_to_avu(vec!["owner".into(), "bob".into(), String::new()]).unwrap();
        assert_eq!(avu.unit, None);

        assert!(row_to_avu(vec!["only-attr".into()]).is_none());
    }

    #[test]
    fn test_escape_genquery() {
        assert_eq!(escape_genquery("it's"), "it\\'s");
        assert_eq!(escape_genquery("plain"), "plain");
    }
}
