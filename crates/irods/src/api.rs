//! Wire types for the iRODS HTTP API
//!
//! Response shapes for the handful of operations this tool uses. Every
//! response carries an `irods_response` envelope whose `status_code` is zero
//! on success and an iRODS error code otherwise.

use serde::Deserialize;

/// The response envelope common to all operations
#[derive(Debug, Clone, Deserialize)]
pub struct IrodsResponse {
    pub status_code: i64,
    #[serde(default)]
    pub status_message: Option<String>,
}

impl IrodsResponse {
    pub fn is_ok(&self) -> bool {
        self.status_code == 0
    }

    /// Status message, falling back to the numeric code
    pub fn message(&self) -> String {
        self.status_message
            .clone()
            .unwrap_or_else(|| format!("iRODS error {}", self.status_code))
    }
}

/// `/collections?op=stat`
#[derive(Debug, Deserialize)]
pub struct CollectionStat {
    pub irods_response: IrodsResponse,
}

/// `/data-objects?op=stat`
#[derive(Debug, Deserialize)]
pub struct DataObjectStat {
    pub irods_response: IrodsResponse,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub checksum: Option<String>,
}

/// `/collections?op=list`
#[derive(Debug, Deserialize)]
pub struct CollectionList {
    pub irods_response: IrodsResponse,
    #[serde(default)]
    pub entries: Option<Vec<String>>,
}

/// `/query?op=execute_genquery`
#[derive(Debug, Deserialize)]
pub struct QueryResults {
    pub irods_response: IrodsResponse,
    #[serde(default)]
    pub rows: Option<Vec<Vec<String>>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_deserializes() {
        let stat: DataObjectStat = serde_json::from_str(
            r#"{
                "irods_response": {"status_code": 0},
                "type": "data_object",
                "size": 1024,
                "checksum": "sha2:47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
            }"#,
        )
        .unwrap();

        assert!(stat.irods_response.is_ok());
        assert_eq!(stat.size, Some(1024));
        assert!(stat.checksum.unwrap().starts_with("sha2:"));
    }

    #[test]
    fn test_error_envelope() {
        let stat: CollectionStat = serde_json::from_str(
            r#"{"irods_response": {"status_code": -170000, "status_message": "NOT_A_COLLECTION"}}"#,
        )
        .unwrap();

        assert!(!stat.irods_response.is_ok());
        assert_eq!(stat.irods_response.message(), "NOT_A_COLLECTION");
    }

    #[test]
    fn test_message_falls_back_to_code() {
        let response = IrodsResponse {
            status_code: -808000,
            status_message: None,
        };
        assert_eq!(response.message(), "iRODS error -808000");
    }
}
