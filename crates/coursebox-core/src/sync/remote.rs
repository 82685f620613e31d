//! Remote endpoint abstraction
//!
//! The engine talks to the remote through [`RemoteEndpoint`] so tests can
//! script it. [`HttpRemote`] is the production implementation: a blocking
//! HTTP client posting changes to `{endpoint}/changes`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::models::{ChangeAction, EntityType};

/// One outgoing change
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UploadRequest {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(rename = "id")]
    pub entity_id: String,
    pub action: ChangeAction,
    /// Entity snapshot; absent for deletes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// One incoming change from the remote
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RemoteChange {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(rename = "id")]
    pub entity_id: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub data: Value,
}

/// Errors from the remote endpoint
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("remote rejected the change: {0}")]
    Rejected(String),

    #[error("remote request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// The remote side of sync
pub trait RemoteEndpoint {
    /// Push one change; Ok means the remote accepted it
    fn upload(&self, request: &UploadRequest) -> Result<(), RemoteError>;

    /// Fetch changes newer than `since`
    fn get_changes(&self, since: DateTime<Utc>) -> Result<Vec<RemoteChange>, RemoteError>;
}

/// HTTP implementation against `{endpoint}/changes`
pub struct HttpRemote {
    client: reqwest::blocking::Client,
    endpoint: String,
    credential: Option<String>,
}

impl HttpRemote {
    pub fn new(
        endpoint: impl Into<String>,
        credential: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            credential,
        })
    }

    fn authorize(&self, builder: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.credential {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

impl RemoteEndpoint for HttpRemote {
    fn upload(&self, request: &UploadRequest) -> Result<(), RemoteError> {
        let url = format!("{}/changes", self.endpoint);
        let response = self
            .authorize(self.client.post(&url).json(request))
            .send()?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            Err(RemoteError::Rejected(format!("{}: {}", status, body)))
        }
    }

    fn get_changes(&self, since: DateTime<Utc>) -> Result<Vec<RemoteChange>, RemoteError> {
        let url = format!("{}/changes", self.endpoint);
        let response = self
            .authorize(self.client.get(&url).query(&[("since", since.to_rfc3339())]))
            .send()?;

        if !response.status().is_success() {
            return Err(RemoteError::Rejected(response.status().to_string()));
        }

        let changes = response.json::<Vec<RemoteChange>>()?;
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_request_wire_shape() {
        let request = UploadRequest {
            entity_type: EntityType::Courseware,
            entity_id: "c1".to_string(),
            action: ChangeAction::Update,
            data: Some(serde_json::json!({"title": "Algebra"})),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "courseware");
        assert_eq!(json["id"], "c1");
        assert_eq!(json["action"], "update");
        assert_eq!(json["data"]["title"], "Algebra");
    }

    #[test]
    fn test_upload_request_omits_absent_data() {
        let request = UploadRequest {
            entity_type: EntityType::Question,
            entity_id: "q1".to_string(),
            action: ChangeAction::Delete,
            data: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_remote_change_parses() {
        let change: RemoteChange = serde_json::from_str(
            r#"{"type": "question", "id": "q1", "updatedAt": "2024-06-01T12:00:00Z",
                "data": {"question_type": "essay"}}"#,
        )
        .unwrap();

        assert_eq!(change.entity_type, EntityType::Question);
        assert_eq!(change.entity_id, "q1");
        assert_eq!(change.data["question_type"], "essay");
    }

    #[test]
    fn test_remote_change_data_defaults_to_null() {
        let change: RemoteChange = serde_json::from_str(
            r#"{"type": "courseware", "id": "c1", "updatedAt": "2024-06-01T12:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(change.data, Value::Null);
    }

    #[test]
    fn test_http_remote_trims_trailing_slash() {
        let remote = HttpRemote::new(
            "https://sync.example.com/",
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(remote.endpoint, "https://sync.example.com");
    }
}
