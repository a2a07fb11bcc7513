//! Command surface: JSON request and response payloads.

use crate::error::ApiError;
use crate::tree::CacheNode;
use crate::types::{path_serde, ChangeNotice};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Error context for requests that never reached a command handler
pub const DISPATCHER_CONTEXT: &str = "Message dispatcher";

/// Incoming command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "path_serde::option")]
    pub path: Option<PathBuf>,
    /// `update` only: return the whole tree instead of the changes
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub full: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ServiceRequest {
    /// Request with a fresh correlation id.
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            path: None,
            full: false,
            correlation_id: Some(uuid::Uuid::new_v4().to_string()),
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn full(mut self) -> Self {
        self.full = true;
        self
    }
}

/// Error payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub context: String,
}

/// Answer to `info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    #[serde(with = "path_serde")]
    pub root_dir: PathBuf,
    pub tracked_directories: usize,
    pub album_entries: usize,
    pub pending_changes: usize,
    pub pending_renames: usize,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "path_serde::option")]
    pub snapshot_file: Option<PathBuf>,
}

/// Outgoing answer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceResponse {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<Vec<ChangeNotice>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "path_serde::option_map")]
    pub snapshot: Option<BTreeMap<PathBuf, CacheNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<ServiceInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

impl ServiceResponse {
    /// Empty success answer echoing the request's command and correlation id.
    pub fn ok(request: &ServiceRequest) -> Self {
        Self {
            cmd: request.cmd.clone(),
            correlation_id: request.correlation_id.clone(),
            ..Self::default()
        }
    }

    pub fn failure(request: &ServiceRequest, error: &ApiError, context: &str) -> Self {
        Self {
            error: Some(ErrorResponse {
                error: error.to_string(),
                context: context.to_string(),
            }),
            ..Self::ok(request)
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Turn an error answer back into an [`ApiError`].
    pub fn into_result(self) -> Result<Self, ApiError> {
        match self.error {
            None => Ok(self),
            Some(e) => match e.error.strip_prefix("Unknown command: ") {
                Some(cmd) => Err(ApiError::UnknownCommand(cmd.to_string())),
                None => Err(ApiError::RemoteError {
                    context: e.context,
                    message: e.error,
                }),
            },
        }
    }
}

/// Parse one request payload. A malformed payload yields the error answer
/// to send back.
pub fn parse_request(payload: &str) -> Result<ServiceRequest, ServiceResponse> {
    serde_json::from_str(payload).map_err(|e| ServiceResponse {
        error: Some(ErrorResponse {
            error: e.to_string(),
            context: DISPATCHER_CONTEXT.to_string(),
        }),
        ..ServiceResponse::default()
    })
}
