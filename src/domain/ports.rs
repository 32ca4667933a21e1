//! Domain Ports - The boundary between the reconciler and the LXD server
//!
//! The reconciler only ever talks to LXD through [`LxdApi`]. The concrete
//! HTTP client lives in [`crate::client`]; tests substitute a recording fake.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

// =============================================================================
// HTTP Method
// =============================================================================

/// HTTP methods used against the LXD API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Response Envelope
// =============================================================================

/// Kind of an LXD response envelope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    #[default]
    Sync,
    Async,
    Error,
}

/// LXD REST response envelope
///
/// Every LXD endpoint answers with this shape. Error responses carry
/// `error_code` and `error`; sync responses carry `metadata`; async
/// responses name a background `operation`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Envelope type
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    /// Human readable status ("Success", "Operation created", ...)
    #[serde(default)]
    pub status: String,
    /// LXD status code (200, 100, ...)
    #[serde(default)]
    pub status_code: u16,
    /// Error message for error responses
    #[serde(default)]
    pub error: String,
    /// HTTP-style error code for error responses
    #[serde(default)]
    pub error_code: u16,
    /// Operation URL for async responses
    #[serde(default)]
    pub operation: String,
    /// Response payload
    #[serde(default)]
    pub metadata: Value,
}

impl ApiResponse {
    /// A successful sync response carrying `metadata`
    pub fn sync(metadata: Value) -> Self {
        Self {
            response_type: ResponseType::Sync,
            status: "Success".into(),
            status_code: 200,
            metadata,
            ..Default::default()
        }
    }

    /// An error response
    pub fn error(error_code: u16, message: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::Error,
            error: message.into(),
            error_code,
            ..Default::default()
        }
    }

    /// The canonical LXD 404 response
    pub fn not_found() -> Self {
        Self::error(404, "Not Found")
    }

    pub fn is_error(&self) -> bool {
        self.response_type == ResponseType::Error
    }
}

// =============================================================================
// LXD API Port
// =============================================================================

/// Port for the LXD REST API
///
/// Implementations own endpoint selection, TLS and request logging. Every
/// method is a single round trip from the reconciler's point of view.
#[async_trait]
pub trait LxdApi: Send + Sync {
    /// Register the client certificate with the server using a trust password
    async fn authenticate(&self, trust_password: &str) -> Result<()>;

    /// Read a resource. Error responses whose code is listed in
    /// `not_found_codes` are returned as-is instead of failing.
    async fn get(&self, path: &str, not_found_codes: &[u16]) -> Result<ApiResponse>;

    /// Issue a state-changing request
    async fn send(&self, method: HttpMethod, path: &str, body: Option<&Value>)
        -> Result<ApiResponse>;

    /// Recorded request/response pairs, when request logging is enabled
    fn logs(&self) -> Vec<Value> {
        Vec::new()
    }
}

pub type LxdApiRef = Arc<dyn LxdApi>;
