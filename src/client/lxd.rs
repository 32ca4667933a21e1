//! LXD REST client
//!
//! Implements [`LxdApi`] over the local unix socket (hyper, HTTP/1.1) or a
//! remote HTTPS endpoint (reqwest with the client certificate identity).

use super::config::{ClientConfig, Endpoint};
use crate::domain::ports::{ApiResponse, HttpMethod, LxdApi, ResponseType};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Reply to a certificate registration when the client is already trusted
const ALREADY_TRUSTED: &str = "Certificate already in trust store";

// =============================================================================
// Transport
// =============================================================================

#[derive(Debug)]
enum Transport {
    Unix { socket: PathBuf },
    Https { base: String, http: reqwest::Client },
}

impl Transport {
    async fn round_trip(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<(u16, Vec<u8>)> {
        match self {
            Transport::Unix { socket } => unix_round_trip(socket, method, path, body).await,
            Transport::Https { base, http } => {
                let mut request = http.request(reqwest_method(method), format!("{}{}", base, path));
                if let Some(body) = body {
                    request = request.json(body);
                }
                let response = request.send().await?;
                let status = response.status().as_u16();
                let bytes = response.bytes().await?;
                Ok((status, bytes.to_vec()))
            }
        }
    }
}

async fn unix_round_trip(
    socket: &Path,
    method: HttpMethod,
    path: &str,
    body: Option<&Value>,
) -> Result<(u16, Vec<u8>)> {
    let stream = tokio::net::UnixStream::connect(socket).await.map_err(|e| {
        Error::Transport(format!("cannot connect to {}: {}", socket.display(), e))
    })?;

    let (mut sender, connection) = hyper::client::conn::handshake(stream).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            debug!("LXD socket connection closed: {}", e);
        }
    });

    let payload = match body {
        Some(body) => hyper::Body::from(serde_json::to_vec(body)?),
        None => hyper::Body::empty(),
    };
    let request = hyper::Request::builder()
        .method(method.as_str())
        .uri(path)
        .header(hyper::header::HOST, "lxd")
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(payload)
        .map_err(|e| Error::Transport(format!("invalid request {} {}: {}", method, path, e)))?;

    let response = sender.send_request(request).await?;
    let status = response.status().as_u16();
    let bytes = hyper::body::to_bytes(response.into_body()).await?;

    Ok((status, bytes.to_vec()))
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

fn https_client(config: &ClientConfig) -> Result<reqwest::Client> {
    let (Some(cert), Some(key)) = (config.cert_path(), config.key_path()) else {
        return Err(Error::Configuration(
            "client_cert and client_key are required for https endpoints".into(),
        ));
    };

    let read = |path: &Path| {
        std::fs::read(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {}", path.display(), e))
        })
    };
    let mut pem = read(cert.as_path())?;
    pem.push(b'\n');
    pem.extend(read(key.as_path())?);

    // LXD serves a self-signed certificate unless configured otherwise.
    let client = reqwest::Client::builder()
        .identity(reqwest::Identity::from_pem(&pem)?)
        .danger_accept_invalid_certs(true)
        .build()?;
    Ok(client)
}

// =============================================================================
// LXD Client
// =============================================================================

/// Client for the LXD REST API
#[derive(Debug)]
pub struct LxdClient {
    transport: Transport,
    debug: bool,
    logs: Mutex<Vec<Value>>,
}

impl LxdClient {
    /// Create a client, picking the endpoint from `config`
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let endpoint = config.resolve_endpoint(Path::exists)?;
        Self::with_endpoint(endpoint, config)
    }

    /// Create a client for a known endpoint
    pub fn with_endpoint(endpoint: Endpoint, config: &ClientConfig) -> Result<Self> {
        let transport = match &endpoint {
            Endpoint::UnixSocket(socket) => Transport::Unix {
                socket: socket.clone(),
            },
            Endpoint::Https(base) => Transport::Https {
                base: base.clone(),
                http: https_client(config)?,
            },
        };

        info!("Using LXD endpoint {}", endpoint);

        Ok(Self {
            transport,
            debug: config.debug,
            logs: Mutex::new(Vec::new()),
        })
    }

    /// One request, parsed into an envelope
    async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        debug!("LXD request: {} {}", method, path);
        let (status, bytes) = self.transport.round_trip(method, path, body).await?;

        let parsed: Value = serde_json::from_slice(&bytes).map_err(|_| Error::Api {
            status_code: status,
            message: String::from_utf8_lossy(&bytes).trim().to_string(),
        })?;

        if self.debug {
            self.logs.lock().push(json!({
                "type": "sent request",
                "request": {"method": method, "url": path, "json": body},
                "response": {"status": status, "json": parsed},
            }));
        }

        let mut response: ApiResponse = serde_json::from_value(parsed)?;
        if response.is_error() && response.error_code == 0 {
            response.error_code = status;
        }
        Ok(response)
    }

    /// Request with LXD semantics: error envelopes fail unless their code is
    /// tolerated, async operations are waited for.
    async fn call(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
        ok_error_codes: &[u16],
    ) -> Result<ApiResponse> {
        let response = self.request(method, path, body).await?;
        let response_type = response.response_type;

        match response_type {
            ResponseType::Error if ok_error_codes.contains(&response.error_code) => Ok(response),
            ResponseType::Error => Err(Error::Api {
                status_code: response.error_code,
                message: response.error,
            }),
            ResponseType::Async => self.wait_for_operation(response).await,
            ResponseType::Sync => Ok(response),
        }
    }

    async fn wait_for_operation(&self, response: ApiResponse) -> Result<ApiResponse> {
        if response.operation.is_empty() {
            return Ok(response);
        }

        let path = format!("{}/wait", response.operation);
        let waited = self.request(HttpMethod::Get, &path, None).await?;
        if waited.is_error() {
            return Err(Error::Api {
                status_code: waited.error_code,
                message: waited.error,
            });
        }

        if waited.metadata.get("status").and_then(Value::as_str) == Some("Failure") {
            let reason = waited
                .metadata
                .get("err")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(Error::OperationFailed(reason));
        }

        Ok(waited)
    }
}

#[async_trait]
impl LxdApi for LxdClient {
    async fn authenticate(&self, trust_password: &str) -> Result<()> {
        let body = json!({"type": "client", "password": trust_password});
        match self
            .call(HttpMethod::Post, "/1.0/certificates", Some(&body), &[])
            .await
        {
            Ok(_) => Ok(()),
            Err(Error::Api { ref message, .. }) if message == ALREADY_TRUSTED => {
                debug!("Client certificate already trusted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn get(&self, path: &str, not_found_codes: &[u16]) -> Result<ApiResponse> {
        self.call(HttpMethod::Get, path, None, not_found_codes).await
    }

    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        self.call(method, path, body, &[]).await
    }

    fn logs(&self) -> Vec<Value> {
        self.logs.lock().clone()
    }
}
