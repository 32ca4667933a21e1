//! Recording fake of the LXD API used by unit tests

use crate::domain::ports::{ApiResponse, HttpMethod, LxdApi};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

/// A call the fake received
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
}

/// Answers canned responses keyed by `(method, path)` and fails on anything else
#[derive(Default)]
pub struct FakeLxdApi {
    responses: HashMap<(HttpMethod, String), ApiResponse>,
    calls: Mutex<Vec<RecordedCall>>,
    authenticated_with: Mutex<Option<String>>,
}

impl FakeLxdApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, method: HttpMethod, path: &str, response: ApiResponse) -> Self {
        self.responses.insert((method, path.to_string()), response);
        self
    }

    pub fn on_get(self, path: &str, response: ApiResponse) -> Self {
        self.on(HttpMethod::Get, path, response)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Every call except reads
    pub fn write_calls(&self) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.method != HttpMethod::Get)
            .collect()
    }

    pub fn authenticated_with(&self) -> Option<String> {
        self.authenticated_with.lock().clone()
    }

    fn answer(&self, method: HttpMethod, path: &str, body: Option<&Value>) -> Result<ApiResponse> {
        self.calls.lock().push(RecordedCall {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });
        self.responses
            .get(&(method, path.to_string()))
            .cloned()
            .ok_or_else(|| Error::Transport(format!("unexpected call: {} {}", method, path)))
    }
}

#[async_trait]
impl LxdApi for FakeLxdApi {
    async fn authenticate(&self, trust_password: &str) -> Result<()> {
        *self.authenticated_with.lock() = Some(trust_password.to_string());
        Ok(())
    }

    async fn get(&self, path: &str, not_found_codes: &[u16]) -> Result<ApiResponse> {
        let response = self.answer(HttpMethod::Get, path, None)?;
        if response.is_error() && !not_found_codes.contains(&response.error_code) {
            return Err(Error::Api {
                status_code: response.error_code,
                message: response.error,
            });
        }
        Ok(response)
    }

    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        let response = self.answer(method, path, body)?;
        if response.is_error() {
            return Err(Error::Api {
                status_code: response.error_code,
                message: response.error,
            });
        }
        Ok(response)
    }

    fn logs(&self) -> Vec<Value> {
        self.calls()
            .into_iter()
            .map(|c| serde_json::json!({"type": "fake-request", "method": c.method, "url": c.path}))
            .collect()
    }
}
