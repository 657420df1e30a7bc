//! HTTP transport
//!
//! [`Transport`] is the seam between the client and the wire: the network
//! implementation talks to the server with reqwest, tests script replies.

use async_trait::async_trait;
use http::{Method, StatusCode};
use reqwest::Client;
use serde_json::Value;
use shared::{Actor, ApiResponse};

use crate::{ClientConfig, ClientError, ClientResult};

pub const USER_HEADER: &str = "x-user-id";
pub const TENANT_HEADER: &str = "x-tenant-id";
pub const ROLE_HEADER: &str = "x-user-role";

/// A request to the care API
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            query: Vec::new(),
            body,
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::PUT,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Raw server answer
#[derive(Debug, Clone)]
pub struct ApiReply {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl ApiReply {
    pub fn json(status: StatusCode, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string().into_bytes(),
        }
    }

    /// Unwrap the response envelope into its `data`
    pub fn into_data(self) -> ClientResult<Value> {
        let envelope: ApiResponse<Value> = serde_json::from_slice(&self.body).map_err(|e| {
            ClientError::InvalidResponse(format!("status {}: {}", self.status, e))
        })?;

        if self.status.is_success() && envelope.code.unwrap_or(0) == 0 {
            return Ok(envelope.data.unwrap_or(Value::Null));
        }
        Err(ClientError::Api {
            status: self.status.as_u16(),
            code: envelope.code.unwrap_or(0),
            message: envelope.message,
        })
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request on behalf of `actor`
    ///
    /// Failing to reach the server is an `Err`; any server answer, error
    /// envelopes included, is an `Ok` reply.
    async fn send(&self, actor: &Actor, request: &ApiRequest) -> ClientResult<ApiReply>;
}

/// Network transport over reqwest
#[derive(Debug, Clone)]
pub struct NetworkHttpClient {
    client: Client,
    base_url: String,
}

impl NetworkHttpClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for NetworkHttpClient {
    async fn send(&self, actor: &Actor, request: &ApiRequest) -> ClientResult<ApiReply> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut req = self
            .client
            .request(request.method.clone(), &url)
            .header(USER_HEADER, &actor.user_id)
            .header(TENANT_HEADER, &actor.tenant_id)
            .header(ROLE_HEADER, actor.role.as_str());
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let response = req.send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        tracing::debug!(method = %request.method, path = %request.path, status = %status, "API call");
        Ok(ApiReply { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_envelope_yields_data() {
        let reply = ApiReply::json(
            StatusCode::OK,
            &json!({"code": 0, "message": "OK", "data": {"id": "o-1"}}),
        );
        assert_eq!(reply.into_data().unwrap()["id"], "o-1");
    }

    #[test]
    fn test_error_envelope_keeps_status_and_code() {
        let reply = ApiReply::json(
            StatusCode::UNPROCESSABLE_ENTITY,
            &json!({"code": 4003, "message": "Transition prescribed -> filled is not allowed"}),
        );
        let err = reply.into_data().unwrap_err();
        assert_eq!(err.status(), Some(422));
        assert!(!err.is_network_failure());
        assert!(!err.is_definitive_absence());
    }

    #[test]
    fn test_garbage_body_is_invalid_response() {
        let reply = ApiReply {
            status: StatusCode::BAD_GATEWAY,
            body: b"<html>bad gateway</html>".to_vec(),
        };
        assert!(matches!(
            reply.into_data().unwrap_err(),
            ClientError::InvalidResponse(_)
        ));
    }
}
