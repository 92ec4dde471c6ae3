use std::fmt;
use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::Value;
use taskdesk_shared::UnassignedEncoding;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::context::RequestContext;
use crate::error::{ApiError, Failure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, PartialEq)]
pub enum Payload {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

// Form values can be passwords; print only the field names.
impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Empty => f.write_str("Empty"),
            Payload::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Payload::Form(fields) => {
                let names: Vec<&str> = fields.iter().map(|(k, _)| k.as_str()).collect();
                f.debug_tuple("Form").field(&names).finish()
            }
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub bearer: Option<String>,
    pub payload: Payload,
}

// Form payloads carry passwords and bearer carries the token; keep both out
// of logs.
impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payload = match &self.payload {
            Payload::Empty => "empty",
            Payload::Json(_) => "json",
            Payload::Form(_) => "form",
        };
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("bearer", &self.bearer.is_some())
            .field("payload", &payload)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// The API's `detail` field, flattening validation error lists into one
    /// line.
    pub fn detail(&self) -> Option<String> {
        match self.body.get("detail")? {
            Value::String(text) => Some(text.clone()),
            Value::Array(items) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .collect();
                if messages.is_empty() {
                    None
                } else {
                    Some(messages.join("; "))
                }
            }
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn failure(&self, message: impl Into<String>) -> Failure {
        Failure::new(message, self.status, self.detail())
    }

    pub fn decode<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        serde_json::from_value(self.body).map_err(|err| ApiError::Decode(err.to_string()))
    }
}

pub trait Transport {
    fn send(&self, request: ApiRequest) -> impl Future<Output = Result<ApiResponse, ApiError>>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            anyhow::bail!("api.base_url is empty");
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed building HTTP client")?;

        debug!(base_url = %base_url, timeout_secs = timeout.as_secs(), "built http transport");
        Ok(Self { client, base_url })
    }
}

impl Transport for HttpTransport {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.client.request(request.method.to_reqwest(), url.as_str());

        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        builder = match &request.payload {
            Payload::Empty => builder,
            Payload::Json(body) => builder.json(body),
            Payload::Form(fields) => builder.form(fields),
        };

        let response = builder.send().await.map_err(|err| {
            warn!(url = %url, error = %err, "request failed before a response arrived");
            ApiError::Transport(err.to_string())
        })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|err| {
            warn!(url = %url, status, error = %err, "failed reading response body");
            ApiError::Transport(err.to_string())
        })?;

        Ok(ApiResponse::new(status, parse_body(&text)))
    }
}

fn parse_body(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

#[derive(Debug, Clone)]
pub struct ApiClient<T> {
    transport: T,
    unassigned: UnassignedEncoding,
}

impl ApiClient<HttpTransport> {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(&cfg.api_base_url(), cfg.api_timeout()?)?;
        Ok(Self::new(transport).with_unassigned_encoding(cfg.unassigned_encoding()?))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            unassigned: UnassignedEncoding::default(),
        }
    }

    pub fn with_unassigned_encoding(mut self, encoding: UnassignedEncoding) -> Self {
        self.unassigned = encoding;
        self
    }

    pub fn unassigned_encoding(&self) -> UnassignedEncoding {
        self.unassigned
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// JSON call carrying the context's credential. A 401 expires the
    /// context before the error is returned.
    #[instrument(skip(self, ctx, body))]
    pub async fn send(
        &self,
        ctx: &mut RequestContext,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest {
            method,
            path: path.to_string(),
            bearer: ctx.credential().map(|credential| credential.expose().to_string()),
            payload: body.map(Payload::Json).unwrap_or(Payload::Empty),
        };

        let response = self.transport.send(request).await?;
        debug!(status = response.status, "api response");

        if response.status == 401 {
            ctx.expire();
            return Err(ApiError::Authentication);
        }

        Ok(response)
    }

    /// Form-encoded call without credentials, used by the login endpoints.
    #[instrument(skip(self, fields))]
    pub async fn send_form(
        &self,
        method: Method,
        path: &str,
        fields: Vec<(String, String)>,
    ) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest {
            method,
            path: path.to_string(),
            bearer: None,
            payload: Payload::Form(fields),
        };

        let response = self.transport.send(request).await?;
        debug!(status = response.status, "api form response");
        Ok(response)
    }
}
