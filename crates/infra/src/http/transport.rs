use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use apiq_core::Transport;
use apiq_domain::{ApiqError, CallDescriptor, CallOutcome, ClientConfig, Failure, FailureKind, HttpMethod};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Client as ReqwestClient, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::errors::{InfraError, IntoFailure};

/// Longest slice of an error response body kept in a failure message
const ERROR_BODY_LIMIT: usize = 256;

/// JSON-over-HTTP transport backed by reqwest
///
/// The reqwest client (and its connection pool) exists only between
/// [`Transport::open`] and [`Transport::close`]. Invoking outside that
/// interval yields a terminal [`FailureKind::Unavailable`].
pub struct HttpTransport {
    api_root: String,
    headers: HeaderMap,
    user_agent: Option<String>,
    timeout: Duration,
    client: RwLock<Option<ReqwestClient>>,
}

impl HttpTransport {
    /// Start building a transport for `base_url`.
    pub fn builder(base_url: impl Into<String>) -> HttpTransportBuilder {
        HttpTransportBuilder::new(base_url)
    }

    /// Transport for the connection settings of `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiqError> {
        let mut builder = Self::builder(&config.base_url).timeout(config.timeout);
        if let Some(version) = &config.version {
            builder = builder.version(version);
        }
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent);
        }
        builder.headers(config.headers.clone()).build()
    }

    /// Base URL joined with the version segment
    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// Absolute URL for a call path
    pub fn url_for(&self, path: &str) -> String {
        if path.is_empty() {
            return self.api_root.clone();
        }
        if path.starts_with('/') {
            format!("{}{}", self.api_root, path)
        } else {
            format!("{}/{}", self.api_root, path)
        }
    }

    pub fn is_open(&self) -> bool {
        self.client.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    fn build_client(&self) -> Result<ReqwestClient, ApiqError> {
        let mut builder = ReqwestClient::builder()
            .timeout(self.timeout)
            .default_headers(self.headers.clone())
            .no_proxy();

        if let Some(agent) = &self.user_agent {
            builder = builder.user_agent(agent.as_str());
        }

        builder.build().map_err(|err| ApiqError::from(InfraError::from(err)))
    }

    fn current_client(&self) -> Option<ReqwestClient> {
        self.client.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    type Payload = Value;

    async fn invoke(&self, call: &CallDescriptor) -> CallOutcome<Value> {
        let client = self
            .current_client()
            .ok_or_else(|| Failure::unavailable("HTTP transport is not open"))?;

        let method = to_method(call.method);
        let url = self.url_for(&call.path);
        debug!(%method, %url, "sending HTTP request");

        let mut request = client.request(method.clone(), &url);
        if !call.query.is_empty() {
            request = request.query(&call.query);
        }
        if let Some(body) = &call.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(IntoFailure::into_failure)?;
        let status = response.status();
        debug!(%method, %url, %status, "received HTTP response");

        if !status.is_success() {
            let retry_after = retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(status_failure(status, &body, retry_after));
        }

        let bytes = response.bytes().await.map_err(IntoFailure::into_failure)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|err| Failure::decode(format!("invalid JSON response from {url}: {err}")))
    }

    async fn open(&self) -> Result<(), Failure> {
        let client = self
            .build_client()
            .map_err(|err| Failure::terminal(FailureKind::Other, err.to_string()))?;
        *self.client.write().unwrap_or_else(PoisonError::into_inner) = Some(client);
        info!(api_root = %self.api_root, "HTTP transport opened");
        Ok(())
    }

    async fn close(&self) {
        if self.client.write().unwrap_or_else(PoisonError::into_inner).take().is_some() {
            info!(api_root = %self.api_root, "HTTP transport closed");
        }
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("api_root", &self.api_root)
            .field("timeout", &self.timeout)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
    }
}

/// Numeric `Retry-After` in seconds; HTTP dates are ignored
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    match value.trim().parse::<u64>() {
        Ok(seconds) => Some(Duration::from_secs(seconds)),
        Err(_) => {
            warn!(retry_after = value, "ignoring non-numeric Retry-After header");
            None
        }
    }
}

fn status_failure(status: StatusCode, body: &str, retry_after: Option<Duration>) -> Failure {
    let reason = status.canonical_reason().unwrap_or("unknown status");
    let excerpt: String = body.trim().chars().take(ERROR_BODY_LIMIT).collect();
    let message = if excerpt.is_empty() {
        format!("HTTP {} {}", status.as_u16(), reason)
    } else {
        format!("HTTP {} {}: {}", status.as_u16(), reason, excerpt)
    };

    let failure = Failure::from_status(status.as_u16(), message);
    match retry_after {
        Some(delay)
            if status == StatusCode::TOO_MANY_REQUESTS
                || status == StatusCode::SERVICE_UNAVAILABLE =>
        {
            failure.with_retry_after(delay)
        }
        _ => failure,
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    base_url: String,
    version: Option<String>,
    headers: BTreeMap<String, String>,
    user_agent: Option<String>,
    timeout: Duration,
}

impl HttpTransportBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            version: None,
            headers: BTreeMap::new(),
            user_agent: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate the settings and create a closed transport
    ///
    /// # Errors
    ///
    /// [`ApiqError::Config`] for an unparsable or non-HTTP base URL or a
    /// zero timeout, [`ApiqError::InvalidInput`] for malformed headers.
    pub fn build(self) -> Result<HttpTransport, ApiqError> {
        let base = Url::parse(&self.base_url).map_err(InfraError::from)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ApiqError::Config(format!(
                "base_url must use http or https, got {}",
                base.scheme()
            )));
        }
        if self.timeout.is_zero() {
            return Err(ApiqError::Config("timeout must be greater than zero".into()));
        }

        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(InfraError::from)?;
            let value = HeaderValue::from_str(value).map_err(InfraError::from)?;
            headers.insert(name, value);
        }

        let root = self.base_url.trim_end_matches('/');
        let api_root = match self.version.as_deref().map(|v| v.trim_matches('/')) {
            Some(version) if !version.is_empty() => format!("{root}/{version}"),
            _ => root.to_string(),
        };

        Ok(HttpTransport {
            api_root,
            headers,
            user_agent: self.user_agent,
            timeout: self.timeout,
            client: RwLock::new(None),
        })
    }
}
