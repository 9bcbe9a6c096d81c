use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use ecload_http::{HttpClient, HttpClientOptions, HttpRequest, HttpTransportErrorKind};
use ecload_metrics::{Counter, DurationSeries, Rate, Registry};

use crate::error::{Error, Result};

/// One logical request against the target system. `path` includes the query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub method: http::Method,
    pub path: String,
    pub body: Option<Bytes>,
    /// Label used in logs.
    pub name: Option<&'static str>,
}

impl RequestSpec {
    pub fn new(method: http::Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            name: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(http::Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(http::Method::POST, path)
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }
}

/// Result of one exchange. Transport failures are status 0 with the failure kind attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub status: u16,
    pub body: Bytes,
    pub latency: Duration,
    pub transport_error: Option<HttpTransportErrorKind>,
}

impl Exchange {
    pub fn response(status: u16, body: impl Into<Bytes>, latency: Duration) -> Self {
        Self {
            status,
            body: body.into(),
            latency,
            transport_error: None,
        }
    }

    pub fn transport_failure(kind: HttpTransportErrorKind, latency: Duration) -> Self {
        Self {
            status: 0,
            body: Bytes::new(),
            latency,
            transport_error: Some(kind),
        }
    }

    /// Status 0 or any 4xx/5xx.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == 0 || self.status >= 400
    }

    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// The system under test. Implementations never fail: every problem reaching the target is
/// encoded in the returned [`Exchange`].
#[async_trait]
pub trait Target: Send + Sync {
    async fn execute(&self, req: RequestSpec) -> Exchange;
}

#[async_trait]
impl<T: Target + ?Sized> Target for Arc<T> {
    async fn execute(&self, req: RequestSpec) -> Exchange {
        (**self).execute(req).await
    }
}

/// [`Target`] backed by a real HTTP endpoint speaking JSON.
#[derive(Debug, Clone)]
pub struct HttpTarget {
    base_url: Arc<str>,
    client: HttpClient,
}

impl HttpTarget {
    pub fn new(base_url: &str, options: HttpClientOptions) -> Result<Self> {
        let parsed =
            url::Url::parse(base_url).map_err(|_| Error::InvalidBaseUrl(base_url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host().is_none() {
            return Err(Error::InvalidBaseUrl(base_url.to_string()));
        }

        Ok(Self {
            base_url: Arc::from(base_url.trim_end_matches('/')),
            client: HttpClient::new(options),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Target for HttpTarget {
    async fn execute(&self, req: RequestSpec) -> Exchange {
        let url = format!("{}{}", self.base_url, req.path);
        let mut request = HttpRequest::new(req.method, url)
            .with_header("content-type", "application/json")
            .with_header("accept", "application/json");
        if let Some(body) = req.body {
            request = request.with_body(body);
        }

        let started = Instant::now();
        match self.client.request(request).await {
            Ok(res) => Exchange::response(res.status, res.body, started.elapsed()),
            Err(err) => {
                let kind = err.transport_error_kind();
                tracing::debug!(
                    request = req.name.unwrap_or(""),
                    path = %req.path,
                    error = %err,
                    "transport failure"
                );
                Exchange::transport_failure(kind, started.elapsed())
            }
        }
    }
}

/// Wraps a target and records exchange-level metrics for every call.
pub struct MeteredTarget<T> {
    inner: T,
    reqs: Arc<Counter>,
    duration: Arc<DurationSeries>,
    failed: Arc<Rate>,
    transport_errors: Arc<Counter>,
}

impl<T: Target> MeteredTarget<T> {
    pub fn new(inner: T, registry: &Registry) -> Result<Self> {
        Ok(Self {
            inner,
            reqs: registry.counter("http_reqs")?,
            duration: registry.duration("http_req_duration")?,
            failed: registry.rate("http_req_failed")?,
            transport_errors: registry.counter("http_transport_errors")?,
        })
    }
}

#[async_trait]
impl<T: Target> Target for MeteredTarget<T> {
    async fn execute(&self, req: RequestSpec) -> Exchange {
        let exchange = self.inner.execute(req).await;
        self.reqs.increment();
        self.duration.record_duration(exchange.latency);
        self.failed.record(exchange.is_failed());
        if exchange.transport_error.is_some() {
            self.transport_errors.increment();
        }
        exchange
    }
}
