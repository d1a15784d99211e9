//! Blocking HTTP client over a private async transport.
//!
//! # Design
//! `HttpClient` owns a `reqwest::Client` (the connection pool) and a small
//! tokio runtime that drives it. Each call is split the same way every time:
//! `build_*` validates the URL and merges headers without touching the
//! network, then `execute` performs the exchange under one deadline and
//! maps any failure through `error::classify`.
//!
//! Redirects: up to `max_redirects` hops are followed. 307/308 keep the
//! method and body; 301/302/303 turn a POST into a body-less GET. Hop
//! `max_redirects + 1` fails with `TooManyRedirects`.

use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::{classify, describe, ClientError, Limits, RedirectLimitExceeded};
use crate::http::{collect_headers, merge_headers, parse_url, HttpMethod, HttpRequest, HttpResponse};

/// Synchronous HTTP client. Safe to share across threads.
///
/// Calls block the current thread. From inside an async task they still
/// work, but they stall that task's worker until the exchange finishes.
#[derive(Debug)]
pub struct HttpClient {
    inner: reqwest::Client,
    runtime: Runtime,
    default_headers: HeaderMap,
    limits: Limits,
}

impl HttpClient {
    /// Build a client. Performs no network I/O.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let default_headers = config.validate()?;
        let limits = Limits {
            timeout: config.timeout,
            max_redirects: config.max_redirects,
        };

        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(redirect_policy(config.max_redirects))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout);
        if let Some(connect_timeout) = config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent);
        }
        let inner = builder.build().map_err(|e| {
            ClientError::ConfigurationError(format!("transport setup failed: {}", describe(&e)))
        })?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("privacy-http")
            .enable_all()
            .build()
            .map_err(|e| ClientError::ConfigurationError(format!("runtime setup failed: {e}")))?;

        tracing::debug!(
            timeout = ?config.timeout,
            max_redirects = config.max_redirects,
            default_headers = default_headers.len(),
            "http client created"
        );

        Ok(Self {
            inner,
            runtime,
            default_headers,
            limits,
        })
    }

    /// Client with every option at its default.
    pub fn with_defaults() -> Result<Self, ClientError> {
        Self::new(ClientConfig::default())
    }

    pub fn timeout(&self) -> Duration {
        self.limits.timeout
    }

    pub fn max_redirects(&self) -> usize {
        self.limits.max_redirects
    }

    pub fn build_get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpRequest, ClientError> {
        Ok(HttpRequest {
            method: HttpMethod::Get,
            url: parse_url(url)?,
            headers: merge_headers(&self.default_headers, headers)?,
            body: None,
        })
    }

    /// No content-type is added; that is up to the caller.
    pub fn build_post(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: impl Into<Bytes>,
    ) -> Result<HttpRequest, ClientError> {
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: parse_url(url)?,
            headers: merge_headers(&self.default_headers, headers)?,
            body: Some(body.into()),
        })
    }

    /// Issue a GET. Any HTTP status is a successful `HttpResponse`.
    pub fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, ClientError> {
        let request = self.build_get(url, headers)?;
        self.execute(request)
    }

    /// Issue a POST with `body` as the raw payload.
    pub fn post(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: impl Into<Bytes>,
    ) -> Result<HttpResponse, ClientError> {
        let request = self.build_post(url, headers, body)?;
        self.execute(request)
    }

    pub fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        self.execute_cancellable(request, &CancellationToken::new())
    }

    /// Like `execute`, but returns `Cancelled` as soon as `cancel` fires.
    ///
    /// The in-flight exchange is dropped on cancellation, which closes its
    /// connection instead of returning it to the pool.
    pub fn execute_cancellable(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, ClientError> {
        let url = request.url.to_string();
        let span = tracing::debug_span!(
            "http_request",
            request_id = %Uuid::new_v4(),
            method = %request.method,
            url = %url,
        );
        let timeout = self.limits.timeout;

        let call = async move {
            let started = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ClientError::Cancelled { url }),
                result = tokio::time::timeout(timeout, self.exchange(request)) => {
                    result.unwrap_or_else(|_| Err(ClientError::Timeout { url, timeout }))
                }
            };
            match &outcome {
                Ok(response) => tracing::debug!(
                    status = response.status,
                    bytes = response.body.len(),
                    elapsed = ?started.elapsed(),
                    "request completed"
                ),
                Err(err) => tracing::debug!(
                    error = %err,
                    elapsed = ?started.elapsed(),
                    "request failed"
                ),
            }
            outcome
        }
        .instrument(span);

        // `Runtime::block_on` panics on a thread that is already inside a
        // runtime context, so drive the call from a helper thread there.
        if tokio::runtime::Handle::try_current().is_ok() {
            return std::thread::scope(|scope| {
                scope.spawn(move || self.runtime.block_on(call)).join()
            })
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        }
        self.runtime.block_on(call)
    }

    async fn exchange(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let mut builder = self.inner.request(method.into(), url.clone()).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify(&url, e, self.limits))?;
        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        if response.url() != &url {
            tracing::debug!(final_url = %response.url(), "redirected");
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| classify(&url, e, self.limits))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// `previous` holds every URL visited so far, starting with the original,
/// so its length equals the number of the hop being attempted.
fn redirect_policy(max_redirects: usize) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() > max_redirects {
            return attempt.error(RedirectLimitExceeded(max_redirects));
        }
        tracing::debug!(
            status = attempt.status().as_u16(),
            location = %attempt.url(),
            hop = attempt.previous().len(),
            "following redirect"
        );
        attempt.follow()
    })
}
