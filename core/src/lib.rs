//! Blocking HTTP client for talking to heterogeneous REST services.
//!
//! # Overview
//! One `HttpClient` handle issues `get`/`post` calls against arbitrary
//! absolute URLs with caller-supplied headers and raw bodies. Any HTTP
//! status is a successful `HttpResponse`; only transport failures become a
//! `ClientError`.
//!
//! # Design
//! - `HttpClient` owns its connection pool and runtime. There is no global
//!   instance; each caller holds its own handle.
//! - Requests are built and validated (`build_*`) before any I/O, then
//!   executed. Construction never touches the network.
//! - Every transport error is classified into one `ClientError` variant
//!   carrying the URL and a readable cause.
//!
//! ```no_run
//! use privacy_http::HttpClient;
//!
//! let client = HttpClient::with_defaults()?;
//! let response = client.get(
//!     "https://api.openai.com/v1/models",
//!     &[("Authorization", "Bearer sk-...")],
//! )?;
//! println!("{} {}", response.status, response.text());
//! # Ok::<(), privacy_http::ClientError>(())
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;

pub use client::HttpClient;
pub use config::ClientConfig;
pub use error::ClientError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use tokio_util::sync::CancellationToken;
