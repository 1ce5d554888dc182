//! Transports execute an `HttpRequest` and return the `HttpResponse`.
//!
//! # Design
//! `Transport` is the seam between the client and the network. The default
//! `UreqTransport` performs blocking HTTP with a one-minute timeout and hands
//! back non-2xx responses as data so the client can decode the API error
//! payload. The round trip runs on a worker thread while `send` polls the
//! caller's `Context`; a cancelled or expired context returns at once and
//! the abandoned worker ends when its own timeout fires. `BearerTransport`
//! decorates any transport with an `Authorization: Bearer` header; the
//! client swaps it out on token rotation.

use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Default timeout applied to every round trip.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How often a waiting `send` re-checks the caller's context.
const CONTEXT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Executes HTTP requests. Implementations must be safe to share between
/// threads; the client calls `send` concurrently from every caller.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Performs one round trip. Non-2xx statuses are returned as `Ok`; only
    /// failures to obtain a response are errors.
    fn send(&self, ctx: &Context, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Blocking transport backed by a `ureq` agent.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    timeout: Duration,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self { agent, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Attaches headers and caps the request timeout at `timeout`.
    fn prepare<B>(
        &self,
        builder: ureq::RequestBuilder<B>,
        request: &HttpRequest,
        timeout: Duration,
    ) -> ureq::RequestBuilder<B> {
        request
            .headers
            .iter()
            .fold(builder, |b, (name, value)| b.header(name.as_str(), value.as_str()))
            .config()
            .timeout_global(Some(timeout))
            .build()
    }
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqTransport {
    /// Performs the blocking round trip on the calling thread.
    fn round_trip(
        &self,
        request: &HttpRequest,
        timeout: Duration,
    ) -> std::result::Result<HttpResponse, ureq::Error> {
        let url = request.url.as_str();
        let body = request.body.as_deref();

        let mut response = match (request.method, body) {
            (HttpMethod::Get, _) => self.prepare(self.agent.get(url), request, timeout).call(),
            (HttpMethod::Delete, None) => {
                self.prepare(self.agent.delete(url), request, timeout).call()
            }
            (HttpMethod::Delete, Some(body)) => self
                .prepare(self.agent.delete(url).force_send_body(), request, timeout)
                .send(body.as_bytes()),
            (HttpMethod::Post, Some(body)) => {
                self.prepare(self.agent.post(url), request, timeout).send(body.as_bytes())
            }
            (HttpMethod::Post, None) => {
                self.prepare(self.agent.post(url), request, timeout).send_empty()
            }
            (HttpMethod::Put, Some(body)) => {
                self.prepare(self.agent.put(url), request, timeout).send(body.as_bytes())
            }
            (HttpMethod::Put, None) => {
                self.prepare(self.agent.put(url), request, timeout).send_empty()
            }
            (HttpMethod::Patch, Some(body)) => {
                self.prepare(self.agent.patch(url), request, timeout).send(body.as_bytes())
            }
            (HttpMethod::Patch, None) => {
                self.prepare(self.agent.patch(url), request, timeout).send_empty()
            }
        }?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.body_mut().read_to_string()?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl Transport for UreqTransport {
    /// Runs the round trip on a worker thread and waits for it, returning the
    /// context error as soon as the context is cancelled or expires. An
    /// abandoned worker finishes on its own once ureq's timeout fires.
    fn send(&self, ctx: &Context, request: &HttpRequest) -> Result<HttpResponse> {
        let (timeout, deadline_bound) = match ctx.remaining() {
            Some(remaining) if remaining <= self.timeout => (remaining, true),
            _ => (self.timeout, false),
        };

        let (tx, rx) = mpsc::sync_channel(1);
        let transport = self.clone();
        let owned = request.clone();
        thread::Builder::new()
            .name("roadie-http".to_string())
            .spawn(move || {
                let _ = tx.send(transport.round_trip(&owned, timeout));
            })
            .map_err(Error::transport)?;

        loop {
            match rx.recv_timeout(CONTEXT_POLL_INTERVAL) {
                Ok(result) => {
                    return result.map_err(|err| map_ureq_error(ctx, deadline_bound, err))
                }
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(err) = ctx.err() {
                        debug!(url = %request.url, "abandoning in-flight request: {err}");
                        return Err(err);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::Transport("HTTP worker exited without a result".into()));
                }
            }
        }
    }
}

/// A timeout caused by the caller's deadline surfaces as the context error.
/// `deadline_bound` is set when the context's remaining time, not the
/// transport's own timeout, capped the request.
fn map_ureq_error(ctx: &Context, deadline_bound: bool, err: ureq::Error) -> Error {
    if let ureq::Error::Timeout(_) = err {
        if let Some(ctx_err) = ctx.err() {
            return ctx_err;
        }
        if deadline_bound {
            return Error::DeadlineExceeded;
        }
    }
    Error::transport(err)
}

/// Injects `Authorization: Bearer <token>` into every request before
/// delegating to the wrapped transport.
#[derive(Clone)]
pub struct BearerTransport {
    inner: Arc<dyn Transport>,
    token: String,
}

impl BearerTransport {
    pub fn new(inner: Arc<dyn Transport>, token: impl Into<String>) -> Self {
        Self {
            inner,
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for BearerTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerTransport")
            .field("inner", &self.inner)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Transport for BearerTransport {
    fn send(&self, ctx: &Context, request: &HttpRequest) -> Result<HttpResponse> {
        let mut authorized = request.clone();
        authorized.set_header("authorization", format!("Bearer {}", self.token));
        self.inner.send(ctx, &authorized)
    }
}
