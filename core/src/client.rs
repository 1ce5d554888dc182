//! The Roadie client, its builder and the shared request pipeline.
//!
//! # Design
//! `ClientBuilder` applies configuration options in call order. Each option
//! may fail; the first failure is kept, later options are skipped, and
//! `build` returns it. Once built, the only mutable state is the active
//! transport and access token, held together behind an `RwLock` so token
//! rotation can run while other threads issue requests. A request keeps the
//! transport it started with.
//!
//! Every sub-service call goes through `create_request` and `execute`:
//! serialize, attach headers, send through the transport under the caller's
//! `Context`, then decode either the success body or the `ErrorResponse`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::estimates::EstimatesService;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::shipments::ShipmentsService;
use crate::transport::{BearerTransport, Transport, UreqTransport};
use crate::types::ErrorResponse;

/// Production API host.
pub const DEFAULT_HOST: &str = "https://connect.roadie.com";
/// API version used unless overridden.
pub const DEFAULT_VERSION: &str = "v1";
/// Environment variable read by `ClientBuilder::with_env_vars` for the host.
pub const DEFAULT_HOST_ENV: &str = "ROADIE_HOST";
/// Environment variable read by `ClientBuilder::with_env_vars` for the version.
pub const DEFAULT_VERSION_ENV: &str = "ROADIE_API_VERSION";

const USER_AGENT: &str = concat!("roadie-rs/", env!("CARGO_PKG_VERSION"));

/// Client for the Roadie API.
///
/// Cheap to share: wrap it in an `Arc` and call it from any number of
/// threads. Each call blocks until the transport returns.
pub struct Client {
    host: String,
    version: String,
    custom_version: bool,
    custom_http_headers: HashMap<String, String>,
    base_transport: Arc<dyn Transport>,
    auth: RwLock<Auth>,
}

struct Auth {
    access_token: Option<String>,
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Client with the default host, version and transport.
    pub fn new() -> Result<Self> {
        ClientBuilder::new().build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// True when the version was set explicitly, even to the default value.
    pub fn has_custom_version(&self) -> bool {
        self.custom_version
    }

    pub fn access_token(&self) -> Option<String> {
        self.auth
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .access_token
            .clone()
    }

    /// Copy of the custom headers sent with every request.
    pub fn custom_http_headers(&self) -> HashMap<String, String> {
        self.custom_http_headers.clone()
    }

    /// Replaces the access token. Requests started after this returns carry
    /// the new token.
    pub fn update_access_token(&self, access_token: impl Into<String>) -> Result<()> {
        let access_token = access_token.into();
        validate_access_token(&access_token)?;

        let transport: Arc<dyn Transport> = Arc::new(BearerTransport::new(
            Arc::clone(&self.base_transport),
            access_token.clone(),
        ));
        let mut auth = self.auth.write().unwrap_or_else(PoisonError::into_inner);
        auth.access_token = Some(access_token);
        auth.transport = transport;
        info!("access token rotated");
        Ok(())
    }

    pub fn estimates(&self) -> EstimatesService<'_> {
        EstimatesService::new(self)
    }

    pub fn shipments(&self) -> ShipmentsService<'_> {
        ShipmentsService::new(self)
    }

    /// Builds a request for `{host}/{version}/{path}` with the standard and
    /// custom headers attached and `body` serialized as JSON.
    pub fn create_request<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
    ) -> Result<HttpRequest> {
        let body = body
            .map(serde_json::to_string)
            .transpose()
            .map_err(Error::Serialization)?;

        let mut request = HttpRequest {
            method,
            url: format!(
                "{}/{}/{}",
                self.host,
                self.version,
                path.trim_start_matches('/')
            ),
            headers: vec![
                ("accept".to_string(), "application/json".to_string()),
                ("user-agent".to_string(), USER_AGENT.to_string()),
            ],
            body,
        };
        if request.body.is_some() {
            request.set_header("content-type", "application/json");
        }
        for (name, value) in &self.custom_http_headers {
            request.set_header(name, value.as_str());
        }
        Ok(request)
    }

    /// Sends `request` and decodes a 2xx body into `T`.
    pub fn execute<T: DeserializeOwned>(&self, ctx: &Context, request: &HttpRequest) -> Result<T> {
        let response = self.round_trip(ctx, request)?;
        serde_json::from_str(&response.body).map_err(Error::Deserialization)
    }

    /// Sends `request` and discards a 2xx body.
    pub fn execute_empty(&self, ctx: &Context, request: &HttpRequest) -> Result<()> {
        self.round_trip(ctx, request).map(|_| ())
    }

    fn round_trip(&self, ctx: &Context, request: &HttpRequest) -> Result<HttpResponse> {
        if let Some(err) = ctx.err() {
            debug!(method = %request.method, url = %request.url, "context done before send");
            return Err(err);
        }

        let transport = Arc::clone(
            &self
                .auth
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .transport,
        );

        debug!(method = %request.method, url = %request.url, "sending request");
        let response = transport.send(ctx, request)?;
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        debug!(status = response.status, "received response");

        if response.is_success() {
            return Ok(response);
        }
        warn!(
            method = %request.method,
            url = %request.url,
            status = response.status,
            "API returned an error"
        );
        Err(api_error(response))
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.host)
            .field("version", &self.version)
            .field("custom_version", &self.custom_version)
            .field("custom_http_headers", &self.custom_http_headers)
            .field("base_transport", &self.base_transport)
            .finish_non_exhaustive()
    }
}

/// Decodes the error payload of a non-2xx response. A body that is not a
/// structured payload is kept verbatim as the single message.
fn api_error(response: HttpResponse) -> Error {
    let status = response.status;
    let payload = match serde_json::from_str::<ErrorResponse>(&response.body) {
        Ok(payload) if !payload.is_empty() => payload,
        _ if response.body.trim().is_empty() => {
            ErrorResponse::from_message(format!("HTTP {status}"))
        }
        _ => ErrorResponse::from_message(response.body),
    };
    Error::Api {
        status,
        response: payload,
    }
}

fn validate_access_token(token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(Error::Config("access token must not be empty".to_string()));
    }
    if token.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::Config(
            "access token must not contain whitespace or control characters".to_string(),
        ));
    }
    Ok(())
}

/// Builder applying configuration options to a `Client` in call order.
pub struct ClientBuilder {
    host: String,
    version: String,
    custom_version: bool,
    custom_http_headers: HashMap<String, String>,
    transport: Arc<dyn Transport>,
    access_token: Option<String>,
    error: Option<Error>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            version: DEFAULT_VERSION.to_string(),
            custom_version: false,
            custom_http_headers: HashMap::new(),
            transport: Arc::new(UreqTransport::new()),
            access_token: None,
            error: None,
        }
    }

    /// Runs one option unless an earlier option already failed.
    fn apply(mut self, option: impl FnOnce(&mut Self) -> Result<()>) -> Self {
        if self.error.is_none() {
            if let Err(err) = option(&mut self) {
                self.error = Some(err);
            }
        }
        self
    }

    /// Custom API host, e.g. a sandbox. An empty string keeps the current host.
    pub fn with_host(self, host: impl Into<String>) -> Self {
        let host = host.into();
        self.apply(move |b| b.set_host(host))
    }

    fn set_host(&mut self, host: String) -> Result<()> {
        if host.is_empty() {
            return Ok(());
        }
        if !host.starts_with("http://") && !host.starts_with("https://") {
            return Err(Error::Config(format!(
                "host must start with http:// or https://, got: {host}"
            )));
        }
        self.host = host.trim_end_matches('/').to_string();
        Ok(())
    }

    /// Custom API version. An empty string keeps the current version.
    pub fn with_version(self, version: impl Into<String>) -> Self {
        let version = version.into();
        self.apply(move |b| {
            b.set_version(version);
            Ok(())
        })
    }

    fn set_version(&mut self, version: String) {
        if version.is_empty() {
            return;
        }
        self.version = version.trim_matches('/').to_string();
        self.custom_version = true;
    }

    /// Bearer token sent as `Authorization` on every request.
    pub fn with_access_token(self, access_token: impl Into<String>) -> Self {
        let access_token = access_token.into();
        self.apply(move |b| {
            validate_access_token(&access_token)?;
            b.access_token = Some(access_token);
            Ok(())
        })
    }

    /// Replaces the transport. `None` keeps the current one.
    pub fn with_transport(self, transport: Option<Arc<dyn Transport>>) -> Self {
        self.apply(move |b| {
            if let Some(transport) = transport {
                b.transport = transport;
            }
            Ok(())
        })
    }

    /// Headers added to every request. An empty map keeps the current headers.
    pub fn with_http_headers(self, headers: HashMap<String, String>) -> Self {
        self.apply(move |b| {
            if !headers.is_empty() {
                b.custom_http_headers = headers;
            }
            Ok(())
        })
    }

    /// Reads host and version overrides from `ROADIE_HOST` and
    /// `ROADIE_API_VERSION`. Unset or empty variables change nothing.
    pub fn with_env_vars(self) -> Self {
        self.with_env_vars_named(DEFAULT_HOST_ENV, DEFAULT_VERSION_ENV)
    }

    /// Like `with_env_vars` with caller-chosen variable names.
    pub fn with_env_vars_named(self, host_var: &str, version_var: &str) -> Self {
        self.with_env_lookup(host_var, version_var, |name| std::env::var(name).ok())
    }

    fn with_env_lookup(
        self,
        host_var: &str,
        version_var: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let host = lookup(host_var).filter(|v| !v.is_empty());
        let version = lookup(version_var).filter(|v| !v.is_empty());
        self.apply(move |b| {
            if let Some(host) = host {
                b.set_host(host)?;
            }
            if let Some(version) = version {
                b.set_version(version);
            }
            Ok(())
        })
    }

    pub fn build(self) -> Result<Client> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let transport: Arc<dyn Transport> = match &self.access_token {
            Some(token) => Arc::new(BearerTransport::new(
                Arc::clone(&self.transport),
                token.clone(),
            )),
            None => Arc::clone(&self.transport),
        };
        debug!(host = %self.host, version = %self.version, "roadie client configured");

        Ok(Client {
            host: self.host,
            version: self.version,
            custom_version: self.custom_version,
            custom_http_headers: self.custom_http_headers,
            base_transport: self.transport,
            auth: RwLock::new(Auth {
                access_token: self.access_token,
                transport,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
