//! HTTP transport for the remote managers
//!
//! Each remote is described by a narrow async trait ([`HelmManagerApi`],
//! [`AddonsManagerApi`], [`LegacyAppApi`]) so backends can be driven by mocks.
//! The `Http*` implementations share [`ApiClient`], which attaches the bearer
//! token, decodes the [`Envelope`], and classifies failures.

mod addons;
mod helm;
mod legacy;

pub use addons::{AddonDetail, AddonQuery, AddonsManagerApi, HttpAddonsManager, InstallAddonRequest};
#[cfg(test)]
pub use addons::MockAddonsManagerApi;
pub use helm::{
    ChartQuery, HelmManagerApi, HttpHelmManager, InstallReleaseRequest, ReleaseDetail,
    ReleaseQuery, UpgradeReleaseRequest,
};
#[cfg(test)]
pub use helm::MockHelmManagerApi;
pub use legacy::{
    AppListQuery, ChartVersionInfo, CreateAppRequest, CreateNamespaceRequest, HttpLegacyApp,
    LegacyApp, LegacyAppApi, LegacyNamespace, UpdateAppRequest, DEFAULT_APP_PAGE_SIZE,
};
#[cfg(test)]
pub use legacy::MockLegacyAppApi;

use std::fmt;
use std::time::Duration;

use reqwest::{Client as HttpClient, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::trace;

use chartfleet_common::release::Envelope;
use chartfleet_common::{Error, Result};

/// Longest response body kept in error messages
const MAX_ERROR_BODY: usize = 512;

/// Where a remote manager lives and how to authenticate to it
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Base URL, e.g. `https://helm-manager.example.com`
    pub base_url: String,
    /// Bearer token sent with every request
    #[serde(default)]
    pub token: Option<String>,
}

impl Endpoint {
    /// Endpoint at `base_url` with no token
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
        }
    }

    /// Attach a bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Shared HTTP client for one remote manager
#[derive(Clone)]
pub struct ApiClient {
    backend: &'static str,
    base_url: String,
    http: HttpClient,
    token: Option<String>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("backend", &self.backend)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Build a client for `endpoint` with a per-request timeout
    pub fn new(backend: &'static str, endpoint: &Endpoint, timeout: Duration) -> Result<Self> {
        let base_url = endpoint.base_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::setup(
                backend,
                format!("URL must start with http:// or https://, got: {}", base_url),
            ));
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::setup(backend, e.to_string()))?;

        Ok(Self {
            backend,
            base_url,
            http,
            token: endpoint.token.clone().filter(|t| !t.is_empty()),
        })
    }

    fn url(&self, path: &str) -> String {
        let path = path.strip_prefix('/').unwrap_or(path);
        format!("{}/{}", self.base_url, path)
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// GET `path` with query parameters
    pub async fn get<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Envelope<T>> {
        let builder = self.with_auth(self.http.get(self.url(path))).query(query);
        self.send(operation, builder).await
    }

    /// POST a JSON body to `path`
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
    ) -> Result<Envelope<T>> {
        let builder = self.with_auth(self.http.post(self.url(path))).json(body);
        self.send(operation, builder).await
    }

    /// PUT a JSON body to `path`
    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
    ) -> Result<Envelope<T>> {
        let builder = self.with_auth(self.http.put(self.url(path))).json(body);
        self.send(operation, builder).await
    }

    /// DELETE `path`
    pub async fn delete<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Envelope<T>> {
        let builder = self.with_auth(self.http.delete(self.url(path))).query(query);
        self.send(operation, builder).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &str,
        builder: RequestBuilder,
    ) -> Result<Envelope<T>> {
        let response = builder
            .send()
            .await
            .map_err(|e| classify_send_error(self.backend, operation, e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transient(operation, format!("reading body: {}", e)))?;
        trace!(backend = self.backend, operation, status, "Remote call completed");
        decode_envelope(operation, status, &body)
    }
}

/// Gateway-level statuses that mean "try again", not "rejected"
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 502..=504)
}

fn classify_send_error(backend: &str, operation: &str, err: reqwest::Error) -> Error {
    if err.is_builder() {
        return Error::setup(backend, err.to_string());
    }
    Error::transient(operation, err.to_string())
}

/// Decode a response into an envelope, classifying HTTP-level failures.
///
/// 502/503/504 are transient. Any other non-2xx status is permanent; when the
/// body is itself an envelope with a non-zero code, that code is kept.
pub fn decode_envelope<T: DeserializeOwned>(
    operation: &str,
    status: u16,
    body: &str,
) -> Result<Envelope<T>> {
    if is_transient_status(status) {
        return Err(Error::transient_response(operation, status, body));
    }

    if !(200..300).contains(&status) {
        if let Ok(env) = serde_json::from_str::<Envelope<serde_json::Value>>(body) {
            if env.code != 0 {
                return Err(Error::remote(operation, env.code, env.message, env.request_id));
            }
        }
        return Err(Error::remote(
            operation,
            i64::from(status),
            truncate_body(body),
            None,
        ));
    }

    serde_json::from_str(body).map_err(|e| Error::serialization_of(operation, e.to_string()))
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Percent-encode one path segment
pub(crate) fn segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
