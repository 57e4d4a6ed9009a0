//! Request engine: authenticated, retried registry requests

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use flate2::read::GzDecoder;
use reqwest::header::{
    HeaderMap, ACCEPT, ACCEPT_ENCODING, CONTENT_ENCODING, ETAG, IF_MATCH, IF_NONE_MATCH, LOCATION,
};
use reqwest::{redirect, Client, ClientBuilder, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

use spool_core::error::SpoolError;
use spool_core::types::Credentials;

use crate::api::{RegistryDocument, WhoamiResponse};
use crate::auth::AuthSelector;
use crate::cache::{MetadataCache, DEFAULT_TTL};
use crate::resolver::UrlResolver;
use crate::retry::{FailureKind, RetryConfig, RetrySession};
use crate::RegistryResult;

/// Default public registry
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org/";

/// Reasons registries give for a stale `_rev` instead of (or alongside) 409
pub const STALE_REVISION_REASONS: &[&str] = &[
    "must supply latest _rev to update existing package",
    "Document update conflict.",
];

/// Header registries use to pass messages to the user
const NOTICE_HEADER: &str = "npm-notice";

/// Immutable client configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Registry base URL
    pub registry: String,
    /// Backoff settings for retryable failures
    pub retry: RetryConfig,
    /// Per-attempt deadline
    pub timeout: Duration,
    /// Maximum in-flight requests per host
    pub max_sockets: usize,
    /// Authenticate reads as well as writes
    pub always_auth: bool,
    /// `User-Agent` header value
    pub user_agent: String,
    /// How long cached documents are served without revalidation
    pub cache_ttl: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            registry: DEFAULT_REGISTRY.to_string(),
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(30),
            max_sockets: 50,
            always_auth: false,
            user_agent: format!("spool/{}", env!("CARGO_PKG_VERSION")),
            cache_ttl: DEFAULT_TTL,
        }
    }
}

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Credentials for this logical operation
    pub credentials: Credentials,
    /// Entity tag for a conditional request
    pub etag: Option<String>,
    /// Disable redirect following for this request
    pub no_follow: bool,
    /// Deadline override for each attempt
    pub timeout: Option<Duration>,
    /// Authenticate even if the request is a read
    pub always_auth: bool,
}

impl RequestOptions {
    pub fn new(credentials: &Credentials) -> Self {
        Self {
            credentials: credentials.clone(),
            ..Self::default()
        }
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn no_follow(mut self) -> Self {
        self.no_follow = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn always_auth(mut self) -> Self {
        self.always_auth = true;
        self
    }
}

/// Response metadata surfaced to callers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    /// `ETag` header
    pub etag: Option<String>,
    /// `npm-notice` header
    pub notice: Option<String>,
    /// `Location` header of an unfollowed redirect
    pub location: Option<String>,
}

/// A successful registry response
#[derive(Debug, Clone)]
pub struct RegistryResponse {
    /// Final URL of the request
    pub url: Url,
    /// HTTP status
    pub status: u16,
    /// Parsed JSON body; `Null` for 204 and 304
    pub body: Value,
    /// Headers of interest
    pub meta: ResponseMeta,
}

impl RegistryResponse {
    /// Whether the registry confirmed a cached entity unchanged
    pub fn is_not_modified(&self) -> bool {
        self.status == StatusCode::NOT_MODIFIED.as_u16()
    }

    /// Deserialize the body
    pub fn json<T: DeserializeOwned>(self) -> RegistryResult<T> {
        let url = self.url;
        serde_json::from_value(self.body).map_err(|e| {
            SpoolError::parse(url.as_str(), format!("unexpected response shape: {}", e), e)
        })
    }
}

/// HTTP client for registry operations.
///
/// Cheap to clone: clones share the connection pool, the per-host request
/// limits and the document cache.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    /// Client that follows redirects
    client: Client,
    /// Client for requests that must not follow redirects
    no_redirect: Client,
    config: Arc<RegistryConfig>,
    resolver: UrlResolver,
    permits: Arc<DashMap<String, Arc<Semaphore>>>,
    cache: Arc<MetadataCache>,
}

impl RegistryClient {
    /// Create a client for the default registry
    pub fn new() -> RegistryResult<Self> {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(config: RegistryConfig) -> RegistryResult<Self> {
        let resolver = UrlResolver::new(&config.registry)?;

        let client = Self::builder(&config)
            .redirect(redirect::Policy::limited(10))
            .build()
            .map_err(|e| SpoolError::network(format!("Failed to create HTTP client: {}", e), e))?;
        let no_redirect = Self::builder(&config)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| SpoolError::network(format!("Failed to create HTTP client: {}", e), e))?;

        Ok(Self {
            client,
            no_redirect,
            cache: Arc::new(MetadataCache::with_ttl(config.cache_ttl)),
            config: Arc::new(config),
            resolver,
            permits: Arc::new(DashMap::new()),
        })
    }

    fn builder(config: &RegistryConfig) -> ClientBuilder {
        ClientBuilder::new()
            // Connection pooling configuration
            .pool_max_idle_per_host(config.max_sockets)
            .pool_idle_timeout(Duration::from_secs(90))
            // Bodies are decoded here so a corrupt stream is a parse error
            .no_gzip()
            .user_agent(config.user_agent.clone())
    }

    /// Client configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Resolver for the configured registry
    pub fn resolver(&self) -> &UrlResolver {
        &self.resolver
    }

    /// Shared document cache
    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Issue one logical request, retrying transient failures.
    ///
    /// Authentication is decided again for every attempt. Client errors,
    /// conflicts and parse failures are returned at once.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        options: &RequestOptions,
    ) -> RegistryResult<RegistryResponse> {
        let url = self.resolver.resolve(path)?;
        let mut session = RetrySession::new(self.config.retry.clone());

        loop {
            let attempt = session.attempt();
            debug!(%method, %url, attempt, "registry request");

            let error = match self.attempt(&method, &url, path, body, options).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            match session.record_failure(FailureKind::of(&error)) {
                Some(delay) => {
                    warn!(
                        %method,
                        %url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying registry request"
                    );
                    tokio::time::sleep(delay).await;
                },
                None => return Err(error),
            }
        }
    }

    async fn attempt(
        &self,
        method: &Method,
        url: &Url,
        path: &str,
        body: Option<&Value>,
        options: &RequestOptions,
    ) -> RegistryResult<RegistryResponse> {
        let is_write =
            matches!(*method, Method::PUT | Method::POST | Method::DELETE) || body.is_some();
        let is_new_account = *method == Method::PUT && UrlResolver::is_new_account_path(path);
        let always_auth =
            options.always_auth || options.credentials.always_auth || self.config.always_auth;
        let auth = AuthSelector::decide(&options.credentials, is_write, is_new_account, always_auth)?;
        debug!(auth = auth.kind(), "selected authentication");

        let permits = self.host_permits(url);
        let _permit = permits
            .acquire()
            .await
            .map_err(|e| SpoolError::network(format!("Connection limiter closed: {}", e), e))?;

        let client = if options.no_follow {
            &self.no_redirect
        } else {
            &self.client
        };

        let mut request = client
            .request(method.clone(), url.clone())
            .header(ACCEPT_ENCODING, "gzip")
            .header(ACCEPT, "application/json")
            .timeout(options.timeout.unwrap_or(self.config.timeout));

        if let Some(etag) = &options.etag {
            let header = if matches!(*method, Method::GET | Method::HEAD) {
                IF_NONE_MATCH
            } else {
                IF_MATCH
            };
            request = request.header(header, etag.as_str());
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request = auth.apply(request);

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        let meta = response_meta(response.headers());
        let gzipped = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| v.eq_ignore_ascii_case("gzip"));

        let raw = response
            .bytes()
            .await
            .map_err(|e| transport_error(url, e))?;

        if let Some(notice) = &meta.notice {
            warn!(%url, "notice: {}", notice);
        }

        if status.as_u16() >= 400 {
            // Error pages from proxies often carry a bogus encoding header
            let bytes = if gzipped && !raw.is_empty() {
                gunzip(url, &raw).unwrap_or_else(|_| raw.to_vec())
            } else {
                raw.to_vec()
            };
            return Err(status_error(url, status, &bytes));
        }

        let bytes = if gzipped && !raw.is_empty() {
            gunzip(url, &raw)?
        } else {
            raw.to_vec()
        };

        let body = if status == StatusCode::NO_CONTENT
            || status == StatusCode::NOT_MODIFIED
            || (*method == Method::HEAD && bytes.is_empty())
            || (status.is_redirection() && options.no_follow)
        {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|e| {
                SpoolError::parse(url.as_str(), format!("invalid JSON body: {}", e), e)
            })?
        };

        debug!(%url, status = status.as_u16(), "registry response");
        Ok(RegistryResponse {
            url: url.clone(),
            status: status.as_u16(),
            body,
            meta,
        })
    }

    /// Semaphore bounding in-flight requests to one host
    fn host_permits(&self, url: &Url) -> Arc<Semaphore> {
        let host = format!(
            "{}:{}",
            url.host_str().unwrap_or_default(),
            url.port_or_known_default().unwrap_or_default()
        );
        self.permits
            .entry(host)
            .or_insert_with(|| Arc::new(Semaphore::new(self.config.max_sockets.max(1))))
            .clone()
    }

    /// Read a package document, serving fresh cache entries and revalidating
    /// stale ones with `If-None-Match`
    pub async fn get_document(
        &self,
        name: &str,
        credentials: &Credentials,
    ) -> RegistryResult<RegistryDocument> {
        if let Some(document) = self.cache.get_fresh(name) {
            debug!(package = name, "serving cached document");
            return Ok(document);
        }

        let cached = self.cache.get_for_revalidation(name);
        let mut options = RequestOptions::new(credentials);
        if let Some(etag) = cached.as_ref().and_then(|entry| entry.etag.clone()) {
            options = options.with_etag(etag);
        }

        let response = self
            .send(Method::GET, &UrlResolver::encode_package_name(name), None, &options)
            .await
            .map_err(|e| not_found_as_package(name, e))?;

        if response.is_not_modified() {
            if let Some(entry) = cached {
                debug!(package = name, "cached document revalidated");
                self.cache.touch(name);
                return Ok(entry.document);
            }
        }

        let etag = response.meta.etag.clone();
        let document: RegistryDocument = response.json()?;
        self.cache.insert(name, document.clone(), etag);
        Ok(document)
    }

    /// Read the current document for a write, bypassing every cache
    pub async fn fetch_for_write(
        &self,
        name: &str,
        credentials: &Credentials,
    ) -> RegistryResult<RegistryDocument> {
        let path = format!("{}?write=true", UrlResolver::encode_package_name(name));
        let options = RequestOptions::new(credentials).always_auth();

        self.send(Method::GET, &path, None, &options)
            .await
            .map_err(|e| not_found_as_package(name, e))?
            .json()
    }

    /// Username the registry associates with the credentials
    pub async fn whoami(&self, credentials: &Credentials) -> RegistryResult<String> {
        let options = RequestOptions::new(credentials).always_auth();
        let response = self.send(Method::GET, "-/whoami", None, &options).await?;
        let whoami: WhoamiResponse = response.json()?;
        Ok(whoami.username)
    }

    /// Tag map of a package
    pub async fn dist_tags(
        &self,
        name: &str,
        credentials: &Credentials,
    ) -> RegistryResult<std::collections::BTreeMap<String, String>> {
        Ok(self.get_document(name, credentials).await?.dist_tags)
    }
}

fn response_meta(headers: &HeaderMap) -> ResponseMeta {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    ResponseMeta {
        etag: header(ETAG.as_str()),
        notice: header(NOTICE_HEADER),
        location: header(LOCATION.as_str()),
    }
}

fn gunzip(url: &Url, raw: &[u8]) -> RegistryResult<Vec<u8>> {
    let mut decoded = Vec::new();
    GzDecoder::new(raw)
        .read_to_end(&mut decoded)
        .map_err(|e| SpoolError::parse(url.as_str(), format!("invalid gzip body: {}", e), e))?;
    Ok(decoded)
}

/// Classify a failure to get (or finish reading) a response
fn transport_error(url: &Url, error: reqwest::Error) -> SpoolError {
    if error.is_timeout() {
        SpoolError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() || error.is_redirect() || error.is_body() {
        SpoolError::network(format!("request to {} failed: {}", url, error), error)
    } else {
        debug!(%url, error = %error, "no response");
        SpoolError::NoResponse {
            url: url.to_string(),
        }
    }
}

/// Classify a response with status >= 400
fn status_error(url: &Url, status: StatusCode, bytes: &[u8]) -> SpoolError {
    let body: Option<Value> = serde_json::from_slice(bytes).ok();
    let field = |key: &str| {
        body.as_ref()
            .and_then(|b| b.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    let reason = field("reason");
    let error = field("error");

    let stale_revision = reason
        .as_deref()
        .map_or(false, |r| STALE_REVISION_REASONS.contains(&r));
    if status == StatusCode::CONFLICT || stale_revision {
        return SpoolError::Conflict {
            url: url.to_string(),
            reason: reason
                .or(error)
                .unwrap_or_else(|| "Document update conflict.".to_string()),
        };
    }

    if status == StatusCode::REQUEST_TIMEOUT {
        return SpoolError::Timeout {
            url: url.to_string(),
        };
    }

    let message = registry_message(error, reason)
        .or_else(|| {
            let text = String::from_utf8_lossy(bytes).trim().to_string();
            (!text.is_empty() && body.is_none()).then_some(text)
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

    if status.is_server_error() {
        SpoolError::Server {
            status: status.as_u16(),
            url: url.to_string(),
            message,
        }
    } else {
        SpoolError::Registry {
            status: status.as_u16(),
            code: format!("E{}", status.as_u16()),
            message,
            url: url.to_string(),
        }
    }
}

/// Registry message from a JSON error body: the machine-readable `error`
/// followed by the human-readable `reason`
fn registry_message(error: Option<String>, reason: Option<String>) -> Option<String> {
    match (error, reason) {
        (Some(error), Some(reason)) if error != reason => Some(format!("{} {}", error, reason)),
        (error, reason) => reason.or(error),
    }
}

fn not_found_as_package(name: &str, error: SpoolError) -> SpoolError {
    match error {
        SpoolError::Registry { status: 404, .. } => SpoolError::PackageNotFound {
            name: name.to_string(),
        },
        other => other,
    }
}
