//! Resource path resolution against the registry base URL

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use spool_core::error::SpoolError;
use url::Url;

use crate::RegistryResult;

/// Prefix of user-account document identifiers
pub const USER_PREFIX: &str = "org.couchdb.user:";

/// Path of the user-account collection
const USER_COLLECTION: &str = "-/user/";

/// Characters escaped inside an ordinary path segment. `%` is left alone so
/// resolving an already-escaped path is a no-op.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'\\')
    .add(b'^')
    .add(b'|');

/// User identifiers additionally escape `/`
const USER_SEGMENT: &AsciiSet = &SEGMENT.add(b'/');

/// Resolves registry-relative resource paths to absolute URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlResolver {
    base: Url,
}

impl UrlResolver {
    /// Create a resolver for a registry base URL.
    ///
    /// The base is normalized to end in `/` so that relative paths land under
    /// any path prefix the registry is mounted at.
    pub fn new(base: &str) -> RegistryResult<Self> {
        let invalid = |reason: String| SpoolError::InvalidUrl {
            url: base.to_string(),
            reason,
        };

        let mut url = Url::parse(base.trim()).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(invalid("registry URL must have a host".to_string()));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url.set_query(None);
        url.set_fragment(None);

        Ok(Self { base: url })
    }

    /// The normalized base URL
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve a resource path.
    ///
    /// Absolute `http(s)://` paths are returned unchanged. Relative paths are
    /// escaped segment by segment and joined with standard URL resolution:
    /// `pkg` lands under the base path, `/pkg` replaces it.
    pub fn resolve(&self, path: &str) -> RegistryResult<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Url::parse(path).map_err(|e| SpoolError::InvalidUrl {
                url: path.to_string(),
                reason: e.to_string(),
            });
        }

        let (path_part, query) = match path.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path, None),
        };

        let mut relative = escape_path(path_part);

        // "name:thing" as a first segment would parse as a URL scheme
        let first = relative.split('/').next().unwrap_or_default();
        if !relative.starts_with('/') && first.contains(':') {
            relative.insert_str(0, "./");
        }

        if let Some(query) = query {
            relative.push('?');
            relative.push_str(query);
        }

        self.base.join(&relative).map_err(|e| SpoolError::InvalidUrl {
            url: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Encode a package name for use as a single path segment.
    ///
    /// Scoped names keep their `@` but their `/` becomes `%2f`, otherwise the
    /// registry router would read the scope as a separate path component.
    pub fn encode_package_name(name: &str) -> String {
        name.replace('/', "%2f")
    }

    /// Path of a user-account document
    pub fn user_path(username: &str) -> String {
        format!("{}{}{}", USER_COLLECTION, USER_PREFIX, username)
    }

    /// Whether a path addresses a user-account document that does not exist
    /// yet: a user document with no revision attached.
    pub fn is_new_account_path(path: &str) -> bool {
        let path = if path.starts_with("http://") || path.starts_with("https://") {
            match Url::parse(path) {
                Ok(url) => url.path().to_string(),
                Err(_) => return false,
            }
        } else {
            path.split('?').next().unwrap_or_default().to_string()
        };

        let trimmed = path.trim_start_matches('/');
        let Some(identifier) = trimmed
            .find(USER_COLLECTION)
            .filter(|&at| at == 0 || trimmed[..at].ends_with('/'))
            .map(|at| &trimmed[at + USER_COLLECTION.len()..])
        else {
            return false;
        };

        identifier.starts_with(USER_PREFIX)
            && identifier.len() > USER_PREFIX.len()
            && !identifier.contains("/-rev/")
    }
}

/// Escape each segment of a path. A run of segments starting with the user
/// prefix is one identifier (up to a `-rev` segment) with its `/` escaped.
fn escape_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let mut escaped = Vec::with_capacity(segments.len());

    let mut index = 0;
    while index < segments.len() {
        let segment = segments[index];
        if segment.starts_with(USER_PREFIX) {
            let end = segments[index..]
                .iter()
                .position(|s| *s == "-rev")
                .map_or(segments.len(), |offset| index + offset);
            let identifier = segments[index..end].join("/");
            escaped.push(utf8_percent_encode(&identifier, USER_SEGMENT).to_string());
            index = end;
        } else {
            escaped.push(utf8_percent_encode(segment, SEGMENT).to_string());
            index += 1;
        }
    }

    escaped.join("/")
}
