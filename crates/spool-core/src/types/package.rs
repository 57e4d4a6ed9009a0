//! Package name types.
//!
//! Registry package identifiers are either plain (`left-pad`) or scoped
//! (`@scope/name`).

use crate::error::{SpoolError, SpoolResult};
use std::fmt;
use std::str::FromStr;

/// Maximum package name length accepted by registries
pub const MAX_NAME_LENGTH: usize = 214;

/// A validated registry package name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageName {
    raw: String,
}

impl PackageName {
    /// Parse and validate a package name
    pub fn parse(name: &str) -> SpoolResult<Self> {
        if Self::is_valid_name(name) {
            Ok(Self {
                raw: name.to_string(),
            })
        } else {
            Err(SpoolError::InvalidRequest {
                message: format!("'{}' is not a valid package name", name),
            })
        }
    }

    /// Check if this is a valid package name
    pub fn is_valid_name(name: &str) -> bool {
        if name.is_empty() || name.len() > MAX_NAME_LENGTH || name.trim() != name {
            return false;
        }

        let basename = match name.strip_prefix('@') {
            Some(scoped) => match scoped.split_once('/') {
                Some((scope, basename)) if is_valid_part(scope) => basename,
                _ => return false,
            },
            None => name,
        };

        is_valid_part(basename)
    }

    /// Full name as given
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the name carries a `@scope/` prefix
    pub fn is_scoped(&self) -> bool {
        self.raw.starts_with('@')
    }

    /// Scope without the leading `@`
    pub fn scope(&self) -> Option<&str> {
        self.raw
            .strip_prefix('@')
            .and_then(|scoped| scoped.split_once('/'))
            .map(|(scope, _)| scope)
    }

    /// Name without its scope
    pub fn basename(&self) -> &str {
        match self.raw.rsplit_once('/') {
            Some((_, basename)) if self.is_scoped() => basename,
            _ => &self.raw,
        }
    }

    /// File name of the tarball for a version (`name-1.0.0.tgz`)
    pub fn tarball_filename(&self, version: &str) -> String {
        format!("{}-{}.tgz", self.basename(), version)
    }

    /// Key under which a version's tarball is attached to the document
    pub fn attachment_key(&self, version: &str) -> String {
        format!("{}-{}.tgz", self.raw, version)
    }

    /// Registry-relative path of a version's tarball
    pub fn tarball_path(&self, version: &str) -> String {
        format!("{}/-/{}", self.raw, self.tarball_filename(version))
    }
}

fn is_valid_part(part: &str) -> bool {
    !part.is_empty()
        && !part.starts_with('.')
        && !part.starts_with('_')
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for PackageName {
    type Err = SpoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_package_names() {
        assert!(PackageName::is_valid_name("left-pad"));
        assert!(PackageName::is_valid_name("lodash.merge"));
        assert!(PackageName::is_valid_name("@types/node"));
        assert!(PackageName::is_valid_name("@my-org/pkg_2"));

        assert!(!PackageName::is_valid_name(""));
        assert!(!PackageName::is_valid_name(".hidden"));
        assert!(!PackageName::is_valid_name("_private"));
        assert!(!PackageName::is_valid_name("has space"));
        assert!(!PackageName::is_valid_name("@scope"));
        assert!(!PackageName::is_valid_name("@/name"));
        assert!(!PackageName::is_valid_name("@scope/"));
        assert!(!PackageName::is_valid_name("a/b"));
        assert!(!PackageName::is_valid_name(&"x".repeat(MAX_NAME_LENGTH + 1)));
    }

    #[test]
    fn test_scoped_parts() {
        let name = PackageName::parse("@types/node").unwrap();
        assert!(name.is_scoped());
        assert_eq!(name.scope(), Some("types"));
        assert_eq!(name.basename(), "node");
        assert_eq!(name.tarball_filename("1.0.0"), "node-1.0.0.tgz");
        assert_eq!(name.tarball_path("1.0.0"), "@types/node/-/node-1.0.0.tgz");
        assert_eq!(name.attachment_key("1.0.0"), "@types/node-1.0.0.tgz");
    }

    #[test]
    fn test_plain_parts() {
        let name: PackageName = "left-pad".parse().unwrap();
        assert!(!name.is_scoped());
        assert_eq!(name.scope(), None);
        assert_eq!(name.basename(), "left-pad");
        assert_eq!(name.tarball_path("1.3.0"), "left-pad/-/left-pad-1.3.0.tgz");
    }

    #[test]
    fn test_parse_rejects_invalid() {
        let err = PackageName::parse("Not Valid").unwrap_err();
        assert!(matches!(err, SpoolError::InvalidRequest { .. }));
    }
}
