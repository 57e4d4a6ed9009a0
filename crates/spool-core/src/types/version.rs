//! Semantic version helpers.
//!
//! Registries key documents by version strings; these helpers give them
//! semver ordering and npm-style range matching on top of the `semver` crate.

use crate::error::{SpoolError, SpoolResult};
use semver::{Version, VersionReq};

/// npm-style version range: alternatives joined by `||`, each a set of
/// comparators that must all match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    raw: String,
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    /// Check if a version satisfies any alternative of this range
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// Check a version string; unparsable versions never match
    pub fn matches_str(&self, version: &str) -> bool {
        parse_version(version)
            .map(|v| self.matches(&v))
            .unwrap_or(false)
    }

    /// The range as originally written
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Parse a version string, tolerating a leading `v` or `=`
pub fn parse_version(input: &str) -> SpoolResult<Version> {
    let trimmed = input.trim();
    let cleaned = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('='))
        .unwrap_or(trimmed);

    Version::parse(cleaned).map_err(|e| SpoolError::InvalidVersion {
        version: input.to_string(),
        reason: e.to_string(),
    })
}

/// Pick the highest version by semver precedence.
///
/// Strings that do not parse as versions are ignored unless nothing parses,
/// in which case the lexically greatest string wins.
pub fn highest_version<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let versions: Vec<&'a str> = versions.into_iter().collect();

    let best = versions
        .iter()
        .filter_map(|raw| parse_version(raw).ok().map(|parsed| (parsed, *raw)))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, raw)| raw);

    best.or_else(|| versions.iter().copied().max())
}

/// Parse an npm-style range such as `<2.0.0`, `>=1.2.0 <1.4.0`, `1.x || 2.x`
/// or `1.0.0 - 1.5.0`.
pub fn parse_range(input: &str) -> SpoolResult<VersionRange> {
    let invalid = |reason: String| SpoolError::InvalidVersion {
        version: input.to_string(),
        reason,
    };

    let mut alternatives = Vec::new();
    for alternative in input.split("||") {
        let normalized = normalize_comparators(alternative.trim());
        let req = VersionReq::parse(&normalized).map_err(|e| invalid(e.to_string()))?;
        alternatives.push(req);
    }

    if alternatives.is_empty() {
        return Err(invalid("empty range".to_string()));
    }

    Ok(VersionRange {
        raw: input.trim().to_string(),
        alternatives,
    })
}

/// Turn npm's whitespace-separated comparator syntax into the comma-separated
/// form `semver::VersionReq` expects.
fn normalize_comparators(range: &str) -> String {
    if range.is_empty() || range == "x" || range == "X" {
        return "*".to_string();
    }

    let tokens: Vec<&str> = range.split_whitespace().collect();

    // Hyphen range: "a - b" means ">=a, <=b"
    if tokens.len() == 3 && tokens[1] == "-" {
        return format!(">={}, <={}", tokens[0], tokens[2]);
    }

    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in tokens {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            pending_op = Some(token);
            continue;
        }
        match pending_op.take() {
            Some(op) => comparators.push(format!("{}{}", op, token)),
            None => comparators.push(bare_comparator(token)),
        }
    }

    comparators.join(", ")
}

/// A comparator written without an operator. npm reads a full version as an
/// exact match and `1.2` as `1.2.x`; `semver` would read both as caret.
fn bare_comparator(token: &str) -> String {
    if let Ok(version) = parse_version(token) {
        return format!("={}", version);
    }

    let parts: Vec<&str> = token.trim_start_matches('v').split('.').collect();
    if parts.len() == 2 && parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit())) {
        return format!("~{}", parts.join("."));
    }

    token.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_tolerates_prefix() {
        assert_eq!(parse_version("v1.2.3").unwrap(), Version::new(1, 2, 3));
        assert_eq!(parse_version("=1.2.3").unwrap(), Version::new(1, 2, 3));
        assert!(parse_version("1.2").is_err());
        assert!(parse_version("latest").is_err());
    }

    #[test]
    fn test_highest_version_uses_semver_order() {
        let versions = ["1.0.0", "1.5.0", "1.10.0", "1.9.9"];
        assert_eq!(highest_version(versions.iter().copied()), Some("1.10.0"));
    }

    #[test]
    fn test_highest_version_ranks_release_above_prerelease() {
        let versions = ["2.0.0-beta.1", "1.5.0", "2.0.0"];
        assert_eq!(highest_version(versions.iter().copied()), Some("2.0.0"));
    }

    #[test]
    fn test_highest_version_empty() {
        assert_eq!(highest_version(std::iter::empty()), None);
    }

    #[test]
    fn test_range_simple() {
        let range = parse_range("<2.0.0").unwrap();
        assert!(range.matches_str("1.9.9"));
        assert!(!range.matches_str("2.0.0"));
        assert!(!range.matches_str("not-a-version"));
    }

    #[test]
    fn test_range_space_separated() {
        let range = parse_range(">=1.2.0 <1.4.0").unwrap();
        assert!(range.matches_str("1.2.0"));
        assert!(range.matches_str("1.3.7"));
        assert!(!range.matches_str("1.4.0"));

        let spaced = parse_range(">= 1.2.0 < 1.4.0").unwrap();
        assert!(spaced.matches_str("1.3.0"));
    }

    #[test]
    fn test_range_alternatives_and_hyphen() {
        let range = parse_range("1.x || >=3.0.0").unwrap();
        assert!(range.matches_str("1.4.0"));
        assert!(!range.matches_str("2.0.0"));
        assert!(range.matches_str("3.1.0"));

        let hyphen = parse_range("1.0.0 - 1.5.0").unwrap();
        assert!(hyphen.matches_str("1.5.0"));
        assert!(!hyphen.matches_str("1.5.1"));
    }

    #[test]
    fn test_range_wildcard() {
        let range = parse_range("*").unwrap();
        assert!(range.matches_str("0.0.1"));
        assert!(parse_range("").unwrap().matches_str("9.9.9"));
    }

    #[test]
    fn test_bare_versions_match_like_npm() {
        let exact = parse_range("1.2.0").unwrap();
        assert!(exact.matches_str("1.2.0"));
        assert!(!exact.matches_str("1.2.1"));

        let minor = parse_range("1.2").unwrap();
        assert!(minor.matches_str("1.2.9"));
        assert!(!minor.matches_str("1.3.0"));
    }

    #[test]
    fn test_invalid_range() {
        let err = parse_range(">=banana").unwrap_err();
        assert!(matches!(err, SpoolError::InvalidVersion { .. }));
    }
}
