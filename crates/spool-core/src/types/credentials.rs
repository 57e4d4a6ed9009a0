//! Credentials attached to registry requests.

use serde::{Deserialize, Serialize};

/// Credential set for one logical operation.
///
/// A registry accepts either a bearer `token` or a `username`/`password`
/// pair; `email` is only needed when publishing with basic auth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Basic auth username
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Basic auth password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Publisher email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Authenticate reads as well as writes
    #[serde(default)]
    pub always_auth: bool,
}

impl Credentials {
    /// No credentials at all
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Bearer token credentials
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Basic auth credentials
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    /// Attach a publisher email
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Authenticate every request, reads included
    pub fn with_always_auth(mut self, always_auth: bool) -> Self {
        self.always_auth = always_auth;
        self
    }

    /// Token, if one is present and non-empty
    pub fn bearer_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    /// Username and password, if both are present and non-empty
    pub fn basic_pair(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }

    /// Whether any usable credential is present
    pub fn is_authenticated(&self) -> bool {
        self.bearer_token().is_some() || self.basic_pair().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_credentials() {
        let creds = Credentials::token("secret");
        assert_eq!(creds.bearer_token(), Some("secret"));
        assert!(creds.basic_pair().is_none());
        assert!(creds.is_authenticated());
    }

    #[test]
    fn test_basic_credentials_require_both_parts() {
        let creds = Credentials::basic("alice", "hunter2").with_email("alice@example.com");
        assert_eq!(creds.basic_pair(), Some(("alice", "hunter2")));

        let partial = Credentials {
            username: Some("alice".to_string()),
            ..Credentials::default()
        };
        assert!(partial.basic_pair().is_none());
        assert!(!partial.is_authenticated());
    }

    #[test]
    fn test_empty_token_is_ignored() {
        let creds = Credentials::token("");
        assert!(creds.bearer_token().is_none());
        assert!(!creds.is_authenticated());
    }
}
