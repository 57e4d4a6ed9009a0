//! Per-request authentication selection

use reqwest::RequestBuilder;
use spool_core::error::SpoolError;
use spool_core::types::Credentials;

use crate::RegistryResult;

/// How a single request authenticates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    /// Send no credentials
    NoAuth,
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// `Authorization: Basic <username:password>`
    Basic { username: String, password: String },
}

/// Chooses the credentials for each request.
///
/// The decision is recomputed for every request and every retry; one logical
/// operation may read anonymously and then write with a token.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthSelector;

impl AuthSelector {
    /// Decide how to authenticate.
    ///
    /// Rules, in order: a brand-new account never authenticates; a token is
    /// always used as a bearer token; writes (and `always_auth`) require basic
    /// credentials when there is no token; everything else is anonymous.
    pub fn decide(
        credentials: &Credentials,
        is_write: bool,
        is_new_account: bool,
        always_auth: bool,
    ) -> RegistryResult<AuthDecision> {
        if is_new_account {
            return Ok(AuthDecision::NoAuth);
        }

        if let Some(token) = credentials.bearer_token() {
            return Ok(AuthDecision::Bearer(token.to_string()));
        }

        if always_auth || is_write {
            return match credentials.basic_pair() {
                Some((username, password)) => Ok(AuthDecision::Basic {
                    username: username.to_string(),
                    password: password.to_string(),
                }),
                None => Err(SpoolError::auth_required()),
            };
        }

        Ok(AuthDecision::NoAuth)
    }
}

impl AuthDecision {
    /// Attach this decision to an outgoing request
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            AuthDecision::NoAuth => request,
            AuthDecision::Bearer(token) => request.bearer_auth(token),
            AuthDecision::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            },
        }
    }

    /// Short label for logs; never includes secrets
    pub fn kind(&self) -> &'static str {
        match self {
            AuthDecision::NoAuth => "none",
            AuthDecision::Bearer(_) => "bearer",
            AuthDecision::Basic { .. } => "basic",
        }
    }
}
