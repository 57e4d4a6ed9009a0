//! Registry API client for Spool
//!
//! This crate issues authenticated, retried HTTP requests against a package
//! registry and performs optimistic-concurrency mutations of registry
//! documents: publish, unpublish, dist-tags, stars and deprecations.
//!
//! Layering, leaf first:
//! - `resolver`: resolves resource paths against the registry base URL
//! - `auth`: decides per request whether and how to authenticate
//! - `retry`: exponential backoff and retryability
//! - `client`: the request engine (`RegistryClient::send`) and document reads
//! - `mutation`: the write, reconcile, rewrite protocol

pub mod api;
pub mod auth;
pub mod cache;
pub mod client;
pub mod mutation;
pub mod retry;
pub mod resolver;

// Re-export main types
pub use api::{Attachment, BinDist, DistInfo, Maintainer, RegistryDocument, VersionMetadata};
pub use auth::{AuthDecision, AuthSelector};
pub use cache::{CacheEntry, CacheStats, MetadataCache};
pub use client::{RegistryClient, RegistryConfig, RegistryResponse, RequestOptions, ResponseMeta};
pub use mutation::{MutationOutcome, PublishRequest, UnpublishOutcome};
pub use retry::{FailureKind, RetryConfig, RetryDecision, RetrySession};
pub use resolver::UrlResolver;

use spool_core::error::SpoolError;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, SpoolError>;
