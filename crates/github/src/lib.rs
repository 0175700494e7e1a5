// crates/github/src/lib.rs
//! GitHub REST API access for repolens
//!
//! Every request runs through a [`ResilientClient`](repolens_resilience::ResilientClient)
//! under the `github-api` family: the quota gate pauses calls while the
//! rate limit is exhausted, the circuit breaker sheds load during outages
//! and transient failures are retried with backoff.

mod client;
mod error;
mod failure;
mod models;
mod rate_limit;

pub use client::{Credentials, GithubClient, GithubConfig, GITHUB_API_FAMILY};
pub use error::{GithubError, GithubResult};
pub use failure::{raw_from_reqwest, raw_from_response};
pub use models::{ContentEntry, ContentKind, Owner, RepositoryInfo};
pub use rate_limit::snapshot_from_headers;
