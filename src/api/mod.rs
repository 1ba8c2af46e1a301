//! Remote story service.
//!
//! The rest of the crate talks to the service only through the [`StoryApi`]
//! capability set, so the router and session logic can be exercised against
//! an in-process fake. [`HttpApi`] is the production implementation for the
//! Hack or Snooze REST API.

mod client;
mod types;

pub use client::{ClientBuildError, HttpApi, DEFAULT_BASE_URL};
pub use types::{AuthGrant, NewStory, Story, StoryId, UserRecord};

use secrecy::SecretString;
use std::future::Future;
use thiserror::Error;

/// Failures reported by the remote service.
///
/// Every variant leaves local state untouched; callers surface the message
/// and the user may retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Bad credentials, or a stored token the server no longer accepts.
    #[error("Invalid username, password or session")]
    Auth,
    /// The server rejected the submitted fields.
    #[error("Rejected by server: {0}")]
    Validation(String),
    #[error("Story not found")]
    NotFound,
    /// The story exists but belongs to someone else.
    #[error("Not allowed to modify this story")]
    Authz,
    /// Transport failure, unexpected status, or a response that does not
    /// confirm the requested change.
    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(err.to_string())
    }
}

/// Capability set of the remote story service.
///
/// Methods return `Send` futures so calls can run in spawned background
/// tasks while the event loop keeps handling input.
pub trait StoryApi: Send + Sync + 'static {
    fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> impl Future<Output = Result<AuthGrant, ApiError>> + Send;

    fn create_account(
        &self,
        username: &str,
        password: &SecretString,
        name: &str,
    ) -> impl Future<Output = Result<AuthGrant, ApiError>> + Send;

    /// Resolve a persisted token/username pair back into a user record.
    fn resolve_session(
        &self,
        token: &SecretString,
        username: &str,
    ) -> impl Future<Output = Result<UserRecord, ApiError>> + Send;

    /// All stories, newest first. The server defines the order.
    fn list_stories(&self) -> impl Future<Output = Result<Vec<Story>, ApiError>> + Send;

    fn create_story(
        &self,
        token: &SecretString,
        story: &NewStory,
    ) -> impl Future<Output = Result<Story, ApiError>> + Send;

    fn delete_story(
        &self,
        token: &SecretString,
        story_id: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Returns the updated user record so the caller can check the change
    /// actually landed.
    fn add_favorite(
        &self,
        token: &SecretString,
        username: &str,
        story_id: &str,
    ) -> impl Future<Output = Result<UserRecord, ApiError>> + Send;

    fn remove_favorite(
        &self,
        token: &SecretString,
        username: &str,
        story_id: &str,
    ) -> impl Future<Output = Result<UserRecord, ApiError>> + Send;
}
