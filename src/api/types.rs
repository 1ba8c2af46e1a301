use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Server-assigned story identifier. Opaque to the client.
pub type StoryId = String;

/// A submitted link as returned by the service.
///
/// Two values with the same `story_id` describe the same story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub story_id: StoryId,
    pub title: String,
    pub author: String,
    pub url: String,
    /// Username of the account that submitted the story.
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Fields of a story the user is about to submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStory {
    pub author: String,
    pub title: String,
    pub url: String,
}

/// User profile as the service reports it.
///
/// `favorites` and `stories` carry full story payloads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub username: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub favorites: Vec<Story>,
    #[serde(default)]
    pub stories: Vec<Story>,
}

/// Result of a successful login or signup.
#[derive(Debug)]
pub struct AuthGrant {
    pub user: UserRecord,
    pub token: SecretString,
}

// ============================================================================
// Wire envelopes
// ============================================================================

#[derive(Deserialize)]
pub(crate) struct AuthEnvelope {
    pub user: UserRecord,
    pub token: String,
}

#[derive(Deserialize)]
pub(crate) struct UserEnvelope {
    pub user: UserRecord,
}

#[derive(Deserialize)]
pub(crate) struct StoriesEnvelope {
    pub stories: Vec<Story>,
}

#[derive(Deserialize)]
pub(crate) struct StoryEnvelope {
    pub story: Story,
}

/// Error body: `{"error": {"status": 401, "title": "...", "message": "..."}}`.
#[derive(Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<serde_json::Value>,
    #[serde(default)]
    pub title: Option<String>,
}
