use crate::api::{ApiError, AuthGrant, NewStory, Story, StoryApi, StoryId, UserRecord};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Deleting a story that is not in the user's own list. Checked locally,
    /// before any request is made.
    #[error("You can only delete your own stories")]
    NotOwned,
}

// ============================================================================
// Identity
// ============================================================================

/// The authenticated user and their story memberships.
///
/// Favorites are held as full payloads (the server sends them with the
/// profile). Own stories are tracked by id; their payloads are fetched
/// lazily and memoized for the rest of the session.
#[derive(Debug)]
pub struct UserIdentity {
    username: String,
    name: String,
    created_at: DateTime<Utc>,
    token: SecretString,
    favorites: Vec<Story>,
    own_story_ids: Vec<StoryId>,
    own_stories: Option<Vec<Story>>,
}

impl UserIdentity {
    pub fn from_record(record: UserRecord, token: SecretString) -> Self {
        Self {
            own_story_ids: record.stories.into_iter().map(|s| s.story_id).collect(),
            username: record.username,
            name: record.name,
            created_at: record.created_at,
            token,
            favorites: record.favorites,
            own_stories: None,
        }
    }

    pub fn from_grant(grant: AuthGrant) -> Self {
        Self::from_record(grant.user, grant.token)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    /// Snapshot of what a background request needs to act for this user.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            token: SecretString::from(self.token.expose_secret().to_string()),
        }
    }

    pub fn favorites(&self) -> &[Story] {
        &self.favorites
    }

    pub fn is_favorite(&self, story_id: &str) -> bool {
        self.favorites.iter().any(|s| s.story_id == story_id)
    }

    pub fn own_story_ids(&self) -> &[StoryId] {
        &self.own_story_ids
    }

    pub fn owns(&self, story_id: &str) -> bool {
        self.own_story_ids.iter().any(|id| id == story_id)
    }

    pub fn ensure_owns(&self, story_id: &str) -> Result<(), SessionError> {
        if self.owns(story_id) {
            Ok(())
        } else {
            Err(SessionError::NotOwned)
        }
    }

    /// Memoized own-story payloads, `None` until first loaded.
    pub fn own_stories(&self) -> Option<&[Story]> {
        self.own_stories.as_deref()
    }

    /// Store the lazily fetched own stories. The fetched list is
    /// authoritative for the id order too.
    pub fn set_own_stories(&mut self, stories: Vec<Story>) {
        self.own_story_ids = stories.iter().map(|s| s.story_id.clone()).collect();
        self.own_stories = Some(stories);
    }

    /// Apply a confirmed favorite change.
    pub fn commit_favorite(&mut self, outcome: &FavoriteOutcome, story_id: &str) {
        match outcome {
            FavoriteOutcome::Added(story) => {
                if !self.is_favorite(&story.story_id) {
                    self.favorites.push(story.clone());
                }
            }
            FavoriteOutcome::Removed => self.favorites.retain(|s| s.story_id != story_id),
        }
    }

    /// Apply a confirmed submission.
    pub fn commit_own_story(&mut self, story: Story) {
        self.own_story_ids.retain(|id| *id != story.story_id);
        self.own_story_ids.insert(0, story.story_id.clone());
        if let Some(own) = self.own_stories.as_mut() {
            own.retain(|s| s.story_id != story.story_id);
            own.insert(0, story);
        }
    }

    /// Apply a confirmed deletion to every membership at once.
    pub fn commit_removed_story(&mut self, story_id: &str) {
        self.own_story_ids.retain(|id| id != story_id);
        if let Some(own) = self.own_stories.as_mut() {
            own.retain(|s| s.story_id != story_id);
        }
        self.favorites.retain(|s| s.story_id != story_id);
    }
}

/// Username and token, detached from the identity so a spawned request can
/// own them.
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub token: SecretString,
}

/// Exactly one of logged out or logged in.
#[derive(Debug, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated(UserIdentity),
}

impl SessionState {
    pub fn identity(&self) -> Option<&UserIdentity> {
        match self {
            SessionState::Anonymous => None,
            SessionState::Authenticated(identity) => Some(identity),
        }
    }

    pub fn identity_mut(&mut self) -> Option<&mut UserIdentity> {
        match self {
            SessionState::Anonymous => None,
            SessionState::Authenticated(identity) => Some(identity),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

/// Which branch a favorite toggle executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FavoriteOutcome {
    /// Carries the payload the server confirmed, so the favorites list never
    /// holds an id without a story behind it.
    Added(Story),
    Removed,
}

// ============================================================================
// Operations
// ============================================================================

pub async fn login<A: StoryApi>(
    api: &A,
    username: &str,
    password: &SecretString,
) -> Result<UserIdentity, SessionError> {
    let grant = api.authenticate(username, password).await?;
    tracing::info!(username = %grant.user.username, "Logged in");
    Ok(UserIdentity::from_grant(grant))
}

pub async fn signup<A: StoryApi>(
    api: &A,
    username: &str,
    password: &SecretString,
    name: &str,
) -> Result<UserIdentity, SessionError> {
    let grant = api.create_account(username, password, name).await?;
    tracing::info!(username = %grant.user.username, "Account created");
    Ok(UserIdentity::from_grant(grant))
}

/// Turn a persisted token/username pair back into a session.
///
/// Never fails: a missing half, or a token the server rejects, starts the
/// session anonymous.
pub async fn rehydrate<A: StoryApi>(
    api: &A,
    token: Option<String>,
    username: Option<String>,
) -> SessionState {
    let (Some(token), Some(username)) = (token, username) else {
        tracing::debug!("No stored session, starting anonymous");
        return SessionState::Anonymous;
    };

    let token = SecretString::from(token);
    match api.resolve_session(&token, &username).await {
        Ok(record) => {
            tracing::info!(username = %record.username, "Restored saved session");
            SessionState::Authenticated(UserIdentity::from_record(record, token))
        }
        Err(e) => {
            tracing::info!(
                username = %username,
                error = %e,
                "Saved session rejected, starting anonymous"
            );
            SessionState::Anonymous
        }
    }
}

/// Fetch full payloads for the user's own stories.
pub async fn load_own_stories<A: StoryApi>(
    api: &A,
    credentials: &Credentials,
) -> Result<Vec<Story>, SessionError> {
    let record = api
        .resolve_session(&credentials.token, &credentials.username)
        .await?;
    Ok(record.stories)
}

/// Flip the favorite state of `story_id`.
///
/// `currently_favorite` is the caller's local membership; it picks the
/// request. The outcome reports which branch ran, and is returned only if
/// the server's updated profile reflects the change.
pub async fn toggle_favorite<A: StoryApi>(
    api: &A,
    credentials: &Credentials,
    story_id: &str,
    currently_favorite: bool,
) -> Result<FavoriteOutcome, SessionError> {
    let Credentials { username, token } = credentials;

    if currently_favorite {
        let record = api.remove_favorite(token, username, story_id).await?;
        if record.favorites.iter().any(|s| s.story_id == story_id) {
            return Err(not_confirmed("favorite removal"));
        }
        Ok(FavoriteOutcome::Removed)
    } else {
        let record = api.add_favorite(token, username, story_id).await?;
        record
            .favorites
            .into_iter()
            .find(|s| s.story_id == story_id)
            .map(FavoriteOutcome::Added)
            .ok_or_else(|| not_confirmed("favorite"))
    }
}

pub async fn add_own_story<A: StoryApi>(
    api: &A,
    credentials: &Credentials,
    story: &NewStory,
) -> Result<Story, SessionError> {
    let created = api.create_story(&credentials.token, story).await?;
    tracing::info!(story_id = %created.story_id, "Story submitted");
    Ok(created)
}

/// Delete one of the user's stories. Ownership is checked by the caller
/// through [`UserIdentity::ensure_owns`] before the request is issued.
pub async fn remove_own_story<A: StoryApi>(
    api: &A,
    credentials: &Credentials,
    story_id: &str,
) -> Result<(), SessionError> {
    api.delete_story(&credentials.token, story_id).await?;
    tracing::info!(story_id, "Story deleted");
    Ok(())
}

fn not_confirmed(what: &str) -> SessionError {
    SessionError::Api(ApiError::Network(format!("{what} was not confirmed by the server")))
}
