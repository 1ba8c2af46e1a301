//! In-process story service for router tests.
//!
//! `FakeApi` keeps users, tokens and stories in memory and behaves like the
//! REST service: tokens are checked, deletes require ownership, favorite
//! calls return the updated user record. Failures can be injected per
//! operation.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use secrecy::{ExposeSecret, SecretString};
use snooze::api::{ApiError, AuthGrant, NewStory, Story, StoryApi, StoryId, UserRecord};
use snooze::router::{AppEvent, Router};
use snooze::storage::MemorySessionStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Authenticate,
    CreateAccount,
    ResolveSession,
    ListStories,
    CreateStory,
    DeleteStory,
    AddFavorite,
    RemoveFavorite,
}

struct User {
    password: String,
    name: String,
    created_at: DateTime<Utc>,
    favorites: Vec<StoryId>,
    stories: Vec<StoryId>,
}

#[derive(Default)]
struct State {
    users: HashMap<String, User>,
    tokens: HashMap<String, String>,
    /// Newest first.
    stories: Vec<Story>,
    failures: HashMap<Op, ApiError>,
    /// Favorite calls succeed but the returned record ignores the change.
    ignore_favorite_changes: bool,
    next_id: u32,
    calls: Vec<Op>,
}

#[derive(Default)]
pub struct FakeApi {
    state: Mutex<State>,
}

pub fn timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, username: &str, password: &str, name: &str) {
        self.state.lock().unwrap().users.insert(
            username.to_string(),
            User {
                password: password.to_string(),
                name: name.to_string(),
                created_at: timestamp(),
                favorites: Vec::new(),
                stories: Vec::new(),
            },
        );
    }

    /// Add a story to the end of the feed (oldest position).
    pub fn seed_story(&self, id: &str, title: &str, owner: &str) {
        let mut state = self.state.lock().unwrap();
        state.stories.push(Story {
            story_id: id.to_string(),
            title: title.to_string(),
            author: format!("{owner} (author)"),
            url: format!("https://www.example.com/{id}"),
            username: owner.to_string(),
            created_at: timestamp(),
        });
        if let Some(user) = state.users.get_mut(owner) {
            user.stories.push(id.to_string());
        }
    }

    pub fn seed_favorite(&self, username: &str, story_id: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state.users.get_mut(username) {
            user.favorites.push(story_id.to_string());
        }
    }

    /// A valid token for `username`, as a previous login would have saved.
    pub fn issue_token(&self, username: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let token = format!("token-{username}-{}", state.next_id);
        state.tokens.insert(token.clone(), username.to_string());
        token
    }

    /// The next call to `op` fails with `error`.
    pub fn fail_next(&self, op: Op, error: ApiError) {
        self.state.lock().unwrap().failures.insert(op, error);
    }

    pub fn ignore_favorite_changes(&self) {
        self.state.lock().unwrap().ignore_favorite_changes = true;
    }

    pub fn favorites_of(&self, username: &str) -> Vec<StoryId> {
        let state = self.state.lock().unwrap();
        state.users[username].favorites.clone()
    }

    pub fn story_ids(&self) -> Vec<StoryId> {
        let state = self.state.lock().unwrap();
        state.stories.iter().map(|s| s.story_id.clone()).collect()
    }

    pub fn calls(&self, op: Op) -> usize {
        let state = self.state.lock().unwrap();
        state.calls.iter().filter(|c| **c == op).count()
    }
}

impl State {
    fn enter(&mut self, op: Op) -> Result<(), ApiError> {
        self.calls.push(op);
        match self.failures.remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn owner_of(&self, token: &SecretString) -> Result<String, ApiError> {
        self.tokens
            .get(token.expose_secret())
            .cloned()
            .ok_or(ApiError::Auth)
    }

    fn story(&self, id: &str) -> Option<&Story> {
        self.stories.iter().find(|s| s.story_id == id)
    }

    fn record(&self, username: &str) -> UserRecord {
        let user = &self.users[username];
        let payloads = |ids: &[StoryId]| -> Vec<Story> {
            ids.iter().filter_map(|id| self.story(id).cloned()).collect()
        };
        UserRecord {
            username: username.to_string(),
            name: user.name.clone(),
            created_at: user.created_at,
            favorites: payloads(&user.favorites),
            stories: payloads(&user.stories),
        }
    }

    fn grant(&mut self, username: &str) -> AuthGrant {
        self.next_id += 1;
        let token = format!("token-{username}-{}", self.next_id);
        self.tokens.insert(token.clone(), username.to_string());
        AuthGrant {
            user: self.record(username),
            token: SecretString::from(token),
        }
    }

    fn set_favorite(
        &mut self,
        token: &SecretString,
        username: &str,
        story_id: &str,
        add: bool,
    ) -> Result<UserRecord, ApiError> {
        if self.owner_of(token)? != username {
            return Err(ApiError::Authz);
        }
        if self.story(story_id).is_none() {
            return Err(ApiError::NotFound);
        }
        if !self.ignore_favorite_changes {
            let Some(user) = self.users.get_mut(username) else {
                return Err(ApiError::NotFound);
            };
            user.favorites.retain(|id| id != story_id);
            if add {
                user.favorites.insert(0, story_id.to_string());
            }
        }
        Ok(self.record(username))
    }
}

impl StoryApi for FakeApi {
    async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<AuthGrant, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Op::Authenticate)?;
        let valid = state
            .users
            .get(username)
            .is_some_and(|user| user.password == password.expose_secret());
        if !valid {
            return Err(ApiError::Auth);
        }
        Ok(state.grant(username))
    }

    async fn create_account(
        &self,
        username: &str,
        password: &SecretString,
        name: &str,
    ) -> Result<AuthGrant, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Op::CreateAccount)?;
        if state.users.contains_key(username) {
            return Err(ApiError::Validation(format!(
                "There is already a user with username '{username}'."
            )));
        }
        state.users.insert(
            username.to_string(),
            User {
                password: password.expose_secret().to_string(),
                name: name.to_string(),
                created_at: timestamp(),
                favorites: Vec::new(),
                stories: Vec::new(),
            },
        );
        Ok(state.grant(username))
    }

    async fn resolve_session(
        &self,
        token: &SecretString,
        username: &str,
    ) -> Result<UserRecord, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Op::ResolveSession)?;
        if state.owner_of(token)? != username {
            return Err(ApiError::Auth);
        }
        Ok(state.record(username))
    }

    async fn list_stories(&self) -> Result<Vec<Story>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Op::ListStories)?;
        Ok(state.stories.clone())
    }

    async fn create_story(
        &self,
        token: &SecretString,
        story: &NewStory,
    ) -> Result<Story, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Op::CreateStory)?;
        let username = state.owner_of(token)?;
        state.next_id += 1;
        let created = Story {
            story_id: format!("new-{}", state.next_id),
            title: story.title.clone(),
            author: story.author.clone(),
            url: story.url.clone(),
            username: username.clone(),
            created_at: timestamp(),
        };
        state.stories.insert(0, created.clone());
        if let Some(user) = state.users.get_mut(&username) {
            user.stories.insert(0, created.story_id.clone());
        }
        Ok(created)
    }

    async fn delete_story(&self, token: &SecretString, story_id: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Op::DeleteStory)?;
        let username = state.owner_of(token)?;
        match state.story(story_id) {
            None => return Err(ApiError::NotFound),
            Some(story) if story.username != username => return Err(ApiError::Authz),
            Some(_) => {}
        }
        state.stories.retain(|s| s.story_id != story_id);
        for user in state.users.values_mut() {
            user.favorites.retain(|id| id != story_id);
            user.stories.retain(|id| id != story_id);
        }
        Ok(())
    }

    async fn add_favorite(
        &self,
        token: &SecretString,
        username: &str,
        story_id: &str,
    ) -> Result<UserRecord, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Op::AddFavorite)?;
        state.set_favorite(token, username, story_id, true)
    }

    async fn remove_favorite(
        &self,
        token: &SecretString,
        username: &str,
        story_id: &str,
    ) -> Result<UserRecord, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Op::RemoveFavorite)?;
        state.set_favorite(token, username, story_id, false)
    }
}

pub type TestRouter = Router<FakeApi, MemorySessionStore>;

/// Fake service with two users and three stories (`s1` newest).
///
/// `ada` owns `s1` and `s3`, `bob` owns `s2`.
pub fn seeded_api() -> Arc<FakeApi> {
    let api = FakeApi::new();
    api.add_user("ada", "lovelace", "Ada Lovelace");
    api.add_user("bob", "builder", "Bob");
    api.seed_story("s1", "Rust 2024 edition", "ada");
    api.seed_story("s2", "Async in depth", "bob");
    api.seed_story("s3", "Terminal UIs", "ada");
    Arc::new(api)
}

pub async fn started(
    api: &Arc<FakeApi>,
    store: MemorySessionStore,
) -> (TestRouter, mpsc::Receiver<AppEvent>) {
    let (tx, rx) = mpsc::channel(32);
    let mut router = Router::new(Arc::clone(api), store, tx);
    router.start().await;
    (router, rx)
}

/// Apply completions until no request is outstanding.
pub async fn settle(router: &mut TestRouter, rx: &mut mpsc::Receiver<AppEvent>) {
    while !router.is_idle() {
        let event = rx.recv().await.expect("event channel closed");
        router.apply(event);
    }
}

/// Start with `ada` logged in through the router.
pub async fn logged_in(api: &Arc<FakeApi>) -> (TestRouter, mpsc::Receiver<AppEvent>) {
    let (mut router, mut rx) = started(api, MemorySessionStore::new()).await;
    router
        .dispatch(snooze::router::UiEvent::Login {
            username: "ada".into(),
            password: SecretString::from("lovelace".to_string()),
        })
        .unwrap();
    settle(&mut router, &mut rx).await;
    router.take_notice();
    (router, rx)
}

/// Receive `count` completions and apply those matching `first` before the
/// rest, as if the server had answered in that order.
pub async fn apply_reordered(
    router: &mut TestRouter,
    rx: &mut mpsc::Receiver<AppEvent>,
    count: usize,
    first: impl Fn(&AppEvent) -> bool,
) {
    let mut events = Vec::with_capacity(count);
    for _ in 0..count {
        events.push(rx.recv().await.expect("event channel closed"));
    }
    let (early, late): (Vec<_>, Vec<_>) = events.into_iter().partition(|e| first(e));
    for event in early.into_iter().chain(late) {
        router.apply(event);
    }
}
