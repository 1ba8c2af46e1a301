//! Interaction sequencing between user events and the remote service.
//!
//! The router owns the only copy of the session and story cache. User
//! events are decided from local state in [`Router::dispatch`], which spawns
//! the request as a background task and returns immediately. Each task
//! reports back through an [`AppEvent`]; [`Router::apply`] is the single
//! commit point, after which every list view is reconciled again. A failed
//! request commits nothing, so the rendered state never runs ahead of what
//! the server has confirmed.
//!
//! Favorite and delete requests are serialized per story id: while one is
//! outstanding the story is marked busy and a second trigger is rejected.
//! Requests for different stories run concurrently.

use crate::api::{NewStory, Story, StoryApi, StoryId};
use crate::state::session::{self, FavoriteOutcome, SessionError};
use crate::state::{SessionState, StoryCache, UserIdentity};
use crate::storage::{SessionStore, TOKEN_KEY, USERNAME_KEY};
use crate::view::{self, ListKind, ProfileView, RenderedList};
use futures::FutureExt;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("Log in first")]
    NotLoggedIn,

    #[error("Still waiting on the previous request for this story")]
    Busy(StoryId),

    #[error("A {0} request is already in progress")]
    AlreadyRunning(&'static str),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// What the user is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    List(ListKind),
    Profile,
}

/// User-triggered events.
#[derive(Debug)]
pub enum UiEvent {
    Login {
        username: String,
        password: SecretString,
    },
    Signup {
        username: String,
        password: SecretString,
        name: String,
    },
    Logout,
    Navigate(Screen),
    SubmitStory(NewStory),
    DeleteStory(StoryId),
    ToggleFavorite(StoryId),
    /// Reload the full story list.
    Refresh,
}

/// A request that has been issued and not yet settled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Task {
    Auth,
    Refresh,
    /// Keyed by user so a load left over from a previous login does not
    /// block the next user's.
    OwnStories(String),
    Submit,
    Favorite(StoryId),
    Delete(StoryId),
}

impl Task {
    fn story_id(&self) -> Option<&str> {
        match self {
            Task::Favorite(id) | Task::Delete(id) => Some(id),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Task::Auth => "login",
            Task::Refresh => "refresh",
            Task::OwnStories(_) => "own_stories",
            Task::Submit => "submit",
            Task::Favorite(_) => "favorite",
            Task::Delete(_) => "delete",
        }
    }
}

/// Completion events from background tasks.
///
/// Events that act on behalf of a user carry the username they were issued
/// for; results arriving after that user logged out are dropped.
#[derive(Debug)]
pub enum AppEvent {
    Authenticated {
        result: Result<UserIdentity, SessionError>,
    },
    StoriesLoaded {
        result: Result<Vec<Story>, SessionError>,
    },
    OwnStoriesLoaded {
        username: String,
        result: Result<Vec<Story>, SessionError>,
    },
    FavoriteToggled {
        username: String,
        story_id: StoryId,
        result: Result<FavoriteOutcome, SessionError>,
    },
    StorySubmitted {
        username: String,
        result: Result<Story, SessionError>,
    },
    StoryDeleted {
        username: String,
        story_id: StoryId,
        result: Result<(), SessionError>,
    },
    TaskPanicked {
        task: Task,
        error: String,
    },
}

impl AppEvent {
    /// The request this event completes.
    pub fn task(&self) -> Task {
        match self {
            AppEvent::Authenticated { .. } => Task::Auth,
            AppEvent::StoriesLoaded { .. } => Task::Refresh,
            AppEvent::OwnStoriesLoaded { username, .. } => Task::OwnStories(username.clone()),
            AppEvent::FavoriteToggled { story_id, .. } => Task::Favorite(story_id.clone()),
            AppEvent::StorySubmitted { .. } => Task::Submit,
            AppEvent::StoryDeleted { story_id, .. } => Task::Delete(story_id.clone()),
            AppEvent::TaskPanicked { task, .. } => task.clone(),
        }
    }
}

/// Deletes and submissions confirmed while a list load was in flight.
///
/// A load may have been answered by the server before those commits landed;
/// replaying the log over its result keeps them from being undone.
#[derive(Debug, Default)]
struct CommitLog {
    deleted: HashSet<StoryId>,
    submitted: Vec<Story>,
}

impl CommitLog {
    fn record_submit(&mut self, story: &Story) {
        self.deleted.remove(&story.story_id);
        self.submitted.push(story.clone());
    }

    fn record_delete(&mut self, story_id: &str) {
        self.submitted.retain(|s| s.story_id != story_id);
        self.deleted.insert(story_id.to_string());
    }

    fn replay(self, mut stories: Vec<Story>) -> Vec<Story> {
        stories.retain(|s| !self.deleted.contains(&s.story_id));
        for story in self.submitted {
            if !stories.iter().any(|s| s.story_id == story.story_id) {
                stories.insert(0, story);
            }
        }
        stories
    }
}

/// Message for the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub is_error: bool,
}

impl Notice {
    fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: false,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: true,
        }
    }
}

pub struct Router<A, S> {
    api: Arc<A>,
    store: S,
    session: SessionState,
    cache: StoryCache,
    screen: Screen,
    in_flight: HashSet<Task>,
    views: [RenderedList; 3],
    notice: Option<Notice>,
    /// Commits since the outstanding full reload was issued.
    refresh_log: Option<CommitLog>,
    /// Commits since the outstanding own-stories load was issued, with the
    /// user it was issued for.
    own_log: Option<(String, CommitLog)>,
    event_tx: mpsc::Sender<AppEvent>,
}

impl<A: StoryApi, S: SessionStore> Router<A, S> {
    pub fn new(api: Arc<A>, store: S, event_tx: mpsc::Sender<AppEvent>) -> Self {
        let session = SessionState::Anonymous;
        let cache = StoryCache::new();
        let in_flight = HashSet::new();
        let views =
            ListKind::ALL.map(|kind| view::reconcile(&session, &cache, kind, &HashSet::new()));
        Self {
            api,
            store,
            session,
            cache,
            screen: Screen::List(ListKind::Home),
            in_flight,
            views,
            notice: None,
            refresh_log: None,
            own_log: None,
            event_tx,
        }
    }

    /// Restore a saved session, if any, and load the story list.
    ///
    /// A saved session the server rejects silently starts anonymous.
    pub async fn start(&mut self) {
        let token = self.store.get(TOKEN_KEY);
        let username = self.store.get(USERNAME_KEY);
        self.session = session::rehydrate(&*self.api, token, username).await;

        let result = self.api.list_stories().await.map_err(SessionError::from);
        self.commit_stories(result);
        self.reconcile_all();
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn cache(&self) -> &StoryCache {
        &self.cache
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    /// Last reconciled rows for `kind`.
    pub fn view(&self, kind: ListKind) -> &RenderedList {
        &self.views[list_index(kind)]
    }

    pub fn profile(&self) -> Option<ProfileView> {
        view::profile(&self.session)
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    pub fn is_pending(&self, story_id: &str) -> bool {
        self.in_flight
            .iter()
            .any(|task| task.story_id() == Some(story_id))
    }

    /// True when no request is outstanding.
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Handle a user event.
    ///
    /// Decisions are made from local state only; any request runs in the
    /// background. Errors mean nothing was issued and nothing changed.
    pub fn dispatch(&mut self, event: UiEvent) -> Result<(), RouterError> {
        match event {
            UiEvent::Login { username, password } => {
                self.begin(Task::Auth)?;
                let api = Arc::clone(&self.api);
                self.spawn(Task::Auth, async move {
                    let result = session::login(&*api, &username, &password).await;
                    AppEvent::Authenticated { result }
                });
            }
            UiEvent::Signup {
                username,
                password,
                name,
            } => {
                self.begin(Task::Auth)?;
                let api = Arc::clone(&self.api);
                self.spawn(Task::Auth, async move {
                    let result = session::signup(&*api, &username, &password, &name).await;
                    AppEvent::Authenticated { result }
                });
            }
            UiEvent::Logout => self.logout(),
            UiEvent::Navigate(screen) => self.navigate(screen)?,
            UiEvent::Refresh => self.refresh(),
            UiEvent::SubmitStory(story) => {
                let credentials = self.identity()?.credentials();
                self.begin(Task::Submit)?;
                let api = Arc::clone(&self.api);
                self.spawn(Task::Submit, async move {
                    let result = session::add_own_story(&*api, &credentials, &story).await;
                    AppEvent::StorySubmitted {
                        username: credentials.username,
                        result,
                    }
                });
            }
            UiEvent::ToggleFavorite(story_id) => {
                let identity = self.identity()?;
                let currently_favorite = identity.is_favorite(&story_id);
                let credentials = identity.credentials();
                self.ensure_story_idle(&story_id)?;

                let task = Task::Favorite(story_id.clone());
                self.begin(task.clone())?;
                let api = Arc::clone(&self.api);
                tracing::debug!(story_id = %story_id, currently_favorite, "Toggling favorite");
                self.spawn(task, async move {
                    let result =
                        session::toggle_favorite(&*api, &credentials, &story_id, currently_favorite)
                            .await;
                    AppEvent::FavoriteToggled {
                        username: credentials.username,
                        story_id,
                        result,
                    }
                });
            }
            UiEvent::DeleteStory(story_id) => {
                let identity = self.identity()?;
                identity.ensure_owns(&story_id)?;
                let credentials = identity.credentials();
                self.ensure_story_idle(&story_id)?;

                let task = Task::Delete(story_id.clone());
                self.begin(task.clone())?;
                let api = Arc::clone(&self.api);
                self.spawn(task, async move {
                    let result = session::remove_own_story(&*api, &credentials, &story_id).await;
                    AppEvent::StoryDeleted {
                        username: credentials.username,
                        story_id,
                        result,
                    }
                });
            }
        }

        self.reconcile_all();
        Ok(())
    }

    fn identity(&self) -> Result<&UserIdentity, RouterError> {
        self.session.identity().ok_or(RouterError::NotLoggedIn)
    }

    fn ensure_story_idle(&self, story_id: &str) -> Result<(), RouterError> {
        if self.is_pending(story_id) {
            return Err(RouterError::Busy(story_id.to_string()));
        }
        Ok(())
    }

    /// Mark `task` in flight, rejecting a duplicate.
    fn begin(&mut self, task: Task) -> Result<(), RouterError> {
        if self.in_flight.contains(&task) {
            return Err(match task {
                Task::Favorite(id) | Task::Delete(id) => RouterError::Busy(id),
                other => RouterError::AlreadyRunning(other.name()),
            });
        }
        self.in_flight.insert(task);
        Ok(())
    }

    /// Run `work` in the background and deliver its event to the loop.
    ///
    /// A panicking task still delivers an event so its pending marker is
    /// released.
    fn spawn<F>(&self, task: Task, work: F)
    where
        F: Future<Output = AppEvent> + Send + 'static,
    {
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let event = match catch_task_panic(work).await {
                Ok(event) => event,
                Err(panic_msg) => {
                    tracing::error!(
                        task = task.name(),
                        error = %panic_msg,
                        "Background task panicked"
                    );
                    AppEvent::TaskPanicked {
                        task,
                        error: panic_msg,
                    }
                }
            };
            if let Err(e) = tx.send(event).await {
                tracing::warn!(error = %e, "Channel send failed (receiver dropped)");
            }
        });
    }

    fn logout(&mut self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "Failed to clear saved session");
            self.notice = Some(Notice::error(format!(
                "Logged out, but the saved session could not be removed: {e}"
            )));
        } else {
            self.notice = Some(Notice::info("Logged out"));
        }
        if let Some(identity) = self.session.identity() {
            tracing::info!(username = %identity.username(), "Logged out");
        }
        self.session = SessionState::Anonymous;
        self.screen = Screen::List(ListKind::Home);
    }

    fn navigate(&mut self, screen: Screen) -> Result<(), RouterError> {
        match screen {
            Screen::List(ListKind::Home) => {
                self.screen = screen;
                self.refresh();
            }
            Screen::List(ListKind::MyStories) => {
                let identity = self.identity()?;
                let needs_load = identity.own_stories().is_none();
                let credentials = identity.credentials();
                self.screen = screen;
                let task = Task::OwnStories(credentials.username.clone());
                if needs_load && !self.in_flight.contains(&task) {
                    self.in_flight.insert(task.clone());
                    self.own_log = Some((credentials.username.clone(), CommitLog::default()));
                    let api = Arc::clone(&self.api);
                    self.spawn(task, async move {
                        let result = session::load_own_stories(&*api, &credentials).await;
                        AppEvent::OwnStoriesLoaded {
                            username: credentials.username,
                            result,
                        }
                    });
                }
            }
            Screen::List(ListKind::Favorites) | Screen::Profile => {
                self.identity()?;
                self.screen = screen;
            }
        }
        Ok(())
    }

    fn refresh(&mut self) {
        if self.in_flight.contains(&Task::Refresh) {
            return;
        }
        self.in_flight.insert(Task::Refresh);
        self.refresh_log = Some(CommitLog::default());
        let api = Arc::clone(&self.api);
        self.spawn(Task::Refresh, async move {
            let result = api.list_stories().await.map_err(SessionError::from);
            AppEvent::StoriesLoaded { result }
        });
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Apply a completed request. This is the only place state changes in
    /// response to the server.
    pub fn apply(&mut self, event: AppEvent) {
        self.in_flight.remove(&event.task());

        match event {
            AppEvent::Authenticated { result } => self.commit_login(result),
            AppEvent::StoriesLoaded { result } => {
                let log = self.refresh_log.take().unwrap_or_default();
                self.commit_stories(result.map(|stories| log.replay(stories)));
            }
            AppEvent::OwnStoriesLoaded { username, result } => match result {
                Ok(stories) => {
                    let log = self.take_own_log(&username);
                    if let Some(identity) = self.identity_for(&username) {
                        identity.set_own_stories(log.replay(stories));
                    }
                }
                Err(e) => {
                    self.take_own_log(&username);
                    tracing::warn!(error = %e, "Failed to load own stories");
                    self.notice = Some(Notice::error(format!("Failed to load your stories: {e}")));
                }
            },
            AppEvent::FavoriteToggled {
                username,
                story_id,
                result,
            } => match result {
                Ok(outcome) => {
                    let message = match outcome {
                        FavoriteOutcome::Added(_) => "Favorite added!",
                        FavoriteOutcome::Removed => "Favorite removed!",
                    };
                    if let Some(identity) = self.identity_for(&username) {
                        identity.commit_favorite(&outcome, &story_id);
                        self.notice = Some(Notice::info(message));
                    }
                }
                Err(e) => {
                    tracing::warn!(story_id = %story_id, error = %e, "Favorite toggle failed");
                    self.notice = Some(Notice::error(format!("Failed to update favorite: {e}")));
                }
            },
            AppEvent::StorySubmitted { username, result } => match result {
                Ok(story) => {
                    if let Some(identity) = self.identity_for(&username) {
                        identity.commit_own_story(story.clone());
                        if let Some(log) = self.refresh_log.as_mut() {
                            log.record_submit(&story);
                        }
                        if let Some((_, log)) =
                            self.own_log.as_mut().filter(|(user, _)| *user == username)
                        {
                            log.record_submit(&story);
                        }
                        self.cache.prepend(story);
                        self.notice = Some(Notice::info("Story submitted"));
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Story submission failed");
                    self.notice = Some(Notice::error(format!("Failed to submit story: {e}")));
                }
            },
            AppEvent::StoryDeleted {
                username,
                story_id,
                result,
            } => match result {
                Ok(()) => {
                    // The server has already removed it, so the cache follows
                    // even if the user has since logged out.
                    self.cache.remove(&story_id);
                    if let Some(log) = self.refresh_log.as_mut() {
                        log.record_delete(&story_id);
                    }
                    if let Some((_, log)) =
                        self.own_log.as_mut().filter(|(user, _)| *user == username)
                    {
                        log.record_delete(&story_id);
                    }
                    if let Some(identity) = self.identity_for(&username) {
                        identity.commit_removed_story(&story_id);
                    }
                    self.notice = Some(Notice::info("Story deleted"));
                }
                Err(e) => {
                    tracing::warn!(story_id = %story_id, error = %e, "Story deletion failed");
                    self.notice = Some(Notice::error(format!("Failed to delete story: {e}")));
                }
            },
            AppEvent::TaskPanicked { task, error } => {
                match &task {
                    Task::Refresh => self.refresh_log = None,
                    Task::OwnStories(username) => {
                        self.take_own_log(username);
                    }
                    _ => {}
                }
                self.notice = Some(Notice::error(format!(
                    "Internal error in {} task: {error}",
                    task.name()
                )));
            }
        }

        self.reconcile_all();
    }

    /// Log for the own-stories load issued for `username`, or an empty one if
    /// a newer load has replaced it.
    fn take_own_log(&mut self, username: &str) -> CommitLog {
        match self.own_log.take() {
            Some((user, log)) if user == username => log,
            other => {
                self.own_log = other;
                CommitLog::default()
            }
        }
    }

    /// Identity for `username`, if that user is still the one logged in.
    fn identity_for(&mut self, username: &str) -> Option<&mut UserIdentity> {
        let identity = self
            .session
            .identity_mut()
            .filter(|identity| identity.username() == username);
        if identity.is_none() {
            tracing::debug!(username, "Dropping result for a session that has ended");
        }
        identity
    }

    fn commit_login(&mut self, result: Result<UserIdentity, SessionError>) {
        let identity = match result {
            Ok(identity) => identity,
            Err(e) => {
                tracing::info!(error = %e, "Login failed");
                self.notice = Some(Notice::error(format!("Login failed: {e}")));
                return;
            }
        };

        let saved = self
            .store
            .set(TOKEN_KEY, identity.token().expose_secret())
            .and_then(|()| self.store.set(USERNAME_KEY, identity.username()));
        self.notice = Some(match saved {
            Ok(()) => Notice::info(format!("Welcome, {}!", identity.username())),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to save session");
                Notice::error(format!(
                    "Logged in, but the session could not be saved: {e}"
                ))
            }
        });

        self.session = SessionState::Authenticated(identity);
        self.screen = Screen::List(ListKind::Home);
        self.refresh();
    }

    fn commit_stories(&mut self, result: Result<Vec<Story>, SessionError>) {
        match result {
            Ok(stories) => self.cache.replace_all(stories),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load stories");
                self.notice = Some(Notice::error(format!("Failed to load stories: {e}")));
            }
        }
    }

    fn reconcile_all(&mut self) {
        let pending: HashSet<StoryId> = self
            .in_flight
            .iter()
            .filter_map(|task| task.story_id().map(str::to_string))
            .collect();
        self.views = ListKind::ALL
            .map(|kind| view::reconcile(&self.session, &self.cache, kind, &pending));
    }
}

fn list_index(kind: ListKind) -> usize {
    match kind {
        ListKind::Home => 0,
        ListKind::Favorites => 1,
        ListKind::MyStories => 2,
    }
}

/// Run `future`, turning a panic into an error message.
async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic payload".to_string()
            }
        })
}
