//! Pure derivation of what each story list shows.
//!
//! Nothing here touches the network or the session store. Every icon
//! decision is a function of the session state and story id membership;
//! the interface never feeds state back in.

use crate::api::{Story, StoryId};
use crate::state::{SessionState, StoryCache};
use std::collections::HashSet;

/// Which story list is being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Home,
    Favorites,
    MyStories,
}

impl ListKind {
    pub const ALL: [ListKind; 3] = [ListKind::Home, ListKind::Favorites, ListKind::MyStories];

    pub fn title(self) -> &'static str {
        match self {
            ListKind::Home => "All Stories",
            ListKind::Favorites => "Favorites",
            ListKind::MyStories => "My Stories",
        }
    }
}

/// One renderable row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDescriptor {
    pub id: StoryId,
    pub title: String,
    pub url: String,
    pub author: String,
    pub submitted_by: String,
    pub host_label: String,
    /// Stars need an identity; anonymous users never see one.
    pub show_favorite_icon: bool,
    pub favorite_icon_filled: bool,
    /// Delete is only offered in the owner's own list.
    pub show_delete_icon: bool,
    /// A favorite or delete request for this story is still outstanding;
    /// its controls are disabled until it settles.
    pub busy: bool,
}

/// Placeholder shown instead of an empty personal list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyState {
    pub message: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedList {
    pub kind: ListKind,
    pub items: Vec<ItemDescriptor>,
    pub empty: Option<EmptyState>,
}

/// Build the rows for `kind`.
///
/// Favorites come from the identity's favorite payloads. My Stories follows
/// the own-list order and takes payloads from the memoized own stories,
/// falling back to the cache; ids with no known payload are skipped.
pub fn reconcile(
    session: &SessionState,
    cache: &StoryCache,
    kind: ListKind,
    pending: &HashSet<StoryId>,
) -> RenderedList {
    let identity = session.identity();

    let stories: Vec<&Story> = match (kind, identity) {
        (ListKind::Home, _) => cache.iter().collect(),
        (ListKind::Favorites, Some(identity)) => identity.favorites().iter().collect(),
        (ListKind::MyStories, Some(identity)) => identity
            .own_story_ids()
            .iter()
            .filter_map(|id| {
                identity
                    .own_stories()
                    .and_then(|own| own.iter().find(|s| s.story_id == *id))
                    .or_else(|| cache.by_id(id))
            })
            .collect(),
        (_, None) => Vec::new(),
    };

    let items: Vec<ItemDescriptor> = stories
        .into_iter()
        .map(|story| ItemDescriptor {
            id: story.story_id.clone(),
            title: story.title.clone(),
            url: story.url.clone(),
            author: story.author.clone(),
            submitted_by: story.username.clone(),
            host_label: host_label(&story.url).to_string(),
            show_favorite_icon: identity.is_some(),
            favorite_icon_filled: identity.is_some_and(|i| i.is_favorite(&story.story_id)),
            show_delete_icon: kind == ListKind::MyStories,
            busy: pending.contains(&story.story_id),
        })
        .collect();

    let empty = match kind {
        _ if !items.is_empty() => None,
        ListKind::Home => None,
        ListKind::Favorites => Some(EmptyState {
            message: "You don't have any Favorites yet!",
        }),
        ListKind::MyStories => Some(EmptyState {
            message: "You don't have any stories yet!",
        }),
    };

    RenderedList { kind, items, empty }
}

/// Host part of a story URL with any leading `www.` removed.
///
/// `https://www.example.com/a` and `example.com/a` both give `example.com`.
pub fn host_label(url: &str) -> &str {
    let rest = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url.strip_prefix("//").unwrap_or(url),
    };
    let host = rest.split('/').next().unwrap_or(rest);
    host.strip_prefix("www.").unwrap_or(host)
}

/// Profile panel contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileView {
    pub name: String,
    pub username: String,
    /// Account creation date, e.g. `Mon Jan 01 2024`.
    pub account_created: String,
}

pub fn profile(session: &SessionState) -> Option<ProfileView> {
    session.identity().map(|identity| ProfileView {
        name: identity.name().to_string(),
        username: identity.username().to_string(),
        account_created: identity.created_at().format("%a %b %d %Y").to_string(),
    })
}
