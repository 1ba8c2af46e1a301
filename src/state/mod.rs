//! Client-side story state: the cache of all known stories and the login
//! session with its favorite and own-story memberships.

pub mod cache;
pub mod session;

pub use cache::StoryCache;
pub use session::{Credentials, FavoriteOutcome, SessionError, SessionState, UserIdentity};
