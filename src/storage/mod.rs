mod session_store;

pub use session_store::{
    FileSessionStore, MemorySessionStore, SessionStore, StoreError, TOKEN_KEY, USERNAME_KEY,
};
