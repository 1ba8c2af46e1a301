//! Terminal client for a Hack or Snooze style link-sharing service.
//!
//! [`router::Router`] owns all client state and is the single place where
//! server results are committed; [`view::reconcile`] derives what each list
//! shows from that state. The [`ui`] module and the CLI in `main.rs` are thin
//! front-ends feeding it [`router::UiEvent`]s.

pub mod api;
pub mod app;
pub mod config;
pub mod router;
pub mod state;
pub mod storage;
pub mod ui;
pub mod util;
pub mod view;
