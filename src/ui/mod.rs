//! Terminal front-end.
//!
//! - `loop_runner`: event loop and terminal setup
//! - `input`: key handling, turned into router events
//! - `render`: frame layout and overlays
//! - `form`: login, signup and submit input overlay
//! - `stories`, `profile`, `status`, `help`: widgets

mod form;
mod help;
mod input;
mod loop_runner;
mod profile;
mod render;
mod status;
mod stories;

pub use loop_runner::{run, Action};
