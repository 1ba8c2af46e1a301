//! Helpers for handling server-supplied strings in the terminal.
//!
//! - **Text**: control-character stripping and width-aware truncation
//! - **Links**: turning story URLs into something safe to open
//!
//! ```
//! use snooze::util::{single_line, truncate_to_width};
//!
//! let title = single_line("Breaking\nnews");
//! assert_eq!(title, "Breaking news");
//! assert_eq!(truncate_to_width(&title, 9), "Breaking…");
//! ```

mod link;
mod text;

pub use link::browser_url;
pub use text::{display_width, single_line, tail_to_width, truncate_to_width};
