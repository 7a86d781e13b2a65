//! Small helpers shared by the dispatcher, the feed loader and the CLI.
//!
//! - **Tasks**: panic capture for spawned background work
//! - **Text**: width-aware one-line previews for terminal listings

mod task;
mod text;

pub use task::catch_task_panic;
pub use text::{display_width, one_line_preview};
