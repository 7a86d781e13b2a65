//! Interaction layer between user input and the mutation engine.
//!
//! # Module Structure
//!
//! - `edit_state` - per-item `Viewing` / `Editing` state machine
//! - `dismissal` - pointer listeners and click-outside-to-close overlays
//! - `card` - per-item controller tying the two to the dispatcher
//! - `events` - applies background task results to the cache
//! - `loop_runner` - event loop that runs until outstanding work settles

mod card;
mod dismissal;
mod edit_state;
mod events;
mod loop_runner;

pub use card::{CardError, ItemCard, MenuAction};
pub use dismissal::{
    DismissalController, Document, ListenerControl, ListenerHandle, NodeId, PointerDown,
    PointerListeners,
};
pub use edit_state::{EditController, EditError, EditState};
pub use events::handle_app_event;
pub use loop_runner::{run_until_idle, Exit};
