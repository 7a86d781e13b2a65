//! Application event handling.
//!
//! Applies the results of background tasks (mutation settlements and page
//! loads) to the cache on the event loop.

use crate::app::{App, AppEvent};
use crate::mutation::{MutationError, MutationService};

/// Apply one background result.
pub fn handle_app_event<S: MutationService>(app: &mut App<S>, event: AppEvent) {
    match event {
        AppEvent::MutationSettled {
            mut pending,
            result,
        } => {
            app.dispatcher.settle(&mut pending, &result);
            match &result {
                Ok(_) => {}
                Err(MutationError::Panicked(error)) => {
                    app.set_status(format!("Internal error while trying to {}", pending.kind().label()));
                    tracing::debug!(error, "Panicked mutation rolled back");
                }
                Err(e) => {
                    app.set_status(format!("Failed to {}: {} (reverted)", pending.kind().label(), e));
                }
            }
        }
        AppEvent::PageLoaded { key, after, result } => {
            app.finish_loading(&key);
            match result {
                Ok(page) => {
                    app.loader.append_page(key, after, page);
                }
                Err(error) => {
                    tracing::warn!(partition = %key, error, "Page load failed");
                    app.set_status(format!("Failed to load {key}: {error}"));
                }
            }
        }
    }
    app.needs_redraw = true;
}
