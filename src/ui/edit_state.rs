//! Inline edit state for one rendered item.
//!
//! The draft only exists while editing, so a draft set while viewing cannot
//! be expressed. The state lives with the card that renders the item and is
//! never written to the cache.
use thiserror::Error;

use crate::mutation::{clamp_content, validate_content, ValidationError, MAX_CONTENT_LENGTH};

/// Display mode of one item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EditState {
    #[default]
    Viewing,
    Editing {
        draft: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("Not editing")]
    NotEditing,

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Drives [`EditState`] transitions.
///
/// The caller is responsible for checking that the viewer wrote the item
/// before calling [`EditController::open_edit`].
#[derive(Debug, Clone)]
pub struct EditController {
    state: EditState,
    max_length: usize,
}

impl Default for EditController {
    fn default() -> Self {
        Self::new(MAX_CONTENT_LENGTH)
    }
}

impl EditController {
    pub fn new(max_length: usize) -> Self {
        Self {
            state: EditState::Viewing,
            max_length,
        }
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.state, EditState::Editing { .. })
    }

    pub fn draft(&self) -> Option<&str> {
        match &self.state {
            EditState::Editing { draft } => Some(draft),
            EditState::Viewing => None,
        }
    }

    /// Start editing with the item's current content as the draft.
    ///
    /// Returns `false` if already editing; the existing draft is kept.
    pub fn open_edit(&mut self, current_content: &str) -> bool {
        match self.state {
            EditState::Editing { .. } => false,
            EditState::Viewing => {
                self.state = EditState::Editing {
                    draft: clamp_content(current_content, self.max_length).to_string(),
                };
                true
            }
        }
    }

    /// Replace the draft, cut to the maximum length.
    ///
    /// Returns `false` and changes nothing while viewing.
    pub fn set_draft(&mut self, text: &str) -> bool {
        match &mut self.state {
            EditState::Viewing => false,
            EditState::Editing { draft } => {
                draft.clear();
                draft.push_str(clamp_content(text, self.max_length));
                true
            }
        }
    }

    /// Discard the draft and return to viewing.
    pub fn cancel(&mut self) -> bool {
        match self.state {
            EditState::Viewing => false,
            EditState::Editing { .. } => {
                self.state = EditState::Viewing;
                true
            }
        }
    }

    /// Leave edit mode and hand back the draft to dispatch.
    ///
    /// An invalid draft keeps the controller editing so the user can fix it.
    pub fn submit(&mut self) -> Result<String, EditError> {
        let EditState::Editing { draft } = &self.state else {
            return Err(EditError::NotEditing);
        };
        validate_content(draft, self.max_length)?;

        match std::mem::take(&mut self.state) {
            EditState::Editing { draft } => Ok(draft),
            EditState::Viewing => Err(EditError::NotEditing),
        }
    }
}
