//! Viewer identity as supplied by the authentication layer.
//!
//! Only used to decide who may see edit and delete controls and on whose
//! behalf mutations are issued.
use crate::cache::UserId;

/// Authentication state of the current viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    /// The identity provider has not answered yet.
    Loading,
    Unauthenticated,
    Authenticated { user_id: UserId },
}

impl Session {
    pub fn authenticated(user_id: UserId) -> Self {
        Session::Authenticated { user_id }
    }

    pub fn viewer_id(&self) -> Option<UserId> {
        match self {
            Session::Authenticated { user_id } => Some(*user_id),
            Session::Loading | Session::Unauthenticated => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.viewer_id().is_some()
    }

    /// Whether the viewer wrote the item and may edit or delete it.
    pub fn can_modify(&self, author_id: UserId) -> bool {
        self.viewer_id() == Some(author_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_author_can_modify() {
        let session = Session::authenticated(5);
        assert!(session.can_modify(5));
        assert!(!session.can_modify(6));
    }

    #[test]
    fn test_signed_out_viewer_cannot_modify() {
        assert!(!Session::Unauthenticated.can_modify(5));
        assert!(!Session::Loading.can_modify(5));
        assert!(!Session::Loading.is_authenticated());
    }
}
