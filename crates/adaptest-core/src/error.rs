//! Engine error types.
//!
//! These errors describe caller contract violations at the engine boundary:
//! malformed item parameters, answers for unknown or already-answered items,
//! and answers sent to a finished session. Numerical trouble inside the
//! estimator is never reported here; it degrades to a coarser estimate.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur when building catalogs or driving a session.
#[derive(Debug, Error)]
pub enum CatError {
    /// An item carries parameters the response model cannot use.
    #[error("invalid item '{item_id}': {reason}")]
    InvalidItem { item_id: String, reason: String },

    /// The same item id appears more than once in a catalog.
    #[error("duplicate item id: {0}")]
    DuplicateItem(String),

    /// An answer referenced an item that is not in the catalog.
    #[error("unknown item: {0}")]
    UnknownItem(String),

    /// A topic was referenced that the session or catalog does not know.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// The item was already answered in this session.
    #[error("item already answered in this session: {0}")]
    ItemAlreadyAnswered(String),

    /// The session is completed and accepts no further answers.
    #[error("session {0} is already completed")]
    SessionCompleted(Uuid),

    /// A session was started without any topics.
    #[error("cannot start a session without topics")]
    EmptyCurriculum,

    /// A session was started but no topic has a single item to administer.
    #[error("no items available for the requested topics")]
    NoItemsAvailable,

    /// Engine constants are inconsistent with each other.
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// The topic prerequisite graph is malformed.
    #[error("invalid topic pathway: {0}")]
    InvalidPathway(String),
}

impl CatError {
    /// Returns `true` if the error was caused by the data or calls the caller
    /// supplied, as opposed to engine configuration.
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, CatError::InvalidConfig(_))
    }

    /// Shorthand for building a [`CatError::InvalidItem`].
    pub(crate) fn invalid_item(item_id: &str, reason: impl Into<String>) -> Self {
        CatError::InvalidItem {
            item_id: item_id.to_string(),
            reason: reason.into(),
        }
    }
}
