use std::borrow::Cow;

use thiserror::Error;

/// A coded NNTP error ([RFC 3977 §3.2](https://datatracker.ietf.org/doc/html/rfc3977#section-3.2)).
///
/// Handlers return these as ordinary errors; the dispatcher writes them back
/// to the client as a single `code reason` response line and keeps the
/// session alive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code} {reason}")]
pub struct NntpError {
    pub code: u16,
    pub reason: Cow<'static, str>,
}

impl NntpError {
    /// Requested group does not exist.
    pub const NO_SUCH_GROUP: Self = Self::new(411, "No such newsgroup");
    /// A command required a selected group and none was bound.
    pub const NO_GROUP_SELECTED: Self = Self::new(412, "No newsgroup selected");
    /// Message-id lookup found nothing.
    pub const INVALID_MESSAGE_ID: Self = Self::new(430, "No article with that message-id");
    /// Article-number lookup found nothing.
    pub const INVALID_ARTICLE_NUMBER: Self = Self::new(423, "No article with that number");
    /// A command relied on the current-article concept, which this engine
    /// does not track.
    pub const NO_CURRENT_ARTICLE: Self = Self::new(420, "Current article number is invalid");
    pub const UNKNOWN_COMMAND: Self = Self::new(500, "Unknown command");
    pub const SYNTAX: Self = Self::new(501, "not supported, or syntax error");
    pub const POSTING_NOT_PERMITTED: Self = Self::new(440, "Posting not permitted");
    pub const POSTING_FAILED: Self = Self::new(441, "posting failed");
    /// The server does not want the offered article (IHAVE).
    pub const NOT_WANTED: Self = Self::new(435, "Article not wanted");
    /// Returned by backends that require authentication before proceeding.
    pub const AUTH_REQUIRED: Self = Self::new(450, "authorization required");
    pub const AUTH_REJECTED: Self = Self::new(452, "authorization rejected");
    /// Returned by backends for commands that require a completed login.
    pub const NOT_AUTHENTICATED: Self = Self::new(480, "authentication required");

    pub const fn new(code: u16, reason: &'static str) -> Self {
        Self {
            code,
            reason: Cow::Borrowed(reason),
        }
    }

    pub fn with_reason(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: Cow::Owned(reason.into()),
        }
    }
}

/// Engine-level failure.
///
/// The dispatcher distinguishes the three kinds: `Nntp` is answered inline
/// and the session continues, `Disconnected` closes the connection silently,
/// anything else is logged and drops the connection.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Nntp(#[from] NntpError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend failure outside the protocol's vocabulary. Treated like a
    /// transport error: logged, and the connection is dropped.
    #[error("backend error: {0}")]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),

    /// The client hung up, or QUIT ran to completion.
    #[error("connection closed")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, Error>;
