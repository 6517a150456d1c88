use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Article, Group, NumberedArticle};

/// Storage contract the engine drives.
///
/// The engine assumes nothing about persistence, ordering across calls, or
/// atomicity beyond what a single [`post`](Backend::post) requires: each
/// target group's `high` and `count` must move together. Backends are shared
/// across sessions and must synchronise internally.
#[async_trait]
pub trait Backend: Send + Sync {
    /// List known groups, at most `max` of them. `None` means unbounded.
    async fn list_groups(&self, max: Option<usize>) -> Result<Vec<Group>>;

    /// Look up one group by name, or [`NntpError::NO_SUCH_GROUP`].
    ///
    /// [`NntpError::NO_SUCH_GROUP`]: crate::NntpError::NO_SUCH_GROUP
    async fn get_group(&self, name: &str) -> Result<Group>;

    /// Fetch one article. With a group, `id` may be a numeric article number
    /// local to it; otherwise `id` is a message-id, angle brackets optional.
    /// A `None` group means lookup by message-id regardless of group.
    async fn get_article(&self, group: Option<&Group>, id: &str) -> Result<Article>;

    /// Articles of `group` numbered within `[from, to]`, in ascending order.
    /// OVER ranges arrive unvalidated, so `from > to` must yield an empty
    /// sequence, not an error.
    async fn get_articles(&self, group: &Group, from: u64, to: u64)
    -> Result<Vec<NumberedArticle>>;

    /// Whether this session offers POST and IHAVE.
    fn allow_post(&self) -> bool;

    /// Persist a received article.
    async fn post(&self, article: Article) -> Result<()>;

    /// Whether the current session is already authenticated.
    fn authorized(&self) -> bool;

    /// Validate credentials. A returned backend replaces the session's
    /// backend for the rest of the session; `None` keeps the current one.
    async fn authenticate(&self, user: &str, pass: &str) -> Result<Option<Arc<dyn Backend>>>;
}

impl fmt::Debug for dyn Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn Backend")
    }
}
