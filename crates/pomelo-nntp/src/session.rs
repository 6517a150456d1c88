//! Per-connection session state and command dispatch.

use std::sync::Arc;

use crate::backend::Backend;
use crate::error::{NntpError, Result};
use crate::handlers;
use crate::model::{Article, Group};
use crate::wire::{Conn, NntpIo};

/// Per-connection state: the active backend (swappable by AUTHINFO) and the
/// selected group. The engine tracks no current article number, so commands
/// that rely on one answer `420`.
pub(crate) struct Session {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) group: Option<Group>,
}

impl Session {
    pub(crate) fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            group: None,
        }
    }

    /// Split a request line and run the matching handler. Commands are
    /// matched case-insensitively; anything unknown (including an empty
    /// line) answers `500`.
    pub(crate) async fn dispatch<S: NntpIo>(&mut self, line: &str, conn: &mut Conn<S>) -> Result<()> {
        let mut parts = line.split(' ');
        let command = parts.next().unwrap_or("").to_ascii_lowercase();
        let args: Vec<&str> = parts.collect();

        match command.as_str() {
            "quit" => handlers::quit(conn).await,
            "capabilities" => handlers::capabilities(self, conn).await,
            "mode" => handlers::mode(self, conn).await,
            "group" => handlers::group(self, &args, conn).await,
            "listgroup" => handlers::listgroup(self, &args, conn).await,
            "list" => handlers::list(self, &args, conn).await,
            "newgroups" => handlers::newgroups(conn).await,
            "head" => handlers::head(self, &args, conn).await,
            "body" => handlers::body(self, &args, conn).await,
            "article" => handlers::article(self, &args, conn).await,
            "over" | "xover" => handlers::over(self, &args, conn).await,
            "post" => handlers::post(self, conn).await,
            "ihave" => handlers::ihave(self, &args, conn).await,
            "authinfo" => handlers::authinfo(self, &args, conn).await,
            _ => Err(NntpError::UNKNOWN_COMMAND.into()),
        }
    }

    /// Common argument handling for HEAD, BODY and ARTICLE: a selected group
    /// is required, an absent argument maps to `420` (no current article),
    /// and the raw token goes to the backend, which tells numeric from
    /// message-id forms itself.
    pub(crate) async fn resolve_article(&self, args: &[&str]) -> Result<Article> {
        let Some(group) = &self.group else {
            return Err(NntpError::NO_GROUP_SELECTED.into());
        };
        let Some(id) = args.first() else {
            return Err(NntpError::NO_CURRENT_ARTICLE.into());
        };
        self.backend.get_article(Some(group), id).await
    }
}
