//! In-memory storage backend for the pomelo NNTP engine.
//!
//! Holds groups and articles in process memory, seeded programmatically or
//! from a JSON fixture file. Integration tests drive the engine against this
//! backend; it is also a worked example of the [`Backend`] contract.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncReadExt;

use pomelo_nntp::{
    Article, Backend, Body, Group, Headers, NntpError, NumberedArticle, PostingStatus, Result,
};

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureConfig {
    pub groups: Vec<GroupFixture>,
    #[serde(default)]
    pub articles: Vec<ArticleFixture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupFixture {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_posting")]
    pub posting: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArticleFixture {
    pub message_id: String,
    pub newsgroups: Vec<String>,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    pub body: String,
}

fn default_posting() -> String {
    "y".to_string()
}

pub fn load_fixtures(
    path: &Path,
) -> std::result::Result<FixtureConfig, Box<dyn std::error::Error + Send + Sync>> {
    let data = std::fs::read_to_string(path)?;
    let fixtures = serde_json::from_str(&data)?;
    Ok(fixtures)
}

#[derive(Debug, Clone)]
struct StoredArticle {
    headers: Headers,
    body: Vec<u8>,
    bytes: u64,
    lines: u64,
}

impl StoredArticle {
    fn to_article(&self) -> Article {
        Article {
            headers: self.headers.clone(),
            body: Body::from(self.body.clone()),
            bytes: self.bytes,
            lines: self.lines,
        }
    }
}

#[derive(Debug)]
struct GroupState {
    description: String,
    posting: PostingStatus,
    high: u64,
    // article number -> message-id key
    numbers: BTreeMap<u64, String>,
}

impl GroupState {
    fn snapshot(&self, name: &str) -> Group {
        Group {
            name: name.to_string(),
            description: self.description.clone(),
            count: self.numbers.len() as u64,
            low: self.numbers.keys().next().copied().unwrap_or(0),
            high: self.high,
            posting: self.posting,
        }
    }
}

#[derive(Debug, Default)]
struct Store {
    groups: HashMap<String, GroupState>,
    // keyed by message-id without angle brackets
    articles: HashMap<String, StoredArticle>,
}

/// Shared in-memory article store.
///
/// Cloning via [`authenticate`](Backend::authenticate) yields an authorized
/// handle over the same underlying state, so a session's backend swap is
/// observable while articles stay shared.
pub struct MemStore {
    store: Arc<Mutex<Store>>,
    allow_post: bool,
    credentials: Option<(String, String)>,
    authorized: bool,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            store: Arc::new(Mutex::new(Store::default())),
            allow_post: true,
            credentials: None,
            authorized: false,
        }
    }

    /// Refuse POST and IHAVE for sessions on this handle.
    pub fn read_only(mut self) -> Self {
        self.allow_post = false;
        self
    }

    /// Require AUTHINFO with these credentials before the session counts as
    /// authorized.
    pub fn with_credentials(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), pass.into()));
        self
    }

    pub fn from_fixtures(config: &FixtureConfig) -> Self {
        let store = Self::new();
        for group in &config.groups {
            let posting = group.posting.parse().unwrap_or(PostingStatus::Permitted);
            store.add_group(&group.name, &group.description, posting);
        }
        for article in &config.articles {
            let mut headers = Headers::new();
            for (name, value) in &article.headers {
                headers.append(name, value.clone());
            }
            let groups: Vec<&str> = article.newsgroups.iter().map(String::as_str).collect();
            store.add_article(&article.message_id, &groups, headers, article.body.as_bytes());
        }
        store
    }

    pub fn add_group(&self, name: &str, description: &str, posting: PostingStatus) {
        let mut store = self.store.lock().expect("memstore lock");
        store.groups.insert(
            name.to_string(),
            GroupState {
                description: description.to_string(),
                posting,
                high: 0,
                numbers: BTreeMap::new(),
            },
        );
    }

    /// Seed one article, filing it under each listed group. Unknown group
    /// names are skipped. Missing Message-Id and Newsgroups headers are
    /// filled in from the arguments.
    pub fn add_article(&self, message_id: &str, groups: &[&str], mut headers: Headers, body: &[u8]) {
        let key = strip_msgid(message_id).to_string();
        if headers.get_first("Message-Id").is_none() {
            headers.append("Message-Id", format!("<{key}>"));
        }
        if headers.get_first("Newsgroups").is_none() {
            headers.append("Newsgroups", groups.join(","));
        }
        let lines = count_lines(body);

        let mut store = self.store.lock().expect("memstore lock");
        for name in groups {
            if let Some(state) = store.groups.get_mut(*name) {
                let num = state.high + 1;
                state.high = num;
                state.numbers.insert(num, key.clone());
            }
        }
        store.articles.insert(
            key,
            StoredArticle {
                headers,
                bytes: body.len() as u64,
                lines,
                body: body.to_vec(),
            },
        );
    }

    fn authorized_handle(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            allow_post: self.allow_post,
            credentials: self.credentials.clone(),
            authorized: true,
        }
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemStore {
    async fn list_groups(&self, max: Option<usize>) -> Result<Vec<Group>> {
        let store = self.store.lock().expect("memstore lock");
        let mut groups: Vec<Group> = store
            .groups
            .iter()
            .map(|(name, state)| state.snapshot(name))
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(max) = max {
            groups.truncate(max);
        }
        Ok(groups)
    }

    async fn get_group(&self, name: &str) -> Result<Group> {
        let store = self.store.lock().expect("memstore lock");
        let state = store.groups.get(name).ok_or(NntpError::NO_SUCH_GROUP)?;
        Ok(state.snapshot(name))
    }

    async fn get_article(&self, group: Option<&Group>, id: &str) -> Result<Article> {
        let store = self.store.lock().expect("memstore lock");
        if let Some(group) = group
            && let Ok(num) = id.parse::<u64>()
        {
            let state = store
                .groups
                .get(&group.name)
                .ok_or(NntpError::NO_SUCH_GROUP)?;
            let key = state
                .numbers
                .get(&num)
                .ok_or(NntpError::INVALID_ARTICLE_NUMBER)?;
            let stored = store
                .articles
                .get(key)
                .ok_or(NntpError::INVALID_ARTICLE_NUMBER)?;
            return Ok(stored.to_article());
        }

        let stored = store
            .articles
            .get(strip_msgid(id))
            .ok_or(NntpError::INVALID_MESSAGE_ID)?;
        Ok(stored.to_article())
    }

    async fn get_articles(
        &self,
        group: &Group,
        from: u64,
        to: u64,
    ) -> Result<Vec<NumberedArticle>> {
        // A reversed range matches nothing; BTreeMap::range would panic on it.
        if from > to {
            return Ok(Vec::new());
        }
        let store = self.store.lock().expect("memstore lock");
        let state = store
            .groups
            .get(&group.name)
            .ok_or(NntpError::NO_SUCH_GROUP)?;
        let articles = state
            .numbers
            .range(from..=to)
            .filter_map(|(num, key)| {
                store.articles.get(key).map(|stored| NumberedArticle {
                    num: *num,
                    article: stored.to_article(),
                })
            })
            .collect();
        Ok(articles)
    }

    fn allow_post(&self) -> bool {
        self.allow_post
    }

    async fn post(&self, mut article: Article) -> Result<()> {
        let mut body = Vec::new();
        article.body.read_to_end(&mut body).await?;

        let key = strip_msgid(article.message_id()).to_string();
        if key.is_empty() {
            return Err(NntpError::POSTING_FAILED.into());
        }
        let newsgroups: Vec<String> = article
            .headers
            .get_first("Newsgroups")
            .unwrap_or("")
            .split(',')
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        let mut store = self.store.lock().expect("memstore lock");
        if store.articles.contains_key(&key) {
            return Err(NntpError::NOT_WANTED.into());
        }

        // high and count move together under the one lock; count is derived
        // from the numbering map.
        let mut filed = false;
        for name in &newsgroups {
            if let Some(state) = store.groups.get_mut(name) {
                let num = state.high + 1;
                state.high = num;
                state.numbers.insert(num, key.clone());
                filed = true;
            }
        }
        if !filed {
            return Err(NntpError::POSTING_FAILED.into());
        }

        store.articles.insert(
            key,
            StoredArticle {
                headers: article.headers,
                bytes: body.len() as u64,
                lines: count_lines(&body),
                body,
            },
        );
        Ok(())
    }

    fn authorized(&self) -> bool {
        self.authorized || self.credentials.is_none()
    }

    async fn authenticate(&self, user: &str, pass: &str) -> Result<Option<Arc<dyn Backend>>> {
        match &self.credentials {
            None => Ok(None),
            Some((expected_user, expected_pass))
                if expected_user == user && expected_pass == pass =>
            {
                let backend: Arc<dyn Backend> = Arc::new(self.authorized_handle());
                Ok(Some(backend))
            }
            Some(_) => Err(NntpError::AUTH_REJECTED.into()),
        }
    }
}

fn strip_msgid(id: &str) -> &str {
    id.trim_matches(['<', '>'])
}

fn count_lines(body: &[u8]) -> u64 {
    body.iter().filter(|&&b| b == b'\n').count() as u64
}
