//! Data model shared between the engine and its storage backends.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

/// Per-group posting permission, rendered as `y`/`n`/`m` in `LIST ACTIVE`
/// rows ([RFC 3977 §7.6.3](https://datatracker.ietf.org/doc/html/rfc3977#section-7.6.3)).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostingStatus {
    Permitted,
    Prohibited,
    Moderated,
}

impl fmt::Display for PostingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            PostingStatus::Permitted => 'y',
            PostingStatus::Prohibited => 'n',
            PostingStatus::Moderated => 'm',
        };
        write!(f, "{c}")
    }
}

impl FromStr for PostingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "y" => Ok(PostingStatus::Permitted),
            "n" => Ok(PostingStatus::Prohibited),
            "m" => Ok(PostingStatus::Moderated),
            other => Err(format!("unknown posting status: {other:?}")),
        }
    }
}

/// Snapshot of a newsgroup as reported by the backend.
///
/// `count` is the number of extant articles, which is not necessarily
/// `high - low + 1`. Backends must keep `low <= high`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub description: String,
    pub count: u64,
    pub low: u64,
    pub high: u64,
    pub posting: PostingStatus,
}

/// Multi-map of MIME headers keyed by canonicalised name.
///
/// Lookups canonicalise the key too, so `headers.get_first("MESSAGE-ID")`
/// finds a header stored as `Message-Id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    map: HashMap<String, Vec<String>>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value under `name`, keeping any existing values.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.map
            .entry(canonical_name(name))
            .or_default()
            .push(value.into());
    }

    /// First value under `name`, if any.
    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.map
            .get(&canonical_name(name))
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values under `name`, in insertion order. Empty when absent.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.map
            .get(&canonical_name(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(&canonical_name(name))
    }

    /// Iterate over `(name, values)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.map
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Canonicalise a MIME header name to `Title-Case` form: first letter and
/// any letter following a `-` uppercased, the rest lowercased. `message-id`
/// becomes `Message-Id`. Names containing non-token bytes pass through
/// unchanged.
pub fn canonical_name(name: &str) -> String {
    if name.is_empty() || name.bytes().any(|b| !b.is_ascii_graphic() || b == b':') {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for b in name.bytes() {
        let b = if upper {
            b.to_ascii_uppercase()
        } else {
            b.to_ascii_lowercase()
        };
        out.push(b as char);
        upper = b == b'-';
    }
    out
}

/// Lazy, forward-only article body stream. It may not be restartable; the
/// handler that fetched it must drain it before returning.
pub struct Body(Box<dyn AsyncRead + Send + Unpin>);

impl Body {
    pub fn new(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self(Box::new(reader))
    }

    pub fn empty() -> Self {
        Self::new(tokio::io::empty())
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(Cursor::new(bytes))
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Self::from(text.as_bytes().to_vec())
    }
}

impl AsyncRead for Body {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Body(..)")
    }
}

/// An article: headers, a body stream, and size metadata.
///
/// `bytes` is the octet length of the stored body; `lines` is the number of
/// `\n` in it. Both are filled in by the backend when the article is stored.
#[derive(Debug)]
pub struct Article {
    pub headers: Headers,
    pub body: Body,
    pub bytes: u64,
    pub lines: u64,
}

impl Article {
    /// First `Message-Id` header value, or the empty string.
    pub fn message_id(&self) -> &str {
        self.headers.get_first("Message-Id").unwrap_or("")
    }
}

/// An article paired with its sequence number within one group. The same
/// article may carry different numbers in different groups.
#[derive(Debug)]
pub struct NumberedArticle {
    pub num: u64,
    pub article: Article,
}
