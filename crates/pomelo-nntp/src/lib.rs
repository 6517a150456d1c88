//! NNTP (Network News Transfer Protocol) server framework.
//!
//! Implements the reader-facing subset of the protocol over a pluggable
//! storage backend:
//! - Session lifecycle and greeting ([RFC 3977 §5](https://datatracker.ietf.org/doc/html/rfc3977#section-5))
//! - Group selection and listing: GROUP, LISTGROUP, LIST ([RFC 3977 §6.1](https://datatracker.ietf.org/doc/html/rfc3977#section-6.1), [§7.6](https://datatracker.ietf.org/doc/html/rfc3977#section-7.6))
//! - Article retrieval: ARTICLE, HEAD, BODY ([RFC 3977 §6.2](https://datatracker.ietf.org/doc/html/rfc3977#section-6.2))
//! - Overview summaries: OVER/XOVER and LIST OVERVIEW.FMT ([RFC 3977 §8](https://datatracker.ietf.org/doc/html/rfc3977#section-8))
//! - Article submission: POST and IHAVE ([RFC 3977 §6.3](https://datatracker.ietf.org/doc/html/rfc3977#section-6.3))
//! - Authentication via AUTHINFO USER/PASS ([RFC 4643 §2.3](https://datatracker.ietf.org/doc/html/rfc4643#section-2.3))
//! - Multi-line response dot-stuffing in both directions ([RFC 3977 §3.1.1](https://datatracker.ietf.org/doc/html/rfc3977#section-3.1.1))
//!
//! Storage lives behind the [`Backend`] trait; the engine owns the wire
//! protocol and per-session state, and nothing else.

mod backend;
mod error;
mod handlers;
mod model;
mod range;
mod server;
mod session;
mod wire;

pub use crate::backend::Backend;
pub use crate::error::{Error, NntpError, Result};
pub use crate::model::{
    Article, Body, Group, Headers, NumberedArticle, PostingStatus, canonical_name,
};
pub use crate::range::parse_range;
pub use crate::server::Server;
pub use crate::wire::{Conn, DotWriter, NntpIo};
