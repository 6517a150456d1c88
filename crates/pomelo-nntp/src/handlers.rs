//! One handler per supported command ([RFC 3977 §6](https://datatracker.ietf.org/doc/html/rfc3977#section-6),
//! [RFC 4643](https://datatracker.ietf.org/doc/html/rfc4643)).
//!
//! Handlers write their own success responses; protocol failures come back
//! as [`NntpError`] values for the dispatcher to report. A handler that has
//! opened a dot-terminated block always closes it before returning.

use std::io;

use crate::error::{Error, NntpError, Result};
use crate::model::{Article, Body, Headers};
use crate::range::parse_range;
use crate::session::Session;
use crate::wire::{Conn, DotWriter, NntpIo};

/// Emission order for the well-known headers in HEAD and ARTICLE replies.
/// Everything else follows in lexicographic order.
const PREFERRED_HEADERS: [&str; 5] = ["Subject", "From", "Date", "Message-Id", "References"];

pub(crate) async fn quit<S: NntpIo>(conn: &mut Conn<S>) -> Result<()> {
    conn.write_line("205 bye").await?;
    Err(Error::Disconnected)
}

pub(crate) async fn capabilities<S: NntpIo>(sess: &Session, conn: &mut Conn<S>) -> Result<()> {
    conn.write_line("101 Capability list:").await?;
    let mut dw = conn.dot_writer();
    dw.write_str("VERSION 2").await?;
    dw.write_str("READER").await?;
    if sess.backend.allow_post() {
        dw.write_str("POST").await?;
        dw.write_str("IHAVE").await?;
    }
    dw.write_str("OVER").await?;
    dw.write_str("XOVER").await?;
    dw.write_str("LIST ACTIVE NEWSGROUPS OVERVIEW.FMT").await?;
    dw.close().await?;
    Ok(())
}

pub(crate) async fn mode<S: NntpIo>(sess: &Session, conn: &mut Conn<S>) -> Result<()> {
    if sess.backend.allow_post() {
        conn.write_line("200 Posting allowed").await?;
    } else {
        conn.write_line("201 Posting prohibited").await?;
    }
    Ok(())
}

pub(crate) async fn group<S: NntpIo>(
    sess: &mut Session,
    args: &[&str],
    conn: &mut Conn<S>,
) -> Result<()> {
    let Some(name) = args.first() else {
        return Err(NntpError::NO_GROUP_SELECTED.into());
    };
    let group = sess.backend.get_group(name).await?;
    let reply = format!(
        "211 {} {} {} {}",
        group.count, group.low, group.high, group.name
    );
    sess.group = Some(group);
    conn.write_line(&reply).await?;
    Ok(())
}

/// LISTGROUP is GROUP with an optional group argument plus an optional
/// range, answering the matching article numbers instead of just counts.
/// Without an argument it reuses the session's group; with one it binds the
/// fetched group exactly like GROUP does.
pub(crate) async fn listgroup<S: NntpIo>(
    sess: &mut Session,
    args: &[&str],
    conn: &mut Conn<S>,
) -> Result<()> {
    let mut group = None;
    if args.is_empty() {
        match &sess.group {
            Some(g) => group = Some(g.clone()),
            None => return Err(NntpError::NO_GROUP_SELECTED.into()),
        }
    }

    // Default range per RFC 3977 §6.1.2.2. A lower bound of zero can only
    // come from invalid input, since the default starts at one.
    let spec = args.get(1).copied().unwrap_or("1-");
    let (from, to) = parse_range(spec);
    if from == 0 || from > to {
        return Err(NntpError::SYNTAX.into());
    }

    let group = match group {
        Some(group) => group,
        None => {
            let group = sess.backend.get_group(args[0]).await?;
            sess.group = Some(group.clone());
            group
        }
    };

    let articles = sess.backend.get_articles(&group, from, to).await?;
    conn.write_line(&format!(
        "211 {} {} {} {} list follows",
        group.count, group.low, group.high, group.name
    ))
    .await?;
    let mut dw = conn.dot_writer();
    let nums: Vec<u64> = articles.iter().map(|article| article.num).collect();
    for num in nums {
        dw.write_str(&num.to_string()).await?;
    }
    dw.close().await?;
    Ok(())
}

pub(crate) async fn list<S: NntpIo>(
    sess: &Session,
    args: &[&str],
    conn: &mut Conn<S>,
) -> Result<()> {
    let ltype = args
        .first()
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_else(|| "active".to_string());

    if ltype == "overview.fmt" {
        return list_overview_fmt(conn).await;
    }

    let groups = sess.backend.list_groups(None).await?;
    conn.write_line("215 list of newsgroups follows").await?;
    let mut dw = conn.dot_writer();
    for group in &groups {
        match ltype.as_str() {
            "active" => {
                dw.write_str(&format!(
                    "{} {} {} {}",
                    group.name, group.high, group.low, group.posting
                ))
                .await?;
            }
            "newsgroups" => {
                dw.write_str(&format!("{} {}", group.name, group.description))
                    .await?;
            }
            _ => {}
        }
    }
    dw.close().await?;
    Ok(())
}

async fn list_overview_fmt<S: NntpIo>(conn: &mut Conn<S>) -> Result<()> {
    conn.write_line("215 Order of fields in overview database.")
        .await?;
    let mut dw = conn.dot_writer();
    for field in [
        "Subject:",
        "From:",
        "Date:",
        "Message-ID:",
        "References:",
        ":bytes",
        ":lines",
    ] {
        dw.write_str(field).await?;
    }
    dw.close().await?;
    Ok(())
}

/// Newgroup discovery is not implemented; the reply is always empty.
pub(crate) async fn newgroups<S: NntpIo>(conn: &mut Conn<S>) -> Result<()> {
    conn.write_line("231 list of newsgroups follows").await?;
    conn.dot_writer().close().await?;
    Ok(())
}

pub(crate) async fn head<S: NntpIo>(
    sess: &mut Session,
    args: &[&str],
    conn: &mut Conn<S>,
) -> Result<()> {
    let article = sess.resolve_article(args).await?;
    conn.write_line(&format!("221 1 {}", article.message_id()))
        .await?;
    let mut dw = conn.dot_writer();
    write_headers(&mut dw, &article.headers).await?;
    dw.close().await?;
    Ok(())
}

pub(crate) async fn body<S: NntpIo>(
    sess: &mut Session,
    args: &[&str],
    conn: &mut Conn<S>,
) -> Result<()> {
    let article = sess.resolve_article(args).await?;
    conn.write_line(&format!("222 1 {}", article.message_id()))
        .await?;
    let mut dw = conn.dot_writer();
    dw.copy_body(article.body).await?;
    dw.close().await?;
    Ok(())
}

pub(crate) async fn article<S: NntpIo>(
    sess: &mut Session,
    args: &[&str],
    conn: &mut Conn<S>,
) -> Result<()> {
    let article = sess.resolve_article(args).await?;
    conn.write_line(&format!("220 1 {}", article.message_id()))
        .await?;
    let Article { headers, body, .. } = article;
    let mut dw = conn.dot_writer();
    write_headers(&mut dw, &headers).await?;
    dw.write_str("").await?;
    dw.copy_body(body).await?;
    dw.close().await?;
    Ok(())
}

pub(crate) async fn over<S: NntpIo>(
    sess: &Session,
    args: &[&str],
    conn: &mut Conn<S>,
) -> Result<()> {
    let Some(group) = &sess.group else {
        return Err(NntpError::NO_GROUP_SELECTED.into());
    };
    let (from, to) = parse_range(args.first().copied().unwrap_or(""));
    let articles = sess.backend.get_articles(group, from, to).await?;

    conn.write_line("224 here it comes").await?;
    let lines: Vec<String> = articles
        .iter()
        .map(|entry| {
            let headers = &entry.article.headers;
            let first = |name: &str| headers.get_first(name).unwrap_or("");
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                entry.num,
                first("Subject"),
                first("From"),
                first("Date"),
                first("Message-Id"),
                first("References"),
                entry.article.bytes,
                entry.article.lines,
            )
        })
        .collect();
    let mut dw = conn.dot_writer();
    for line in lines {
        dw.write_str(&line).await?;
    }
    dw.close().await?;
    Ok(())
}

pub(crate) async fn post<S: NntpIo>(sess: &Session, conn: &mut Conn<S>) -> Result<()> {
    if !sess.backend.allow_post() {
        return Err(NntpError::POSTING_NOT_PERMITTED.into());
    }

    conn.write_line("340 Go ahead").await?;
    let article = receive_article(conn).await?;
    sess.backend.post(article).await?;
    conn.write_line("240 article received OK").await?;
    Ok(())
}

pub(crate) async fn ihave<S: NntpIo>(
    sess: &Session,
    args: &[&str],
    conn: &mut Conn<S>,
) -> Result<()> {
    if !sess.backend.allow_post() {
        return Err(NntpError::NOT_WANTED.into());
    }
    let Some(id) = args.first() else {
        return Err(NntpError::SYNTAX.into());
    };
    if sess.backend.get_article(None, id).await.is_ok() {
        return Err(NntpError::NOT_WANTED.into());
    }

    conn.write_line("335 send it").await?;
    let article = receive_article(conn).await?;
    sess.backend.post(article).await?;
    conn.write_line("235 article received OK").await?;
    Ok(())
}

/// Read the headers and dot-terminated body of an incoming article. Malformed
/// headers downgrade to `441`; transport failures pass through untouched.
async fn receive_article<S: NntpIo>(conn: &mut Conn<S>) -> Result<Article> {
    let headers = match conn.read_mime_header().await {
        Ok(headers) => headers,
        Err(Error::Nntp(_)) => return Err(NntpError::POSTING_FAILED.into()),
        Err(other) => return Err(other),
    };
    let body = conn.read_dot_block().await?;
    Ok(Article {
        headers,
        body: Body::from(body),
        bytes: 0,
        lines: 0,
    })
}

pub(crate) async fn authinfo<S: NntpIo>(
    sess: &mut Session,
    args: &[&str],
    conn: &mut Conn<S>,
) -> Result<()> {
    if args.len() < 2 || !args[0].eq_ignore_ascii_case("user") {
        return Err(NntpError::SYNTAX.into());
    }

    if sess.backend.authorized() {
        conn.write_line("250 authenticated").await?;
        return Ok(());
    }

    conn.write_line("350 Continue").await?;
    let line = conn.read_line().await?;
    let mut parts = line.splitn(3, ' ');
    let (Some(command), Some(verb), Some(pass)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(NntpError::SYNTAX.into());
    };
    if !command.eq_ignore_ascii_case("authinfo") || !verb.eq_ignore_ascii_case("pass") {
        return Err(NntpError::SYNTAX.into());
    }

    let replacement = sess.backend.authenticate(args[1], pass).await?;
    conn.write_line("250 authenticated").await?;
    if let Some(backend) = replacement {
        sess.backend = backend;
    }
    Ok(())
}

/// Emit headers in the canonical reply order: the preferred five first, then
/// the rest sorted by name, each value on its own line.
async fn write_headers<S: NntpIo>(dw: &mut DotWriter<'_, S>, headers: &Headers) -> io::Result<()> {
    for name in PREFERRED_HEADERS {
        write_header_values(dw, headers, name).await?;
    }

    let mut rest: Vec<&str> = headers
        .iter()
        .map(|(name, _)| name)
        .filter(|name| !PREFERRED_HEADERS.contains(name))
        .collect();
    rest.sort_unstable();
    for name in rest {
        write_header_values(dw, headers, name).await?;
    }
    Ok(())
}

async fn write_header_values<S: NntpIo>(
    dw: &mut DotWriter<'_, S>,
    headers: &Headers,
    name: &str,
) -> io::Result<()> {
    for value in headers.get_all(name) {
        dw.write_str(&format!("{name}: {value}")).await?;
    }
    Ok(())
}
