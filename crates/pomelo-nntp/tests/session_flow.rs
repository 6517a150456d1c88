//! Full-session tests: a scripted client drives the engine over in-process
//! duplex pipes (and once over real TCP) against the in-memory backend.

use std::sync::Arc;

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream,
    ReadHalf, WriteHalf,
};
use tokio::net::{TcpListener, TcpStream};

use pomelo_memstore::MemStore;
use pomelo_nntp::{Headers, PostingStatus, Server};

struct Client<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
}

impl<S: AsyncRead + AsyncWrite> Client<S> {
    async fn attach(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        let mut client = Self {
            reader: BufReader::new(reader),
            writer,
        };
        assert_eq!(client.line().await, "200 Hello!");
        client
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\r\n").await.unwrap();
    }

    async fn line(&mut self) -> String {
        let mut line = String::new();
        let bytes = self.reader.read_line(&mut line).await.unwrap();
        assert!(bytes > 0, "server closed the connection unexpectedly");
        line.trim_end_matches(['\r', '\n']).to_string()
    }

    /// Raw payload lines of a dot-terminated block, stuffing intact.
    async fn block(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let line = self.line().await;
            if line == "." {
                return lines;
            }
            lines.push(line);
        }
    }

    async fn expect_closed(mut self) {
        let mut buf = [0u8; 1];
        let bytes = self.reader.read(&mut buf).await.unwrap();
        assert_eq!(bytes, 0, "expected the server to close the connection");
    }
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn connect(store: MemStore) -> Client<DuplexStream> {
    init_logging();
    let (ours, theirs) = tokio::io::duplex(16 * 1024);
    let server = Server::new(Arc::new(store));
    tokio::spawn(async move { server.process(theirs).await });
    Client::attach(ours).await
}

/// misc.test carries three articles numbered 1-3; alt.quiet is empty.
fn seeded_store() -> MemStore {
    let store = MemStore::new();
    store.add_group("misc.test", "General testing", PostingStatus::Permitted);
    store.add_group("alt.quiet", "Read-only chatter", PostingStatus::Prohibited);

    let mut headers = Headers::new();
    headers.append("Subject", "A");
    headers.append("From", "alice@example.net");
    headers.append("Date", "01 Jan 2024 00:00:00 +0000");
    store.add_article(
        "first@test",
        &["misc.test"],
        headers,
        b"body of the first article\n",
    );

    let mut headers = Headers::new();
    headers.append("Subject", "B");
    headers.append("From", "bob@example.net");
    store.add_article("second@test", &["misc.test"], headers, b"body B\n");

    let mut headers = Headers::new();
    headers.append("Subject", "C");
    headers.append("From", "carol@example.net");
    store.add_article("third@test", &["misc.test"], headers, b"third\n");

    store
}

#[tokio::test]
async fn quit_says_goodbye_and_closes() {
    let mut client = connect(seeded_store()).await;
    client.send("QUIT").await;
    assert_eq!(client.line().await, "205 bye");
    client.expect_closed().await;
}

#[tokio::test]
async fn capabilities_reflect_posting_permission() {
    let mut client = connect(seeded_store()).await;
    client.send("CAPABILITIES").await;
    assert_eq!(client.line().await, "101 Capability list:");
    let caps = client.block().await;
    for expected in [
        "VERSION 2",
        "READER",
        "POST",
        "IHAVE",
        "OVER",
        "XOVER",
        "LIST ACTIVE NEWSGROUPS OVERVIEW.FMT",
    ] {
        assert!(caps.iter().any(|c| c == expected), "missing {expected:?}");
    }

    let mut client = connect(seeded_store().read_only()).await;
    client.send("CAPABILITIES").await;
    assert_eq!(client.line().await, "101 Capability list:");
    let caps = client.block().await;
    assert!(!caps.iter().any(|c| c == "POST"));
    assert!(!caps.iter().any(|c| c == "IHAVE"));
}

#[tokio::test]
async fn mode_reader_reports_posting_permission() {
    let mut client = connect(seeded_store()).await;
    client.send("MODE READER").await;
    assert_eq!(client.line().await, "200 Posting allowed");

    let mut client = connect(seeded_store().read_only()).await;
    client.send("MODE READER").await;
    assert_eq!(client.line().await, "201 Posting prohibited");
}

#[tokio::test]
async fn group_selects_and_reports_counts() {
    let mut client = connect(seeded_store()).await;
    client.send("GROUP misc.test").await;
    assert_eq!(client.line().await, "211 3 1 3 misc.test");

    client.send("GROUP").await;
    assert_eq!(client.line().await, "412 No newsgroup selected");

    client.send("GROUP no.such.group").await;
    assert_eq!(client.line().await, "411 No such newsgroup");
}

#[tokio::test]
async fn failed_group_keeps_the_selection() {
    let mut client = connect(seeded_store()).await;
    client.send("GROUP misc.test").await;
    assert_eq!(client.line().await, "211 3 1 3 misc.test");

    client.send("GROUP no.such.group").await;
    assert_eq!(client.line().await, "411 No such newsgroup");

    // misc.test is still selected.
    client.send("OVER").await;
    assert_eq!(client.line().await, "224 here it comes");
    assert_eq!(client.block().await.len(), 3);
}

#[tokio::test]
async fn article_without_group_is_rejected() {
    let mut client = connect(seeded_store()).await;
    client.send("ARTICLE").await;
    assert_eq!(client.line().await, "412 No newsgroup selected");
}

#[tokio::test]
async fn article_resolution_error_mapping() {
    let mut client = connect(seeded_store()).await;
    client.send("GROUP misc.test").await;
    client.line().await;

    client.send("HEAD").await;
    assert_eq!(client.line().await, "420 Current article number is invalid");

    client.send("HEAD 99").await;
    assert_eq!(client.line().await, "423 No article with that number");

    client.send("HEAD <nope@test>").await;
    assert_eq!(client.line().await, "430 No article with that message-id");
}

#[tokio::test]
async fn head_emits_headers_in_reply_order() {
    let mut client = connect(seeded_store()).await;
    client.send("GROUP misc.test").await;
    client.line().await;

    client.send("HEAD 1").await;
    assert_eq!(client.line().await, "221 1 <first@test>");
    assert_eq!(
        client.block().await,
        [
            "Subject: A",
            "From: alice@example.net",
            "Date: 01 Jan 2024 00:00:00 +0000",
            "Message-Id: <first@test>",
            "Newsgroups: misc.test",
        ]
    );

    // Message-id form works too, brackets optional.
    client.send("HEAD second@test").await;
    assert_eq!(client.line().await, "221 1 <second@test>");
    client.block().await;
}

#[tokio::test]
async fn head_orders_extra_headers_lexicographically() {
    let store = MemStore::new();
    store.add_group("misc.test", "Testing", PostingStatus::Permitted);
    let mut headers = Headers::new();
    headers.append("X-Zeta", "z");
    headers.append("Received", "one");
    headers.append("Received", "two");
    headers.append("Subject", "ordering");
    headers.append("Approved", "mod");
    headers.append("From", "x@y");
    store.add_article("ord@test", &["misc.test"], headers, b"body\n");

    let mut client = connect(store).await;
    client.send("GROUP misc.test").await;
    client.line().await;
    client.send("HEAD 1").await;
    assert_eq!(client.line().await, "221 1 <ord@test>");
    assert_eq!(
        client.block().await,
        [
            "Subject: ordering",
            "From: x@y",
            "Message-Id: <ord@test>",
            "Approved: mod",
            "Newsgroups: misc.test",
            "Received: one",
            "Received: two",
            "X-Zeta: z",
        ]
    );
}

#[tokio::test]
async fn body_and_article_return_the_stored_payload() {
    let mut client = connect(seeded_store()).await;
    client.send("GROUP misc.test").await;
    client.line().await;

    client.send("BODY 1").await;
    assert_eq!(client.line().await, "222 1 <first@test>");
    assert_eq!(client.block().await, ["body of the first article"]);

    client.send("ARTICLE 2").await;
    assert_eq!(client.line().await, "220 1 <second@test>");
    assert_eq!(
        client.block().await,
        [
            "Subject: B",
            "From: bob@example.net",
            "Message-Id: <second@test>",
            "Newsgroups: misc.test",
            "",
            "body B",
        ]
    );
}

#[tokio::test]
async fn over_emits_tab_separated_rows() {
    let mut client = connect(seeded_store()).await;
    client.send("OVER 1-2").await;
    assert_eq!(client.line().await, "412 No newsgroup selected");

    client.send("GROUP misc.test").await;
    client.line().await;

    client.send("OVER 1-2").await;
    assert_eq!(client.line().await, "224 here it comes");
    assert_eq!(
        client.block().await,
        [
            "1\tA\talice@example.net\t01 Jan 2024 00:00:00 +0000\t<first@test>\t\t26\t1",
            "2\tB\tbob@example.net\t\t<second@test>\t\t7\t1",
        ]
    );

    // XOVER is an alias, and a bare OVER covers the whole group.
    client.send("XOVER").await;
    assert_eq!(client.line().await, "224 here it comes");
    assert_eq!(client.block().await.len(), 3);

    // A reversed range matches nothing but still completes the block.
    client.send("OVER 5-2").await;
    assert_eq!(client.line().await, "224 here it comes");
    assert!(client.block().await.is_empty());
}

#[tokio::test]
async fn listgroup_validates_the_range() {
    let mut client = connect(seeded_store()).await;
    client.send("LISTGROUP").await;
    assert_eq!(client.line().await, "412 No newsgroup selected");

    client.send("LISTGROUP misc.test 0-5").await;
    assert_eq!(client.line().await, "501 not supported, or syntax error");

    // Range syntax is checked before the group is even fetched.
    client.send("LISTGROUP no.such.group 0-5").await;
    assert_eq!(client.line().await, "501 not supported, or syntax error");

    client.send("LISTGROUP misc.test 3-2").await;
    assert_eq!(client.line().await, "501 not supported, or syntax error");

    client.send("LISTGROUP misc.test 2-3").await;
    assert_eq!(client.line().await, "211 3 1 3 misc.test list follows");
    assert_eq!(client.block().await, ["2", "3"]);

    // The group argument bound the selection, so a bare LISTGROUP now works.
    client.send("LISTGROUP").await;
    assert_eq!(client.line().await, "211 3 1 3 misc.test list follows");
    assert_eq!(client.block().await, ["1", "2", "3"]);
}

#[tokio::test]
async fn list_variants() {
    let mut client = connect(seeded_store()).await;

    client.send("LIST").await;
    assert_eq!(client.line().await, "215 list of newsgroups follows");
    assert_eq!(
        client.block().await,
        ["alt.quiet 0 0 n", "misc.test 3 1 y"]
    );

    client.send("LIST NEWSGROUPS").await;
    assert_eq!(client.line().await, "215 list of newsgroups follows");
    assert_eq!(
        client.block().await,
        [
            "alt.quiet Read-only chatter",
            "misc.test General testing",
        ]
    );

    client.send("LIST OVERVIEW.FMT").await;
    assert_eq!(
        client.line().await,
        "215 Order of fields in overview database."
    );
    assert_eq!(
        client.block().await,
        [
            "Subject:",
            "From:",
            "Date:",
            "Message-ID:",
            "References:",
            ":bytes",
            ":lines",
        ]
    );
}

#[tokio::test]
async fn newgroups_is_an_empty_stub() {
    let mut client = connect(seeded_store()).await;
    client.send("NEWGROUPS 20240101 000000").await;
    assert_eq!(client.line().await, "231 list of newsgroups follows");
    assert!(client.block().await.is_empty());
}

#[tokio::test]
async fn post_round_trips_a_dot_stuffed_body() {
    let mut client = connect(seeded_store()).await;
    client.send("POST").await;
    assert_eq!(client.line().await, "340 Go ahead");

    client.send("Message-Id: <posted@test>").await;
    client.send("Newsgroups: misc.test").await;
    client.send("Subject: dots").await;
    client.send("").await;
    client.send("first line").await;
    client.send("..stuffed").await;
    client.send(".").await;
    assert_eq!(client.line().await, "240 article received OK");

    client.send("GROUP misc.test").await;
    assert_eq!(client.line().await, "211 4 1 4 misc.test");

    client.send("BODY 4").await;
    assert_eq!(client.line().await, "222 1 <posted@test>");
    // Wire form: the stuffed line comes back stuffed, byte-identical.
    assert_eq!(client.block().await, ["first line", "..stuffed"]);
}

#[tokio::test]
async fn post_is_refused_when_prohibited() {
    let mut client = connect(seeded_store().read_only()).await;
    client.send("POST").await;
    assert_eq!(client.line().await, "440 Posting not permitted");
}

#[tokio::test]
async fn post_with_malformed_headers_fails() {
    let mut client = connect(seeded_store()).await;
    client.send("POST").await;
    assert_eq!(client.line().await, "340 Go ahead");
    client.send("this is not a header").await;
    assert_eq!(client.line().await, "441 posting failed");

    // The session survives.
    client.send("QUIT").await;
    assert_eq!(client.line().await, "205 bye");
}

#[tokio::test]
async fn ihave_accepts_only_unknown_articles() {
    let mut client = connect(seeded_store()).await;

    client.send("IHAVE <first@test>").await;
    assert_eq!(client.line().await, "435 Article not wanted");

    client.send("IHAVE").await;
    assert_eq!(client.line().await, "501 not supported, or syntax error");

    client.send("IHAVE <fresh@test>").await;
    assert_eq!(client.line().await, "335 send it");
    client.send("Message-Id: <fresh@test>").await;
    client.send("Newsgroups: misc.test").await;
    client.send("").await;
    client.send("offered body").await;
    client.send(".").await;
    assert_eq!(client.line().await, "235 article received OK");

    let mut client = connect(seeded_store().read_only()).await;
    client.send("IHAVE <other@test>").await;
    assert_eq!(client.line().await, "435 Article not wanted");
}

#[tokio::test]
async fn authinfo_flow() {
    let mut client = connect(seeded_store().with_credentials("alice", "secret")).await;

    client.send("AUTHINFO USER alice").await;
    assert_eq!(client.line().await, "350 Continue");
    client.send("AUTHINFO PASS bad").await;
    assert_eq!(client.line().await, "452 authorization rejected");

    client.send("AUTHINFO USER alice").await;
    assert_eq!(client.line().await, "350 Continue");
    client.send("AUTHINFO PASS secret").await;
    assert_eq!(client.line().await, "250 authenticated");

    // The swapped-in backend is already authorized.
    client.send("AUTHINFO USER alice").await;
    assert_eq!(client.line().await, "250 authenticated");
}

#[tokio::test]
async fn authinfo_syntax_errors() {
    let mut client = connect(seeded_store().with_credentials("alice", "secret")).await;

    client.send("AUTHINFO USER").await;
    assert_eq!(client.line().await, "501 not supported, or syntax error");

    client.send("AUTHINFO PASS secret").await;
    assert_eq!(client.line().await, "501 not supported, or syntax error");

    // The second line must be AUTHINFO PASS.
    client.send("AUTHINFO USER alice").await;
    assert_eq!(client.line().await, "350 Continue");
    client.send("GROUP misc.test").await;
    assert_eq!(client.line().await, "501 not supported, or syntax error");
}

#[tokio::test]
async fn unknown_commands_answer_500() {
    let mut client = connect(seeded_store()).await;
    client.send("FLOOP").await;
    assert_eq!(client.line().await, "500 Unknown command");

    client.send("").await;
    assert_eq!(client.line().await, "500 Unknown command");
}

#[tokio::test]
async fn serves_over_tcp() {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Server::new(Arc::new(seeded_store()));
    let server_task = tokio::spawn(async move { server.serve_once(listener).await });

    let stream = TcpStream::connect(addr).await.unwrap();
    let mut client = Client::attach(stream).await;
    client.send("GROUP misc.test").await;
    assert_eq!(client.line().await, "211 3 1 3 misc.test");
    client.send("QUIT").await;
    assert_eq!(client.line().await, "205 bye");
    client.expect_closed().await;

    server_task.await.unwrap().unwrap();
}
