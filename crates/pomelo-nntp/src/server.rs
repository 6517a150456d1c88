//! Accept loop and per-connection protocol driver
//! ([RFC 3977 §5](https://datatracker.ietf.org/doc/html/rfc3977#section-5)).

use std::io;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::backend::Backend;
use crate::error::Error;
use crate::session::Session;
use crate::wire::{Conn, NntpIo};

/// The server handle: a backend plus the machinery to run sessions against
/// it. Cloning is cheap and shares the backend.
#[derive(Clone)]
pub struct Server {
    backend: Arc<dyn Backend>,
}

impl Server {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Accept connections forever, one session task per client.
    pub async fn serve(&self, listener: TcpListener) -> io::Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            let server = self.clone();
            tokio::spawn(async move {
                tracing::debug!("client connected: {peer}");
                server.process(stream).await;
                tracing::debug!("client disconnected: {peer}");
            });
        }
    }

    /// Accept a single connection and run its session to completion. Handy
    /// for tests that want the server to wind down afterwards.
    pub async fn serve_once(&self, listener: TcpListener) -> io::Result<()> {
        let (stream, _) = listener.accept().await?;
        self.process(stream).await;
        Ok(())
    }

    /// Drive one NNTP session over `stream` until the client goes away.
    ///
    /// The greeting is unconditional; posting permission is reported on
    /// demand via MODE READER and CAPABILITIES. Protocol errors answer
    /// inline and keep the session; anything else ends it.
    pub async fn process<S: NntpIo>(&self, stream: S) {
        let mut conn = Conn::new(stream);
        let mut session = Session::new(Arc::clone(&self.backend));

        if let Err(err) = conn.write_line("200 Hello!").await {
            tracing::warn!("error greeting client, dropping conn: {err}");
            return;
        }

        loop {
            let line = match conn.read_line().await {
                Ok(line) => line,
                Err(Error::Disconnected) => return,
                Err(err) => {
                    tracing::warn!("error reading from client, dropping conn: {err}");
                    return;
                }
            };
            tracing::debug!("got cmd: {line:?}");

            match session.dispatch(&line, &mut conn).await {
                Ok(()) => {}
                Err(Error::Nntp(err)) => {
                    if conn.write_line(&err.to_string()).await.is_err() {
                        return;
                    }
                }
                Err(Error::Disconnected) => return,
                Err(err) => {
                    tracing::warn!("error dispatching command, dropping conn: {err}");
                    return;
                }
            }
        }
    }
}
