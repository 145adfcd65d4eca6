// channel.rs - Serialized access to the one database connection
//
// Most drivers do not allow one connection to be used from several tasks at
// once. Instead of making every caller think about that, all database work
// goes through an ExecutionChannel: a background task that owns the
// connection and runs submitted operations one at a time, in the order they
// were submitted. Callers get a future for the operation's result.
//
// The connection is opened lazily, by the first operation, and stays open
// until `close` is called or every handle to the channel is dropped.

use std::future::Future;
use std::pin::Pin;

use sqlx::any::install_default_drivers;
use sqlx::{AnyConnection, Connection};
use tokio::sync::{mpsc, oneshot};

use crate::error::{FixtureError, Result};
use crate::schema::Dialect;

/// Boxed future borrowing the connection for `'a`
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type Job = Box<dyn for<'c> FnOnce(Result<&'c mut AnyConnection>) -> BoxFuture<'c, ()> + Send>;

enum Command {
    Run(Job),
    Close(oneshot::Sender<Result<()>>),
}

/// Handle to the worker that owns the database connection.
///
/// Clone freely: all clones feed the same queue.
#[derive(Clone)]
pub struct ExecutionChannel {
    tx: mpsc::UnboundedSender<Command>,
    dialect: Dialect,
    url: String,
}

impl std::fmt::Debug for ExecutionChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionChannel")
            .field("url", &self.url)
            .field("dialect", &self.dialect)
            .finish()
    }
}

impl ExecutionChannel {
    /// Start the worker for `url`. Must be called inside a Tokio runtime.
    ///
    /// Nothing is connected yet; a bad URL scheme is rejected here, anything
    /// else (unreachable server, bad credentials) surfaces from the first
    /// submitted operation.
    pub fn open(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let dialect = Dialect::from_url(&url)?;

        install_default_drivers();

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(rx, url.clone()));

        tracing::debug!(db_url = %url, "execution channel started");

        Ok(Self { tx, dialect, url })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Queue `op` and wait for its outcome.
    ///
    /// `op` gets exclusive use of the connection while it runs. Its result,
    /// success or error, is returned unchanged.
    ///
    /// ```ignore
    /// let count: i64 = channel
    ///     .submit(|conn| Box::pin(async move {
    ///         let (n,) = sqlx::query_as("SELECT COUNT(*) FROM parent")
    ///             .fetch_one(conn)
    ///             .await?;
    ///         Ok(n)
    ///     }))
    ///     .await?;
    /// ```
    pub async fn submit<F, T>(&self, op: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut AnyConnection) -> BoxFuture<'c, Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (response_tx, response_rx) = oneshot::channel();

        let job = job(move |conn| {
            Box::pin(async move {
                let outcome = match conn {
                    Ok(conn) => op(conn).await,
                    Err(e) => Err(e),
                };
                // The caller may have stopped waiting; nothing to do then
                let _ = response_tx.send(outcome);
            })
        });

        self.tx
            .send(Command::Run(job))
            .map_err(|_| FixtureError::ChannelClosed)?;

        response_rx.await.map_err(|_| FixtureError::ChannelClosed)?
    }

    /// Close the connection after everything queued before this call has run.
    ///
    /// Operations submitted afterwards fail with `ChannelClosed`.
    pub async fn close(&self) -> Result<()> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(Command::Close(response_tx))
            .map_err(|_| FixtureError::ChannelClosed)?;
        response_rx.await.map_err(|_| FixtureError::ChannelClosed)?
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// Pins the closure's signature to the higher-ranked Job type
fn job<F>(f: F) -> Job
where
    F: for<'c> FnOnce(Result<&'c mut AnyConnection>) -> BoxFuture<'c, ()> + Send + 'static,
{
    Box::new(f)
}

async fn run_worker(mut rx: mpsc::UnboundedReceiver<Command>, url: String) {
    let mut conn: Option<AnyConnection> = None;

    while let Some(command) = rx.recv().await {
        match command {
            Command::Run(job) => {
                let handle = connect(&mut conn, &url).await;
                job(handle).await;
            }
            Command::Close(response) => {
                let outcome = match conn.take() {
                    Some(c) => c.close().await.map_err(FixtureError::from),
                    None => Ok(()),
                };
                tracing::debug!(db_url = %url, "execution channel closed");
                let _ = response.send(outcome);
                break;
            }
        }
    }
}

async fn connect<'a>(
    slot: &'a mut Option<AnyConnection>,
    url: &str,
) -> Result<&'a mut AnyConnection> {
    if slot.is_none() {
        tracing::info!(db_url = %url, "opening database connection");
        let conn = AnyConnection::connect(url).await.map_err(|e| {
            tracing::error!(db_url = %url, error = %e, "failed to open database connection");
            FixtureError::from(e)
        })?;
        *slot = Some(conn);
    }

    slot.as_mut().ok_or(FixtureError::ChannelClosed)
}
