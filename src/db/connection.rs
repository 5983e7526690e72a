use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

use crate::models::CompletionEvent;

use super::migrations::migrate;
use super::repositories::completions::{self, CompletionSummary};

type Reply<T> = oneshot::Sender<Result<T>>;

/// Everything the history worker knows how to do.
enum Request {
    Record {
        event: CompletionEvent,
        reply: Reply<bool>,
    },
    List {
        limit: usize,
        reply: Reply<Vec<CompletionEvent>>,
    },
    Summary {
        reply: Reply<CompletionSummary>,
    },
}

impl Request {
    fn serve(self, conn: &mut Connection) {
        let delivered = match self {
            Request::Record { event, reply } => reply.send(completions::insert(conn, &event)).is_ok(),
            Request::List { limit, reply } => reply.send(completions::list(conn, limit)).is_ok(),
            Request::Summary { reply } => reply.send(completions::summary(conn)).is_ok(),
        };
        if !delivered {
            error!("History caller went away before its reply");
        }
    }
}

/// Owns the worker thread. Dropping the last handle closes the queue and
/// waits for in-flight requests to finish.
struct Worker {
    requests: Option<mpsc::Sender<Request>>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(handle) = self.thread.take() {
            if let Err(join_err) = handle.join() {
                error!("History worker panicked: {join_err:?}");
            }
        }
    }
}

/// Completed-session history in SQLite.
///
/// The connection is opened and migrated on the caller's thread, then moved
/// onto a dedicated worker that serves typed requests one at a time.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    path: Arc<PathBuf>,
}

impl Database {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut conn = Connection::open(&path)
            .with_context(|| format!("failed to open history at {}", path.display()))?;
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            error!("Failed to enable WAL mode: {err}");
        }
        migrate(&mut conn).context("failed to migrate history database")?;

        let (requests, inbox) = mpsc::channel::<Request>();
        let thread = thread::Builder::new()
            .name("stillpoint-history".into())
            .spawn(move || {
                while let Ok(request) = inbox.recv() {
                    request.serve(&mut conn);
                }
                info!("History worker stopped");
            })
            .context("failed to spawn history worker")?;

        info!("History database ready at {}", path.display());
        Ok(Self {
            worker: Arc::new(Worker {
                requests: Some(requests),
                thread: Some(thread),
            }),
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Returns `false` when the session was already recorded.
    pub async fn insert_completion(&self, event: &CompletionEvent) -> Result<bool> {
        let event = event.clone();
        self.request(|reply| Request::Record { event, reply }).await
    }

    /// Most recent first.
    pub async fn list_completions(&self, limit: usize) -> Result<Vec<CompletionEvent>> {
        self.request(|reply| Request::List { limit, reply }).await
    }

    pub async fn completion_summary(&self) -> Result<CompletionSummary> {
        self.request(|reply| Request::Summary { reply }).await
    }

    pub async fn total_xp(&self) -> Result<u64> {
        Ok(self.completion_summary().await?.total_xp)
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Request) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.worker
            .requests
            .as_ref()
            .ok_or_else(|| anyhow!("history worker is shutting down"))?
            .send(build(reply))
            .map_err(|_| anyhow!("history worker has stopped"))?;

        response
            .await
            .map_err(|_| anyhow!("history worker dropped the request"))?
    }
}
