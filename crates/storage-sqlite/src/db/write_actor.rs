//! Single-writer actor for SQLite.
//!
//! SQLite allows one writer at a time; funneling every write through one
//! actor-owned connection avoids lock contention and gives each job an
//! immediate transaction for free. This is what makes the repository's
//! records+metadata writes a single logical commit.

use super::DbPool;
use crate::errors::StorageError;
use diesel::SqliteConnection;
use foliocache_core::errors::Result;
use std::any::Any;
use tokio::sync::{mpsc, oneshot};

// A write job: runs against the actor's connection inside a transaction.
// The return type is erased to Box<dyn Any> so one channel carries them all.
type Job<T> = Box<dyn FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static>;

type ErasedJob = Job<Box<dyn Any + Send + 'static>>;
type Reply = oneshot::Sender<Result<Box<dyn Any + Send + 'static>>>;

/// Handle for sending jobs to the writer actor. Cheap to clone.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::Sender<(ErasedJob, Reply)>,
}

impl WriteHandle {
    /// Executes `job` on the writer's dedicated connection, inside an
    /// immediate transaction, and returns its result.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static + Any,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.tx
            .send((
                Box::new(move |c| job(c).map(|v| Box::new(v) as Box<dyn Any + Send>)),
                reply_tx,
            ))
            .await
            .expect("writer actor channel closed; the actor task has stopped");

        reply_rx
            .await
            .expect("writer actor dropped the reply sender without answering")
            .map(|boxed: Box<dyn Any + Send + 'static>| {
                *boxed
                    .downcast::<T>()
                    .unwrap_or_else(|_| panic!("writer actor result had the wrong type"))
            })
    }
}

/// Spawns the writer actor. The actor checks out one connection from `pool`
/// and holds it for its whole lifetime, processing jobs strictly serially.
pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (tx, mut rx) = mpsc::channel::<(ErasedJob, Reply)>(1024);

    tokio::spawn(async move {
        let mut conn = pool
            .get()
            .expect("failed to check out the writer actor's connection");

        while let Some((job, reply_tx)) = rx.recv().await {
            // The transaction error type must implement From<diesel::Error>,
            // so the job's core errors ride through StorageError and convert
            // back at the boundary.
            let result: Result<Box<dyn Any + Send + 'static>> = conn
                .immediate_transaction::<_, StorageError, _>(|c| {
                    job(c).map_err(StorageError::from)
                })
                .map_err(|e: StorageError| e.into());

            // Receiver may have given up (timeout/cancel); that's fine.
            let _ = reply_tx.send(result);
        }
        // All WriteHandles dropped: the actor terminates.
    });

    WriteHandle { tx }
}
