//! Single-writer scene queue
//!
//! Every scene graph mutation runs as a job on one task, in submission
//! order. Readers take the shared lock directly and never wait on the queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;

use crate::error::{Result, StageError};
use crate::scene::SceneGraph;

type SceneJob = Box<dyn FnOnce(&mut SceneGraph) + Send + 'static>;

pub struct SceneQueue;

impl SceneQueue {
    /// Start the writer task for `graph`
    pub fn spawn(graph: SceneGraph, capacity: usize) -> (SceneHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<SceneJob>(capacity.max(1));
        let graph = Arc::new(RwLock::new(graph));

        let writer = Arc::clone(&graph);
        let task = tokio::spawn(async move {
            let mut processed: u64 = 0;
            while let Some(job) = rx.recv().await {
                let mut guard = writer.write().await;
                job(&mut guard);
                processed += 1;
            }
            tracing::debug!("Scene queue closed after {} jobs", processed);
        });

        (SceneHandle { tx, graph }, task)
    }
}

/// Cloneable handle for submitting jobs and reading the graph
#[derive(Clone)]
pub struct SceneHandle {
    tx: mpsc::Sender<SceneJob>,
    graph: Arc<RwLock<SceneGraph>>,
}

impl SceneHandle {
    /// Enqueue a job without waiting for it to run
    pub async fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce(&mut SceneGraph) + Send + 'static,
    {
        self.tx
            .send(Box::new(job))
            .await
            .map_err(|_| StageError::QueueClosed)
    }

    /// Enqueue a job and wait for its result
    pub async fn call<F, R>(&self, job: F) -> Result<R>
    where
        F: FnOnce(&mut SceneGraph) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(move |graph| {
            let _ = reply_tx.send(job(graph));
        })
        .await?;
        reply_rx.await.map_err(|_| StageError::QueueClosed)
    }

    /// Wait until every job submitted before this call has run
    pub async fn flush(&self) -> Result<()> {
        self.call(|_| ()).await
    }

    /// Step node actions by one frame
    pub async fn advance(&self, dt: Duration) -> Result<()> {
        self.submit(move |graph| graph.advance(dt)).await
    }

    /// Run `f` against the current graph under the shared lock
    pub async fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SceneGraph) -> R,
    {
        let guard = self.graph.read().await;
        f(&guard)
    }

    pub async fn snapshot(&self) -> SceneGraph {
        self.graph.read().await.clone()
    }
}
