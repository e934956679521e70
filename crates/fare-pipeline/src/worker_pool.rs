//! Fixed-size worker pools over a bounded channel.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::PipelineError;

/// A set of workers draining one channel.
///
/// Workers stop when the channel is closed and empty, or when the token is
/// cancelled. Anything the handler captures (typically the next stage's
/// sender) is dropped once the last worker exits, which closes that stage.
pub struct WorkerPool {
    stage: &'static str,
    tasks: JoinSet<()>,
}

impl WorkerPool {
    pub fn spawn<T, F, Fut>(
        stage: &'static str,
        workers: usize,
        receiver: mpsc::Receiver<T>,
        token: CancellationToken,
        handler: F,
    ) -> Self
    where
        T: Send + 'static,
        F: Fn(T) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let receiver = Arc::new(Mutex::new(receiver));
        let mut tasks = JoinSet::new();

        for worker_id in 0..workers.max(1) {
            let receiver = Arc::clone(&receiver);
            let handler = handler.clone();
            let token = token.clone();

            tasks.spawn(async move {
                let mut handled = 0usize;
                loop {
                    let next = tokio::select! {
                        biased;
                        _ = token.cancelled() => None,
                        item = async { receiver.lock().await.recv().await } => item,
                    };
                    let Some(item) = next else {
                        break;
                    };
                    handler(item).await;
                    handled += 1;
                }
                debug!(stage, worker_id, handled, "Worker finished");
            });
        }

        debug!(stage, workers = workers.max(1), "Worker pool started");
        Self { stage, tasks }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// Wait for every worker to exit.
    pub async fn join(mut self) -> Result<(), PipelineError> {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(source) = result {
                error!(stage = self.stage, error = %source, "Worker task failed");
                return Err(PipelineError::Join {
                    stage: self.stage,
                    source,
                });
            }
        }
        Ok(())
    }
}
