use crate::error::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Fixed set of tokio workers draining a bounded job queue
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
    queue_capacity: usize,
}

impl WorkerPool {
    #[must_use]
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            queue_capacity: workers * 2,
        }
    }

    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Run `job` over every item; outputs come back in input order.
    ///
    /// Per-item failures belong in `R`; only a panicked worker fails the run.
    pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, job: F) -> Result<Vec<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let total = items.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let (tx, rx) = mpsc::channel::<(usize, T)>(self.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));
        let job = Arc::new(job);

        let mut handles = Vec::with_capacity(self.workers.min(total));
        for worker in 0..self.workers.min(total) {
            let rx = Arc::clone(&rx);
            let job = Arc::clone(&job);
            handles.push(tokio::spawn(async move {
                let mut done = Vec::new();
                loop {
                    let next = rx.lock().await.recv().await;
                    let Some((idx, item)) = next else {
                        break;
                    };
                    done.push((idx, job(item).await));
                }
                log::debug!("Worker {worker} finished {} jobs", done.len());
                done
            }));
        }

        for (idx, item) in items.into_iter().enumerate() {
            if tx.send((idx, item)).await.is_err() {
                // every worker is gone; their join errors are reported below
                break;
            }
        }
        drop(tx);

        let mut outputs: Vec<(usize, R)> = Vec::with_capacity(total);
        for handle in handles {
            outputs.extend(handle.await?);
        }
        outputs.sort_by_key(|(idx, _)| *idx);
        Ok(outputs.into_iter().map(|(_, output)| output).collect())
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        let workers = std::thread::available_parallelism().map_or(4, |n| n.get());
        Self::new(workers)
    }
}
