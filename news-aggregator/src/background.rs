use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Detached writes to the shared store.
///
/// The read path only ever spawns into this set. `flush` is for shutdown and
/// tests.
#[derive(Clone, Default)]
pub struct BackgroundWrites {
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl BackgroundWrites {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `write` in the background; a failure is logged and dropped.
    pub fn spawn<F, E>(&self, label: &'static str, write: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display,
    {
        let mut tasks = self.lock();
        while tasks.try_join_next().is_some() {}

        tasks.spawn(async move {
            match write.await {
                Ok(()) => debug!("Background write `{}` done", label),
                Err(e) => warn!("Background write `{}` failed: {}", label, e),
            }
        });
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Wait for every write spawned so far, including ones spawned while
    /// flushing.
    pub async fn flush(&self) {
        loop {
            let mut drained = std::mem::take(&mut *self.lock());
            if drained.is_empty() {
                return;
            }
            while let Some(joined) = drained.join_next().await {
                if let Err(e) = joined {
                    warn!("Background write task aborted: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn flush_waits_for_spawned_writes() {
        let writes = BackgroundWrites::new();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let done = done.clone();
            writes.spawn("count", async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok::<(), String>(())
            });
        }
        writes.spawn("fails", async { Err::<(), _>("store down") });

        writes.flush().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(writes.pending(), 0);
    }
}
