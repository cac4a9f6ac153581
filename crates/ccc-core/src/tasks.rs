use std::borrow::Cow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Named background task owned by the coordinator.
#[derive(Debug)]
pub struct TaskHandle {
    name: Cow<'static, str>,
    handle: JoinHandle<()>,
}

impl TaskHandle {
    pub fn new(name: impl Into<Cow<'static, str>>, handle: JoinHandle<()>) -> Self {
        Self {
            name: name.into(),
            handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[derive(Debug, Default)]
pub struct TaskManager {
    tasks: Vec<TaskHandle>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn push(&mut self, task: TaskHandle) {
        trace!(task = task.name(), "task registered");
        self.tasks.push(task);
    }

    pub fn names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    /// Abort every task without waiting for it.
    pub fn abort_all(&mut self) {
        for task in self.tasks.drain(..) {
            debug!(task = task.name(), "aborting task");
            task.handle.abort();
        }
    }

    /// Give each task up to `grace` to finish on its own, then abort it.
    pub async fn shutdown_with_grace(mut self, grace: Duration) {
        for task in self.tasks.drain(..) {
            let TaskHandle { name, mut handle } = task;
            if grace.is_zero() {
                handle.abort();
                let _ = handle.await;
                continue;
            }
            let sleeper = tokio::time::sleep(grace);
            tokio::pin!(sleeper);
            tokio::select! {
                res = &mut handle => {
                    if let Err(err) = res {
                        debug!(task = %name, ?err, "task exited with error");
                    }
                }
                _ = &mut sleeper => {
                    handle.abort();
                    if let Err(err) = handle.await {
                        debug!(task = %name, ?err, "task join after abort failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_aborts_stuck_tasks() {
        let mut mgr = TaskManager::new();
        mgr.push(TaskHandle::new(
            "forever",
            tokio::spawn(async {
                loop {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
            }),
        ));
        mgr.push(TaskHandle::new("quick", tokio::spawn(async {})));
        assert_eq!(mgr.names(), vec!["forever", "quick"]);
        tokio::time::timeout(
            Duration::from_secs(2),
            mgr.shutdown_with_grace(Duration::from_millis(20)),
        )
        .await
        .expect("shutdown finished");
    }
}
