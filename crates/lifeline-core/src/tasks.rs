//! Purpose-keyed registry of cancellable background tasks.
//!
//! At most one task runs per [`TaskPurpose`]. Starting a task aborts the
//! previous one under the same key, and dropping the registry aborts
//! everything, so no timer outlives the scope that owns it.

use std::{
  collections::HashMap,
  future::Future,
  sync::{Mutex, MutexGuard, PoisonError},
};

use strum::Display;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum TaskPurpose {
  TapReset,
  ArmAnimation,
  DisarmAnimation,
  DisplayRefresh,
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
  tasks: Mutex<HashMap<TaskPurpose, JoinHandle<()>>>,
}

impl TaskRegistry {
  pub fn new() -> Self { Self::default() }

  fn lock(&self) -> MutexGuard<'_, HashMap<TaskPurpose, JoinHandle<()>>> {
    self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Spawn `task` under `purpose`, aborting whatever ran there before.
  ///
  /// Must be called from within a tokio runtime.
  pub fn start<F>(&self, purpose: TaskPurpose, task: F)
  where
    F: Future<Output = ()> + Send + 'static,
  {
    let handle = tokio::spawn(task);
    if let Some(previous) = self.lock().insert(purpose, handle) {
      if !previous.is_finished() {
        tracing::debug!(%purpose, "replacing running task");
      }
      previous.abort();
    }
  }

  /// Abort the task under `purpose`. Returns whether one was still running.
  pub fn cancel(&self, purpose: TaskPurpose) -> bool {
    match self.lock().remove(&purpose) {
      Some(handle) => {
        let running = !handle.is_finished();
        handle.abort();
        if running {
          tracing::debug!(%purpose, "cancelled task");
        }
        running
      }
      None => false,
    }
  }

  pub fn cancel_all(&self) {
    for (purpose, handle) in self.lock().drain() {
      if !handle.is_finished() {
        tracing::debug!(%purpose, "cancelled task");
      }
      handle.abort();
    }
  }

  pub fn is_running(&self, purpose: TaskPurpose) -> bool {
    self.lock().get(&purpose).is_some_and(|h| !h.is_finished())
  }
}

impl Drop for TaskRegistry {
  fn drop(&mut self) { self.cancel_all(); }
}
