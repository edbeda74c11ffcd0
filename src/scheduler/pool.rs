//! Task group: one supervised thread per running node

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::any::Any;
use std::collections::HashMap;
use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Reports the task as done when dropped, which also happens while a panic
/// unwinds.
struct DoneGuard {
    id: String,
    tx: Sender<String>,
}

impl Drop for DoneGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(std::mem::take(&mut self.id));
    }
}

/// Threads keyed by node ID. Finished tasks are joined so that a panic is
/// returned as an error instead of vanishing with the thread.
pub struct TaskGroup<T> {
    handles: HashMap<String, JoinHandle<T>>,
    done_tx: Sender<String>,
    done_rx: Receiver<String>,
}

impl<T: Send + 'static> TaskGroup<T> {
    pub fn new() -> Self {
        let (done_tx, done_rx) = unbounded();
        Self {
            handles: HashMap::new(),
            done_tx,
            done_rx,
        }
    }

    /// Run `task` on a thread named `node-<id>`
    pub fn spawn<F>(&mut self, id: &str, task: F) -> io::Result<()>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let guard = DoneGuard {
            id: id.to_string(),
            tx: self.done_tx.clone(),
        };
        let handle = thread::Builder::new()
            .name(format!("node-{id}"))
            .spawn(move || {
                let _guard = guard;
                task()
            })?;
        self.handles.insert(id.to_string(), handle);
        Ok(())
    }

    /// Block up to `timeout` for at least one task to finish, then join
    /// every finished task. A panicked task yields `Err(message)`.
    pub fn wait_any(&mut self, timeout: Duration) -> Vec<(String, Result<T, String>)> {
        let Ok(first) = self.done_rx.recv_timeout(timeout) else {
            return Vec::new();
        };
        let mut done = vec![first];
        done.extend(self.done_rx.try_iter());

        done.into_iter()
            // Guards of tasks whose thread never started report too
            .filter_map(|id| self.handles.remove(&id).map(|h| (id, h)))
            .map(|(id, handle)| (id, handle.join().map_err(panic_message)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl<T: Send + 'static> Default for TaskGroup<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
