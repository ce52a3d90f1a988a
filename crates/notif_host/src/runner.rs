//! Thread-backed deferred task runner.
//!
//! Every armed task gets a sleeping thread. Cancelling drops the thread's
//! wake-up channel, which ends the sleep early. A task that already woke up is
//! handed to the sink tagged with its generation; the consumer must
//! [`ThreadTaskRunner::claim`] it before acting, so a cancel that races with
//! the wake-up still wins.

use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;

use notif_domain::notifications::{DeferredTask, TaskRunner};
use notif_domain::NotificationError;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

/// A task whose delay elapsed.
#[derive(Debug, Clone, PartialEq)]
pub struct FiredTask {
    pub tag: String,
    pub generation: u64,
    pub payload: Value,
}

type Sink = Arc<dyn Fn(FiredTask) + Send + Sync>;

struct Armed {
    generation: u64,
    // Dropping this wakes and stops the sleeper.
    _cancel: Sender<()>,
}

#[derive(Default)]
struct RunnerState {
    next_generation: u64,
    armed: HashMap<String, Armed>,
}

pub struct ThreadTaskRunner {
    sink: Sink,
    state: Mutex<RunnerState>,
}

impl ThreadTaskRunner {
    pub fn new(sink: impl Fn(FiredTask) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
            state: Mutex::new(RunnerState::default()),
        }
    }

    /// Takes ownership of a fired task. `false` means it was cancelled or
    /// replaced after waking and must be ignored.
    pub fn claim(&self, fired: &FiredTask) -> bool {
        let mut state = self.state.lock();
        match state.armed.get(&fired.tag) {
            Some(armed) if armed.generation == fired.generation => {
                state.armed.remove(&fired.tag);
                true
            }
            _ => {
                debug!(tag = %fired.tag, "ignoring stale task");
                false
            }
        }
    }

    pub fn armed_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.state.lock().armed.keys().cloned().collect();
        tags.sort();
        tags
    }
}

impl TaskRunner for ThreadTaskRunner {
    fn arm(&self, task: DeferredTask) -> notif_domain::Result<()> {
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        let generation = {
            let mut state = self.state.lock();
            state.next_generation += 1;
            let generation = state.next_generation;
            state.armed.insert(
                task.tag.clone(),
                Armed {
                    generation,
                    _cancel: cancel_tx,
                },
            );
            generation
        };

        let sink = Arc::clone(&self.sink);
        let DeferredTask {
            tag,
            delay,
            payload,
        } = task;
        thread::Builder::new()
            .name(format!("task-{tag}"))
            .spawn(move || match cancel_rx.recv_timeout(delay) {
                Err(RecvTimeoutError::Timeout) => {
                    trace!(%tag, generation, "task delay elapsed");
                    sink(FiredTask {
                        tag,
                        generation,
                        payload,
                    });
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    trace!(%tag, generation, "task cancelled before firing");
                }
            })
            .map(|_| ())
            .map_err(|err| NotificationError::TaskRunner(err.to_string()))
    }

    fn cancel(&self, tag: &str) -> notif_domain::Result<()> {
        if self.state.lock().armed.remove(tag).is_some() {
            debug!(tag, "cancelled task");
        }
        Ok(())
    }

    fn cancel_all(&self) -> notif_domain::Result<()> {
        let cancelled = std::mem::take(&mut self.state.lock().armed).len();
        debug!(cancelled, "cancelled all tasks");
        Ok(())
    }
}
