//! Deferred task queue.
//!
//! Callbacks wait here until the service becomes ready, then run once in
//! insertion order.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::monitor::{Observer, ServiceMonitor};
use super::{run_guarded, same_handle};
use crate::error::{BadgeError, Result};
use crate::utils::lock;

/// Work to run once the service is reachable.
pub trait DeferredTask: Send + Sync {
    fn run(&self);
}

impl<F> DeferredTask for F
where
    F: Fn() + Send + Sync,
{
    fn run(&self) {
        self()
    }
}

/// Shared handle to a deferred task. Identity is the allocation.
pub type TaskHandle = Arc<dyn DeferredTask>;

pub struct TaskQueue {
    monitor: Arc<ServiceMonitor>,
    tasks: Mutex<Vec<TaskHandle>>,
}

impl TaskQueue {
    pub fn new(monitor: Arc<ServiceMonitor>) -> Self {
        Self {
            monitor,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Queue `task`, arming readiness observation.
    ///
    /// Re-adding a queued handle replaces it in place.
    pub fn enqueue(&self, task: TaskHandle) -> Result<()> {
        let mut tasks = lock(&self.tasks);
        if let Some(slot) = tasks.iter_mut().find(|t| same_handle(&**t, &task)) {
            *slot = task;
            debug!("Deferred task already queued, replaced");
            return Ok(());
        }

        tasks
            .try_reserve(1)
            .map_err(|_| BadgeError::OutOfMemory)?;
        tasks.push(task);
        self.monitor.arm(Observer::Tasks);
        debug!(queued = tasks.len(), "Deferred task queued");
        Ok(())
    }

    /// Remove a queued task. Disarms observation once the queue is empty.
    pub fn remove(&self, task: &TaskHandle) -> Result<()> {
        let mut tasks = lock(&self.tasks);
        let index = tasks
            .iter()
            .position(|t| same_handle(t, task))
            .ok_or(BadgeError::NotExist)?;
        tasks.remove(index);
        if tasks.is_empty() {
            self.monitor.disarm(Observer::Tasks);
        }
        Ok(())
    }

    /// Detach every queued task and run them in order.
    ///
    /// Tasks queued while draining stay queued for the next drain. Returns
    /// the number of tasks run.
    pub fn drain_and_run(&self) -> usize {
        let drained = {
            let mut tasks = lock(&self.tasks);
            self.monitor.disarm(Observer::Tasks);
            std::mem::take(&mut *tasks)
        };

        if drained.is_empty() {
            return 0;
        }
        info!(count = drained.len(), "Running deferred tasks");

        let mut failed = 0;
        for task in &drained {
            if !run_guarded("deferred_task", || task.run()) {
                failed += 1;
            }
        }
        if failed > 0 {
            warn!(failed, "Some deferred tasks panicked");
        }
        drained.len()
    }

    pub fn len(&self) -> usize {
        lock(&self.tasks).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.tasks).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn queue() -> (Arc<ServiceMonitor>, TaskQueue) {
        let monitor = Arc::new(ServiceMonitor::new(Arc::new(MockTransport::new())));
        (monitor.clone(), TaskQueue::new(monitor))
    }

    fn recorder(log: &Arc<Mutex<Vec<u32>>>, id: u32) -> TaskHandle {
        let log = log.clone();
        Arc::new(move || log.lock().unwrap().push(id))
    }

    #[test]
    fn test_enqueue_arms_once() {
        let (monitor, queue) = queue();
        let log = Arc::new(Mutex::new(Vec::new()));

        queue.enqueue(recorder(&log, 1)).unwrap();
        queue.enqueue(recorder(&log, 2)).unwrap();

        assert_eq!(queue.len(), 2);
        assert!(monitor.is_armed(Observer::Tasks));
    }

    #[test]
    fn test_same_handle_is_replaced_not_duplicated() {
        let (_monitor, queue) = queue();
        let count = Arc::new(AtomicUsize::new(0));
        let task: TaskHandle = {
            let count = count.clone();
            Arc::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };

        queue.enqueue(task.clone()).unwrap();
        queue.enqueue(task.clone()).unwrap();
        assert_eq!(queue.len(), 1);

        queue.drain_and_run();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_replace_keeps_position() {
        let (_monitor, queue) = queue();
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = recorder(&log, 1);

        queue.enqueue(first.clone()).unwrap();
        queue.enqueue(recorder(&log, 2)).unwrap();
        queue.enqueue(first).unwrap();
        queue.drain_and_run();

        assert_eq!(*log.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_remove_disarms_when_empty() {
        let (monitor, queue) = queue();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = recorder(&log, 1);
        let b = recorder(&log, 2);
        queue.enqueue(a.clone()).unwrap();
        queue.enqueue(b.clone()).unwrap();

        queue.remove(&a).unwrap();
        assert!(monitor.is_armed(Observer::Tasks));

        queue.remove(&b).unwrap();
        assert!(!monitor.is_armed(Observer::Tasks));
        assert_eq!(queue.remove(&b), Err(BadgeError::NotExist));
    }

    #[test]
    fn test_drain_runs_fifo_and_empties() {
        let (monitor, queue) = queue();
        let log = Arc::new(Mutex::new(Vec::new()));
        for id in 1..=3 {
            queue.enqueue(recorder(&log, id)).unwrap();
        }

        assert_eq!(queue.drain_and_run(), 3);
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
        assert!(queue.is_empty());
        assert!(!monitor.is_armed(Observer::Tasks));
    }

    #[test]
    fn test_panicking_task_does_not_stop_the_rest() {
        let (_monitor, queue) = queue();
        let log = Arc::new(Mutex::new(Vec::new()));

        queue.enqueue(recorder(&log, 1)).unwrap();
        queue.enqueue(Arc::new(|| panic!("task failure"))).unwrap();
        queue.enqueue(recorder(&log, 3)).unwrap();

        assert_eq!(queue.drain_and_run(), 3);
        assert_eq!(*log.lock().unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_drain_of_empty_queue() {
        let (_monitor, queue) = queue();
        assert_eq!(queue.drain_and_run(), 0);
    }
}
