//! Per-assignment deadline: one short-lived task per dispatch that demotes
//! the task back to UNALLOCATED and re-enqueues it if the assignment
//! hasn't reached FINISHED in time. Loses the race silently when the task
//! is already FINISHED.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::mr::registry::{Registry, TaskStatus};

/// Spawn a watchdog for a just-dispatched map task.
pub fn watch_map(registry: Registry, filename: String, deadline: Duration, requeue: mpsc::Sender<String>) {
    tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        match registry.status_of_map(&filename).await {
            Some(TaskStatus::Finished) | None => {}
            _ => {
                debug!(filename = %filename, "watchdog expired, redispatching map task");
                registry.reset_map(&filename).await;
                let _ = requeue.send(filename).await;
            }
        }
    });
}

/// Spawn a watchdog for a just-dispatched reduce task.
pub fn watch_reduce(registry: Registry, reduce_index: u32, deadline: Duration, requeue: mpsc::Sender<u32>) {
    tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        match registry.status_of_reduce(reduce_index).await {
            Some(TaskStatus::Finished) | None => {}
            _ => {
                debug!(reduce_index, "watchdog expired, redispatching reduce task");
                registry.reset_reduce(reduce_index).await;
                let _ = requeue.send(reduce_index).await;
            }
        }
    });
}
