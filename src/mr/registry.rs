//! In-master task lifecycle state, guarded by a single readers-writer
//! mutex. `map_index` is a property of the `MapTaskState` itself, assigned
//! once on first claim and preserved across any number of
//! watchdog-triggered resets.

use std::sync::Arc;

use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Unallocated,
    Allocated,
    Finished,
}

#[derive(Debug, Clone)]
struct MapTaskState {
    input_filename: String,
    status: TaskStatus,
    map_index: Option<u32>,
}

#[derive(Debug, Clone)]
struct ReduceTaskState {
    status: TaskStatus,
    shard_files: Vec<String>,
    output_filename: Option<String>,
}

#[derive(Debug)]
struct RegistryState {
    map_tasks: Vec<MapTaskState>,
    reduce_tasks: Vec<ReduceTaskState>,
    next_map_index: u32,
}

/// The task registry. Cheaply cloneable; clones share the same underlying
/// lock.
#[derive(Debug, Clone)]
pub struct Registry {
    inner: Arc<RwLock<RegistryState>>,
}

impl Registry {
    pub fn new(input_filenames: Vec<String>, n_reduce: u32) -> Self {
        let map_tasks = input_filenames
            .into_iter()
            .map(|input_filename| MapTaskState {
                input_filename,
                status: TaskStatus::Unallocated,
                map_index: None,
            })
            .collect();
        let reduce_tasks = (0..n_reduce)
            .map(|_| ReduceTaskState {
                status: TaskStatus::Unallocated,
                shard_files: Vec::new(),
                output_filename: None,
            })
            .collect();
        Self {
            inner: Arc::new(RwLock::new(RegistryState {
                map_tasks,
                reduce_tasks,
                next_map_index: 0,
            })),
        }
    }

    /// Pop an UNALLOCATED map task, mark it ALLOCATED, and assign its
    /// `map_index` if this is the first time it has ever been claimed.
    pub async fn claim_map(&self) -> Option<(String, u32)> {
        let mut state = self.inner.write().await;
        let next_map_index = state.next_map_index;
        let task = state
            .map_tasks
            .iter_mut()
            .find(|t| t.status == TaskStatus::Unallocated)?;
        task.status = TaskStatus::Allocated;
        let map_index = *task.map_index.get_or_insert_with(|| next_map_index);
        if map_index == next_map_index {
            state.next_map_index += 1;
        }
        Some((task.input_filename.clone(), map_index))
    }

    /// Claim a specific map task by filename, as handed to the RPC handler
    /// by the dispatcher's queue. Returns `None` if the task is no longer
    /// UNALLOCATED (e.g. a stale queue entry for a task someone else
    /// already claimed) so the caller can treat it like "nothing ready".
    pub async fn claim_map_named(&self, input_filename: &str) -> Option<(String, u32)> {
        let mut state = self.inner.write().await;
        let next_map_index = state.next_map_index;
        let task = state
            .map_tasks
            .iter_mut()
            .find(|t| t.input_filename == input_filename && t.status == TaskStatus::Unallocated)?;
        task.status = TaskStatus::Allocated;
        let map_index = *task.map_index.get_or_insert_with(|| next_map_index);
        if map_index == next_map_index {
            state.next_map_index += 1;
        }
        Some((task.input_filename.clone(), map_index))
    }

    /// Claim a specific reduce task by index, mirroring `claim_map_named`.
    pub async fn claim_reduce_named(&self, reduce_index: u32) -> Option<(u32, Vec<String>)> {
        let mut state = self.inner.write().await;
        let task = state.reduce_tasks.get_mut(reduce_index as usize)?;
        if task.status != TaskStatus::Unallocated {
            return None;
        }
        task.status = TaskStatus::Allocated;
        Some((reduce_index, task.shard_files.clone()))
    }

    /// Pop an UNALLOCATED reduce task and mark it ALLOCATED.
    pub async fn claim_reduce(&self) -> Option<(u32, Vec<String>)> {
        let mut state = self.inner.write().await;
        let (idx, task) = state
            .reduce_tasks
            .iter_mut()
            .enumerate()
            .find(|(_, t)| t.status == TaskStatus::Unallocated)?;
        task.status = TaskStatus::Allocated;
        Some((idx as u32, task.shard_files.clone()))
    }

    /// Mark a map task FINISHED. Idempotent: accepts late/duplicate reports
    /// without panicking.
    pub async fn finish_map(&self, input_filename: &str) {
        let mut state = self.inner.write().await;
        if let Some(task) = state
            .map_tasks
            .iter_mut()
            .find(|t| t.input_filename == input_filename)
        {
            task.status = TaskStatus::Finished;
        }
    }

    /// Mark a reduce task FINISHED and record its output filename.
    pub async fn finish_reduce(&self, reduce_index: u32, output_filename: String) {
        let mut state = self.inner.write().await;
        if let Some(task) = state.reduce_tasks.get_mut(reduce_index as usize) {
            task.status = TaskStatus::Finished;
            task.output_filename = Some(output_filename);
        }
    }

    /// Demote an ALLOCATED map task back to UNALLOCATED. No-op if the task
    /// has already reached FINISHED (the watchdog losing the race is fine).
    pub async fn reset_map(&self, input_filename: &str) {
        let mut state = self.inner.write().await;
        if let Some(task) = state
            .map_tasks
            .iter_mut()
            .find(|t| t.input_filename == input_filename)
        {
            if task.status == TaskStatus::Allocated {
                task.status = TaskStatus::Unallocated;
            }
        }
    }

    pub async fn reset_reduce(&self, reduce_index: u32) {
        let mut state = self.inner.write().await;
        if let Some(task) = state.reduce_tasks.get_mut(reduce_index as usize) {
            if task.status == TaskStatus::Allocated {
                task.status = TaskStatus::Unallocated;
            }
        }
    }

    /// Append a shard file produced for `reduce_index`. Safe to call
    /// concurrently with `claim_reduce` because reduce tasks are never
    /// dispatched until the map phase is complete.
    ///
    /// Deduplicates by filename: a redispatched map task keeps its original
    /// `map_index`, so a zombie worker racing its replacement reports the
    /// same shard filename twice rather than two disjoint ones. Without
    /// this check that duplicate would be double-counted when the reduce
    /// task reads its shard list.
    pub async fn record_shard(&self, reduce_index: u32, filename: String) {
        let mut state = self.inner.write().await;
        if let Some(task) = state.reduce_tasks.get_mut(reduce_index as usize) {
            if !task.shard_files.contains(&filename) {
                task.shard_files.push(filename);
            }
        }
    }

    pub async fn map_done(&self) -> bool {
        let state = self.inner.read().await;
        state.map_tasks.iter().all(|t| t.status == TaskStatus::Finished)
    }

    pub async fn reduce_done(&self) -> bool {
        let state = self.inner.read().await;
        state
            .reduce_tasks
            .iter()
            .all(|t| t.status == TaskStatus::Finished)
    }

    pub async fn status_of_map(&self, input_filename: &str) -> Option<TaskStatus> {
        let state = self.inner.read().await;
        state
            .map_tasks
            .iter()
            .find(|t| t.input_filename == input_filename)
            .map(|t| t.status)
    }

    pub async fn status_of_reduce(&self, reduce_index: u32) -> Option<TaskStatus> {
        let state = self.inner.read().await;
        state.reduce_tasks.get(reduce_index as usize).map(|t| t.status)
    }

    /// All per-reducer output filenames, in reduce-index order, once every
    /// reduce task is FINISHED. Panics if called before `reduce_done()`.
    pub async fn reduce_outputs(&self) -> Vec<String> {
        let state = self.inner.read().await;
        state
            .reduce_tasks
            .iter()
            .map(|t| {
                t.output_filename
                    .clone()
                    .expect("reduce_outputs called before all reduce tasks finished")
            })
            .collect()
    }

    pub async fn unallocated_map_filenames(&self) -> Vec<String> {
        let state = self.inner.read().await;
        state
            .map_tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Unallocated)
            .map(|t| t.input_filename.clone())
            .collect()
    }

    pub async fn unallocated_reduce_indices(&self) -> Vec<u32> {
        let state = self.inner.read().await;
        state
            .reduce_tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.status == TaskStatus::Unallocated)
            .map(|(i, _)| i as u32)
            .collect()
    }
}
