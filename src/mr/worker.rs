//! The worker driver loop. Workers are stateless between tasks and
//! interchangeable, no identity is ever reported to the coordinator.

use std::path::Path;
use std::time::Duration;

use tarpc::context;
use tracing::{error, info};

use crate::mr::codec::KeyValue;
use crate::mr::coordinator::{CoordinatorClient, TaskKind, TaskReply};
use crate::mr::error::MrError;
use crate::mr::partition::partition;
use crate::mr::store;

/// User-supplied map function: `(filename, contents) -> key/value pairs`.
/// Word count is the one concrete instance exercising it, in
/// `mr::function::wc`.
pub type MapFn = fn(&str, &str) -> Vec<KeyValue>;

/// User-supplied reduce function: `(key, values) -> folded value`.
pub type ReduceFn = fn(&str, Vec<&str>) -> String;

pub fn call_map_func(map_func: MapFn, filename: &str, contents: &str) -> Vec<KeyValue> {
    map_func(filename, contents)
}

pub fn call_reduce_func(reduce_func: ReduceFn, key: &str, values: Vec<&str>) -> String {
    reduce_func(key, values)
}

const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Runs the driver loop until the coordinator signals there is no more
/// work, or the RPC endpoint becomes unreachable. An unreachable
/// coordinator is read as "the job is over", not an error.
pub async fn run(
    client: &CoordinatorClient,
    work_dir: &Path,
    map_func: MapFn,
    reduce_func: ReduceFn,
) -> anyhow::Result<()> {
    loop {
        let reply = match client.request_task(context::current()).await {
            Ok(reply) => reply,
            Err(err) => {
                info!(error = %err, "coordinator unreachable, treating as shutdown signal");
                return Ok(());
            }
        };

        if reply.terminate {
            info!("coordinator reports all work finished, exiting");
            return Ok(());
        }

        match reply.kind {
            None => {
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Some(TaskKind::Map) => {
                if let Err(err) = run_map_task(client, work_dir, &reply, map_func).await {
                    error!(error = %err, "map task failed, leaving it for the watchdog to redispatch");
                }
            }
            Some(TaskKind::Reduce) => {
                if let Err(err) = run_reduce_task(client, work_dir, &reply, reduce_func).await {
                    error!(error = %err, "reduce task failed, leaving it for the watchdog to redispatch");
                }
            }
        }
    }
}

async fn run_map_task(
    client: &CoordinatorClient,
    work_dir: &Path,
    reply: &TaskReply,
    map_func: MapFn,
) -> Result<(), MrError> {
    let filename = reply.filename.clone().expect("map reply without filename");
    let map_index = reply.map_index.expect("map reply without map_index");

    // Input filenames are the paths given to the coordinator on the command
    // line, not shard/output files, so they are opened as-is rather than
    // joined onto `work_dir` (which only namespaces intermediate/output
    // files).
    let contents = store::read_file_contents(&filename).await?;
    let kvs = call_map_func(map_func, &filename, &contents);
    let shards = partition(kvs, reply.n_reduce);

    for (reduce_index, shard) in shards.into_iter().enumerate() {
        let shard_filename =
            store::write_shard(work_dir, map_index, reduce_index as u32, &shard).await?;
        let _ = client
            .report_intermediate(context::current(), reduce_index as u32, shard_filename)
            .await;
    }

    let _ = client
        .finish_map(context::current(), filename)
        .await;
    Ok(())
}

async fn run_reduce_task(
    client: &CoordinatorClient,
    work_dir: &Path,
    reply: &TaskReply,
    reduce_func: ReduceFn,
) -> Result<(), MrError> {
    let reduce_index = reply.reduce_index.expect("reduce reply without reduce_index");

    let mut kvs = Vec::new();
    for shard_filename in &reply.shard_files {
        kvs.extend(store::read_records(shard_filename).await?);
    }
    kvs.sort_by(|a, b| a.key.cmp(&b.key));

    let mut output = Vec::new();
    let mut group_start = 0;
    while group_start < kvs.len() {
        let key = &kvs[group_start].key;
        let mut group_end = group_start + 1;
        while group_end < kvs.len() && &kvs[group_end].key == key {
            group_end += 1;
        }
        let values: Vec<&str> = kvs[group_start..group_end]
            .iter()
            .map(|kv| kv.value.as_str())
            .collect();
        let folded = call_reduce_func(reduce_func, key, values);
        output.push(KeyValue::new(key.clone(), folded));
        group_start = group_end;
    }

    let output_filename = store::write_output(work_dir, reduce_index, &output).await?;
    let _ = client
        .finish_reduce(context::current(), reduce_index, output_filename)
        .await;
    Ok(())
}
