//! In-process integration tests driving the coordinator/registry/watchdog
//! together, without going over the RPC wire (see DESIGN.md "open question
//! decisions" for why). Each test plays the part of one or more workers by
//! calling the `Coordinator` trait methods directly on a cloned
//! `CoordinatorServer`.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use mapreduce_rs::mr::codec::KeyValue;
use mapreduce_rs::mr::config::Config;
use mapreduce_rs::mr::coordinator::{Coordinator, CoordinatorServer, TaskKind, TaskReply};
use mapreduce_rs::mr::function::wc;
use mapreduce_rs::mr::partition::partition;
use mapreduce_rs::mr::registry::Registry;
use mapreduce_rs::mr::store;
use tarpc::context;

/// Runs one simulated worker to completion, executing whatever task kind
/// the coordinator hands back until the terminal reply arrives. Mirrors
/// `mr::worker::run`'s loop, but against `CoordinatorServer` directly.
async fn run_worker(server: &CoordinatorServer, work_dir: &Path) {
    loop {
        let reply = server.clone().request_task(context::current()).await;
        if reply.terminate {
            return;
        }
        match reply.kind {
            None => tokio::time::sleep(Duration::from_millis(10)).await,
            Some(TaskKind::Map) => run_map(server, work_dir, &reply).await,
            Some(TaskKind::Reduce) => run_reduce(server, work_dir, &reply).await,
        }
    }
}

async fn run_map(server: &CoordinatorServer, work_dir: &Path, reply: &TaskReply) {
    let filename = reply.filename.clone().unwrap();
    let map_index = reply.map_index.unwrap();
    let contents = store::read_file_contents(&filename).await.unwrap();
    let kvs = wc::map(&filename, &contents);
    let shards = partition(kvs, reply.n_reduce);
    for (reduce_index, shard) in shards.into_iter().enumerate() {
        let shard_filename = store::write_shard(work_dir, map_index, reduce_index as u32, &shard)
            .await
            .unwrap();
        server
            .clone()
            .report_intermediate(context::current(), reduce_index as u32, shard_filename)
            .await;
    }
    server.clone().finish_map(context::current(), filename).await;
}

async fn run_reduce(server: &CoordinatorServer, work_dir: &Path, reply: &TaskReply) {
    let reduce_index = reply.reduce_index.unwrap();
    let mut kvs = Vec::new();
    for shard_filename in &reply.shard_files {
        kvs.extend(store::read_records(shard_filename).await.unwrap());
    }
    kvs.sort_by(|a, b| a.key.cmp(&b.key));

    let mut output = Vec::new();
    let mut start = 0;
    while start < kvs.len() {
        let key = kvs[start].key.clone();
        let mut end = start + 1;
        while end < kvs.len() && kvs[end].key == key {
            end += 1;
        }
        let values: Vec<&str> = kvs[start..end].iter().map(|kv| kv.value.as_str()).collect();
        output.push(KeyValue::new(key, wc::reduce("", values)));
        start = end;
    }

    let output_filename = store::write_output(work_dir, reduce_index, &output).await.unwrap();
    server
        .clone()
        .finish_reduce(context::current(), reduce_index, output_filename)
        .await;
}

fn word_counts(final_contents: &str) -> HashMap<String, u32> {
    final_contents
        .lines()
        .filter_map(|line| line.split_once(' '))
        .map(|(k, v)| (k.to_string(), v.parse().unwrap()))
        .collect()
}

#[tokio::test]
async fn smoke_two_files_two_reducers_produce_correct_counts() {
    let dir = tempfile::tempdir().unwrap();
    let file_a = dir.path().join("a.txt");
    let file_b = dir.path().join("b.txt");
    tokio::fs::write(&file_a, "the quick brown fox").await.unwrap();
    tokio::fs::write(&file_b, "the lazy dog the fox").await.unwrap();

    let config = Config::new(dir.path().to_path_buf(), 2).unwrap();
    let registry = Registry::new(
        vec![
            file_a.to_string_lossy().into_owned(),
            file_b.to_string_lossy().into_owned(),
        ],
        config.n_reduce,
    );
    let (server, phase_driver) = CoordinatorServer::new(registry, config);

    let driver_task = tokio::spawn(phase_driver.run());
    run_worker(&server, dir.path()).await;
    driver_task.await.unwrap();

    assert!(server.is_done());
    let final_contents = store::read_file_contents(store::final_path(dir.path()))
        .await
        .unwrap();
    let counts = word_counts(&final_contents);
    assert_eq!(counts.get("the"), Some(&3));
    assert_eq!(counts.get("fox"), Some(&2));
    assert_eq!(counts.get("quick"), Some(&1));
    assert_eq!(counts.get("dog"), Some(&1));
}

#[tokio::test]
async fn single_reducer_still_merges_every_map_output() {
    let dir = tempfile::tempdir().unwrap();
    let file_a = dir.path().join("a.txt");
    tokio::fs::write(&file_a, "alpha beta alpha").await.unwrap();

    let config = Config::new(dir.path().to_path_buf(), 1).unwrap();
    let registry = Registry::new(vec![file_a.to_string_lossy().into_owned()], config.n_reduce);
    let (server, phase_driver) = CoordinatorServer::new(registry, config);

    let driver_task = tokio::spawn(phase_driver.run());
    run_worker(&server, dir.path()).await;
    driver_task.await.unwrap();

    let final_contents = store::read_file_contents(store::final_path(dir.path()))
        .await
        .unwrap();
    let counts = word_counts(&final_contents);
    assert_eq!(counts.get("alpha"), Some(&2));
    assert_eq!(counts.get("beta"), Some(&1));
}

#[tokio::test]
async fn empty_input_set_produces_an_empty_final_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::new(dir.path().to_path_buf(), 3).unwrap();
    let registry = Registry::new(vec![], config.n_reduce);
    let (server, phase_driver) = CoordinatorServer::new(registry, config);

    let driver_task = tokio::spawn(phase_driver.run());
    run_worker(&server, dir.path()).await;
    driver_task.await.unwrap();

    let final_contents = store::read_file_contents(store::final_path(dir.path()))
        .await
        .unwrap();
    assert!(final_contents.is_empty());
}

#[tokio::test]
async fn a_dead_workers_map_task_is_redispatched_and_completed_by_another() {
    let dir = tempfile::tempdir().unwrap();
    let file_a = dir.path().join("a.txt");
    tokio::fs::write(&file_a, "only one word here").await.unwrap();

    let config = Config::new(dir.path().to_path_buf(), 1)
        .unwrap()
        .with_watchdog_deadline(Duration::from_millis(30));
    let registry = Registry::new(vec![file_a.to_string_lossy().into_owned()], config.n_reduce);
    let (server, phase_driver) = CoordinatorServer::new(registry, config);
    let driver_task = tokio::spawn(phase_driver.run());

    // First worker claims the map task and then "crashes" without ever
    // reporting back.
    let first_reply = server.clone().request_task(context::current()).await;
    assert_eq!(first_reply.kind, Some(TaskKind::Map));
    let first_map_index = first_reply.map_index.unwrap();

    // Wait past the watchdog deadline, then let a second worker pick it up.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let second_reply = server.clone().request_task(context::current()).await;
    assert_eq!(second_reply.kind, Some(TaskKind::Map));
    assert_eq!(
        second_reply.map_index, Some(first_map_index),
        "redispatch must keep the original map_index stable"
    );
    run_reduce_or_map(&server, dir.path(), &second_reply).await;

    run_worker(&server, dir.path()).await;
    driver_task.await.unwrap();

    let final_contents = store::read_file_contents(store::final_path(dir.path()))
        .await
        .unwrap();
    let counts = word_counts(&final_contents);
    assert_eq!(counts.get("one"), Some(&1));
}

async fn run_reduce_or_map(server: &CoordinatorServer, work_dir: &Path, reply: &TaskReply) {
    match reply.kind {
        Some(TaskKind::Map) => run_map(server, work_dir, reply).await,
        Some(TaskKind::Reduce) => run_reduce(server, work_dir, reply).await,
        None => {}
    }
}

#[tokio::test]
async fn duplicate_finish_from_a_stale_worker_does_not_double_count() {
    let dir = tempfile::tempdir().unwrap();
    let file_a = dir.path().join("a.txt");
    tokio::fs::write(&file_a, "echo echo echo").await.unwrap();

    let config = Config::new(dir.path().to_path_buf(), 1)
        .unwrap()
        .with_watchdog_deadline(Duration::from_millis(30));
    let registry = Registry::new(vec![file_a.to_string_lossy().into_owned()], config.n_reduce);
    let (server, phase_driver) = CoordinatorServer::new(registry, config);
    let driver_task = tokio::spawn(phase_driver.run());

    let zombie_reply = server.clone().request_task(context::current()).await;
    assert_eq!(zombie_reply.kind, Some(TaskKind::Map));

    // The watchdog fires and hands the same map_index to a fresh worker,
    // which finishes it normally first.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let live_reply = server.clone().request_task(context::current()).await;
    assert_eq!(live_reply.kind, Some(TaskKind::Map));
    run_map(&server, dir.path(), &live_reply).await;

    // The zombie worker finally wakes up and replays the same work against
    // the same map_index, reporting the identical shard filename back.
    run_map(&server, dir.path(), &zombie_reply).await;

    run_worker(&server, dir.path()).await;
    driver_task.await.unwrap();

    let final_contents = store::read_file_contents(store::final_path(dir.path()))
        .await
        .unwrap();
    let counts = word_counts(&final_contents);
    assert_eq!(
        counts.get("echo"),
        Some(&3),
        "a replayed report_intermediate/finish_map must not inflate the count"
    );
}

#[tokio::test]
async fn a_key_spread_across_many_files_is_summed_in_one_reducer() {
    let dir = tempfile::tempdir().unwrap();
    let mut input_files = Vec::new();
    for i in 0..5 {
        let path = dir.path().join(format!("part-{}.txt", i));
        tokio::fs::write(&path, "shared shared unique").await.unwrap();
        input_files.push(path.to_string_lossy().into_owned());
    }

    let config = Config::new(dir.path().to_path_buf(), 4).unwrap();
    let registry = Registry::new(input_files, config.n_reduce);
    let (server, phase_driver) = CoordinatorServer::new(registry, config);

    let driver_task = tokio::spawn(phase_driver.run());
    run_worker(&server, dir.path()).await;
    driver_task.await.unwrap();

    let final_contents = store::read_file_contents(store::final_path(dir.path()))
        .await
        .unwrap();
    let counts = word_counts(&final_contents);
    assert_eq!(counts.get("shared"), Some(&10));
    assert_eq!(counts.get("unique"), Some(&5));
}
