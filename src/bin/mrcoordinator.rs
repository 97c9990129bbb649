use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use futures::StreamExt;
use mapreduce_rs::mr::config::{Config, DEFAULT_ADDR};
use mapreduce_rs::mr::coordinator::{Coordinator, CoordinatorServer};
use mapreduce_rs::mr::error::MrError;
use mapreduce_rs::mr::registry::Registry;
use tarpc::{server::incoming::Incoming, tokio_serde::formats::Json};
use tracing::info;

/// Starts the MapReduce coordinator: partitions `input_files` across
/// `n_reduce` reducers and serves worker RPCs until every task is FINISHED.
#[derive(Parser, Debug)]
#[command(name = "mrcoordinator", version, about)]
struct Args {
    /// Number of reduce tasks (shards).
    #[arg(long, short = 'r')]
    n_reduce: i64,

    /// Directory for intermediate shards, per-reducer output, and the
    /// final merged file. Defaults to the current directory.
    #[arg(long, default_value = ".")]
    work_dir: PathBuf,

    /// Address to serve worker RPCs on.
    #[arg(long, default_value = DEFAULT_ADDR)]
    addr: SocketAddr,

    /// Input files to map over.
    #[arg(required = true)]
    input_files: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    if args.input_files.is_empty() {
        return Err(MrError::NoInputFiles.into());
    }
    let config = Config::new(args.work_dir, args.n_reduce)?;

    info!(
        n_reduce = config.n_reduce,
        input_files = args.input_files.len(),
        addr = %args.addr,
        "starting coordinator"
    );

    let registry = Registry::new(args.input_files, config.n_reduce);
    let (server, phase_driver) = CoordinatorServer::new(registry, config);

    let listener = tarpc::serde_transport::tcp::listen(args.addr, Json::default).await?;
    tokio::spawn(
        listener
            .filter_map(|conn| async { conn.ok() })
            .map(tarpc::server::BaseChannel::with_defaults)
            .map(|channel| channel.execute(server.clone().serve()))
            .buffer_unordered(250)
            .for_each(|_| async {}),
    );

    info!("coordinator RPC server listening, waiting for workers");

    phase_driver.run().await;

    info!("map-reduce job complete");
    Ok(())
}
