use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use mapreduce_rs::mr::config::DEFAULT_ADDR;
use mapreduce_rs::mr::coordinator::CoordinatorClient;
use mapreduce_rs::mr::function::wc;
use mapreduce_rs::mr::worker;
use tarpc::{client, tokio_serde::formats::Json};
use tracing::{error, info};

/// Runs one worker process: repeatedly asks the coordinator for a task,
/// executes it, and reports back, until told there is no more work.
#[derive(Parser, Debug)]
#[command(name = "mrworker", version, about)]
struct Args {
    /// Coordinator RPC address.
    #[arg(long, default_value = DEFAULT_ADDR)]
    addr: SocketAddr,

    /// Directory for intermediate shards and per-reducer output.
    #[arg(long, default_value = ".")]
    work_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let transport = match tarpc::serde_transport::tcp::connect(args.addr, Json::default).await {
        Ok(transport) => transport,
        Err(err) => {
            error!(error = %err, addr = %args.addr, "failed to connect to coordinator");
            return Ok(());
        }
    };
    let client = CoordinatorClient::new(client::Config::default(), transport).spawn();

    info!(addr = %args.addr, "worker connected, starting driver loop");
    worker::run(&client, &args.work_dir, wc::map, wc::reduce).await
}
