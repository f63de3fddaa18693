use clap::Parser;
use incgraph::{app::AppKind, cluster::run_configured, config::load_config};
use incgraph_api::core::utils::logging::init_global_logger;
use serde::Serialize;
use std::{path::PathBuf, process::ExitCode};
use tracing::{error, info};

#[derive(Parser, Debug, Serialize)]
#[command(version, about = "Incremental traversal over a partitioned graph")]
struct Args {
    /// Config file (toml, json or yaml) layered under the flags
    #[arg(long, env = "INCGRAPH_CONFIG")]
    #[serde(skip)]
    config: Option<PathBuf>,

    /// Edge file of `src dst [weight]` lines
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    efile: Option<PathBuf>,

    /// Optional vertex file of `oid` lines
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    vfile: Option<PathBuf>,

    /// Update file of `a src dst [weight]` and `d src dst` lines
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    efile_update: Option<PathBuf>,

    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    delimiter: Option<String>,

    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    directed: Option<bool>,

    /// Number of fragments
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    fnum: Option<usize>,

    /// Compute threads per fragment
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_num: Option<usize>,

    /// Balance vertices between threads with small work-stealing chunks
    #[arg(long, env = "INCGRAPH_WIDE_PARALLELISM")]
    #[serde(skip_serializing_if = "Option::is_none")]
    wide_parallelism: Option<bool>,

    #[arg(long, value_enum)]
    #[serde(skip_serializing_if = "Option::is_none")]
    application: Option<AppKind>,

    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    sssp_source: Option<u64>,

    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    bfs_source: Option<u64>,

    /// Directory receiving one `result_frag_<fid>` file per fragment
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    out_prefix: Option<PathBuf>,

    #[arg(long, env = "INCGRAPH_LOG_LEVEL")]
    #[serde(skip_serializing_if = "Option::is_none")]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let overrides = match serde_json::to_value(&args) {
        Ok(overrides) => overrides,
        Err(err) => {
            eprintln!("Failed to read arguments: {err}");
            return ExitCode::FAILURE;
        }
    };
    let config = match load_config(Some(overrides), args.config.clone()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    init_global_logger(config.log_level.clone());

    match run_configured(&config) {
        Ok(lines) => {
            if config.out_prefix.is_none() {
                for line in lines {
                    println!("{line}");
                }
            }
            info!("Done");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
