//! Serve an eager executor over TCP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use entmoot::config::ServerConfig;
use entmoot::transport::Server;
use entmoot::{logging, EagerExecutor, ExecutorService};

#[derive(Parser, Debug)]
#[command(name = "entmoot-server")]
#[command(about = "Executor service over line-delimited JSON", version)]
struct Cli {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides the config file)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Evaluator call depth limit (overrides the config file)
    #[arg(long)]
    max_call_depth: Option<usize>,

    /// Log every evaluated node at trace level
    #[arg(long)]
    trace_evaluation: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                ServerConfig::from_json(&text)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => ServerConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(depth) = self.max_call_depth {
            config.max_call_depth = depth;
        }
        config.trace_evaluation |= self.trace_evaluation;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    logging::init(&config.log_filter);

    let executor = EagerExecutor::with_context(config.eval_context());
    let service = Arc::new(ExecutorService::new(executor));
    let server = Server::bind(config.bind, Arc::clone(&service))
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!(addr = %server.local_addr()?, "entmoot-server started");

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }
    service.shutdown();
    Ok(())
}
