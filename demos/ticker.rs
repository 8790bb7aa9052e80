use std::time::Duration;

use clap::Parser;
use ezbatch::{Agent, AgentConfig};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Reports a counter every 100ms and a gauge every 50ms until ctrl-c.
#[derive(Debug, Parser)]
struct Args {
    /// Account key
    key: String,
    #[arg(long, default_value = ezbatch::agent::DEFAULT_ENDPOINT)]
    endpoint: String,
    #[arg(long, value_parser = humantime::parse_duration, default_value = "1s")]
    interval: Duration,
    #[arg(long, default_value_t = 200)]
    max_batch_size: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let args = Args::parse();

    let config = AgentConfig::new(args.key)
        .with_endpoint(args.endpoint)
        .with_flush_interval(args.interval)
        .with_max_batch_size(args.max_batch_size)
        .with_verbose(true);
    let agent = Agent::new(config)?;

    let (quit_tx, quit_rx) = watch::channel(false);
    let mut producers = vec![];
    {
        let recorder = agent.recorder().clone();
        let mut quit = quit_rx.clone();
        producers.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = quit.changed() => return,
                    () = tokio::time::sleep(Duration::from_millis(100)) => {
                        if let Err(e) = recorder.record_counter("something", 5).await {
                            tracing::warn!(error = %e, "counter dropped");
                        }
                    }
                }
            }
        }));
    }
    {
        let recorder = agent.recorder().clone();
        let mut quit = quit_rx;
        producers.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = quit.changed() => return,
                    () = tokio::time::sleep(Duration::from_millis(50)) => {
                        if let Err(e) = recorder.record_gauge("whatever", 123.0).await {
                            tracing::warn!(error = %e, "gauge dropped");
                        }
                    }
                }
            }
        }));
    }

    tokio::signal::ctrl_c().await?;
    quit_tx.send_replace(true);
    for producer in producers {
        producer.await?;
    }
    agent.shutdown().await
}
