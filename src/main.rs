//! Proof-of-work miner - main application
//!
//! Mines blocks on an in-process chain until interrupted or until the
//! requested number of blocks has been found.

use pow_miner::{
    chain::MemoryChain,
    config::Config,
    miner::{MinerEvent, MiningEngine},
    utils::{format_duration, format_hash_rate, init_logging},
    worker::WorkerFactory,
    Error, Result, APP_DESCRIPTION, APP_NAME, APP_VERSION,
};

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

/// Runs the engine until `config.blocks` blocks are mined or ctrl-c
async fn run(config: Config) -> Result<()> {
    let network = config.network();
    let chain = Arc::new(MemoryChain::new(network.clone())?);

    let searcher = WorkerFactory::create(
        config.worker,
        config.thread_count,
        &config.external_worker_cmd,
        config.external_timeout_duration()?,
    )?;

    let engine = MiningEngine::new(
        chain.clone(),
        chain.clone(),
        searcher,
        config.miner_options()?,
    );

    let mut events = engine.subscribe();
    let notifier = engine.attach(chain.subscribe());

    info!(
        "Mining on {} from {} (height {}), worker={}",
        network.kind,
        chain.tip().hash(),
        chain.height(),
        config.worker
    );

    let started = Instant::now();
    let mut mined = 0u64;
    engine.start().await?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let outcome = loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received interrupt, stopping");
                break Ok(());
            }
            event = events.recv() => match event {
                Ok(MinerEvent::Block { block, entry }) => {
                    mined += 1;
                    info!(
                        "Mined block {} at height {} ({} transactions)",
                        entry.hash(),
                        entry.height(),
                        block.transactions.len()
                    );
                    if config.blocks > 0 && mined >= config.blocks {
                        break Ok(());
                    }
                }
                Ok(MinerEvent::Status(status)) => {
                    info!(
                        "Job {} at height {}: {} after {} hashes",
                        status.job_id,
                        status.height,
                        format_hash_rate(status.hash_rate.value()),
                        status.hashes
                    );
                }
                Ok(MinerEvent::Error(err)) => {
                    error!("Mining stopped ({}): {}", err.category(), err);
                    break Err(Error::Engine(err));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event stream lagged, skipped {}", skipped);
                }
                Err(RecvError::Closed) => break Ok(()),
            }
        }
    };

    engine.stop().await;
    notifier.abort();

    info!(
        "Mined {} blocks in {}, tip {} at height {}",
        mined,
        format_duration(started.elapsed().as_secs()),
        chain.tip().hash(),
        chain.height()
    );

    outcome
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().await?;

    if config.info {
        print_info();
        return Ok(());
    }

    if config.print_config {
        print_configuration(&config)?;
        return Ok(());
    }

    let _guard = init_logging(config.log_level, config.log_format, config.log_file.as_deref())?;

    info!("Starting {} v{}", APP_NAME, APP_VERSION);
    run(config).await
}

/// Print basic program information
fn print_info() {
    println!("{} v{}", APP_NAME, APP_VERSION);
    println!("{}", APP_DESCRIPTION);
}

/// Print current configuration
fn print_configuration(config: &Config) -> Result<()> {
    let config_yaml = serde_yaml::to_string(config)?;
    println!("{}", config_yaml);
    Ok(())
}
