mod allocator;
mod api;
mod context;
mod dispatcher;
mod event_source;
mod orchestrator;
mod recycler;

use anyhow::{Context, Result};
use clap::Parser;
use context::AllocatorContext;
use dispatcher::Dispatcher;
use event_source::{ChannelEventSource, EventSource};
use lb_core::config::Config;
use lb_store::{RedisStore, Store};
use orchestrator::LoggingOrchestratorClient;
use recycler::Recycler;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "lb-controller")]
#[command(about = "Shares a tenant's cloud load balancers across its services")]
struct Cli {
    /// Path to the JSON config file.
    #[arg(short, long, default_value = "config.json")]
    config: String,
}

const HTTP_DRAIN_SECS: u64 = 15;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            log::error!("fatal config error: {err}");
            std::process::exit(1);
        }
    };
    let config = Arc::new(config);

    let store: Arc<dyn Store> = Arc::new(
        RedisStore::connect(&config.redis, &config.key_prefix)
            .await
            .context("connecting to redis")?,
    );
    let provider = lb_provider::build_provider(&config.cloud);
    let orchestrator = Arc::new(LoggingOrchestratorClient);

    let cancel = CancellationToken::new();
    let (orphan_lb_tx, orphan_lb_rx) = mpsc::channel(config.channel_size);

    let ctx = AllocatorContext::new(
        store.clone(),
        provider.clone(),
        orchestrator,
        config.clone(),
        orphan_lb_tx,
    );

    let dispatcher = Dispatcher::new(config.channel_size, cancel.clone());
    let worker_count = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);

    let (debug_tx, mut event_source): (_, Box<dyn EventSource>) = {
        let (tx, source) = ChannelEventSource::new(config.channel_size);
        (tx, Box::new(source))
    };
    let debug_event_tx = config.debug.then_some(debug_tx);

    let app_state = api::AppState {
        store: store.clone(),
        debug_event_tx,
    };
    let http_addr = format!("{}:{}", config.addr, config.port);

    let dispatcher_handle = tokio::spawn({
        let dispatcher = dispatcher.clone();
        let ctx = ctx.clone();
        async move { dispatcher.run(ctx, worker_count).await }
    });

    let recycler_handle = if config.auto_clean {
        let recycler = Recycler::new(store.clone(), provider.clone());
        let interval = Duration::from_secs(config.recycle_interval_secs);
        let cancel = cancel.clone();
        Some(tokio::spawn(
            async move { recycler.run(interval, orphan_lb_rx, cancel).await },
        ))
    } else {
        None
    };

    let pump_handle = tokio::spawn({
        let sender = dispatcher.sender();
        let cancel = cancel.clone();
        async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = event_source.recv() => {
                        match event {
                            Some(event) => {
                                if sender.send(event).await.is_err() {
                                    log::error!("dispatcher queue closed, stopping event pump");
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                }
            }
            event_source.close();
        }
    });

    let http_handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { api::serve(&http_addr, app_state, cancel, HTTP_DRAIN_SECS).await }
    });

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("installing SIGTERM handler")?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => log::info!("received SIGINT"),
        _ = sigterm.recv() => log::info!("received SIGTERM"),
    }

    log::info!("shutting down");
    cancel.cancel();

    if let Err(err) = http_handle.await {
        log::warn!("http server task panicked: {err}");
    }
    let _ = pump_handle.await;
    let _ = dispatcher_handle.await;
    if let Some(handle) = recycler_handle {
        let _ = handle.await;
    }
    drop(store);

    Ok(())
}
