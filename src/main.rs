//! OneBot Bridge - QQ group <-> Minecraft server relay
//!
//! Connects to a OneBot v11 implementation over a forward websocket and to a
//! Minecraft server over RCON, relaying chat, lifecycle events and commands
//! between them.

mod bridge;
mod chat;
mod common;
mod config;
mod game;
mod protocol;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use backon::BackoffBuilder;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use bridge::Bridge;
use chat::{OneBotClient, OneBotConnection};
use common::{ChatEvent, GameEvent};
use config::{env::get_config_path, load_and_validate};
use game::{LogWatcher, RconClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("OneBot Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} exists and is properly formatted.", config_path);
        error!("See onebot-bridge.example.conf for reference.");
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  OneBot: {}", config.onebot.url);
    info!("  RCON: {}:{}", config.rcon.host, config.rcon.port);
    info!("  Server log: {}", config.server.log_path);
    info!("  Groups: {:?}", config.bridge.enable_groups);

    // ============================================================
    // Create adapters and the bridge
    // ============================================================

    let (chat_tx, mut chat_rx) = mpsc::unbounded_channel::<ChatEvent>();
    let (game_tx, mut game_rx) = mpsc::unbounded_channel::<GameEvent>();

    let (onebot, connection) = OneBotClient::new(config.onebot.clone(), chat_tx);
    let onebot = Arc::new(onebot);
    let rcon = Arc::new(RconClient::new(config.rcon.clone()));

    let bridge = Arc::new(Bridge::new(&config, onebot.clone(), rcon.clone()));

    // ============================================================
    // Spawn tasks
    // ============================================================

    // Task 1: OneBot websocket with reconnection
    let onebot_task = tokio::spawn(run_onebot(connection));

    // Task 2: Server log watcher
    let watcher = LogWatcher::new(&config.server);
    let watcher_task = tokio::spawn(async move {
        if let Err(e) = watcher.run(game_tx).await {
            error!("Log watcher stopped: {}", e);
        }
    });

    // Task 3: Chat -> Game. Each message gets its own task since rendering
    // waits on member lookups.
    let chat_dispatch = {
        let bridge = bridge.clone();
        tokio::spawn(async move {
            while let Some(event) = chat_rx.recv().await {
                let bridge = bridge.clone();
                tokio::spawn(async move {
                    bridge.handle_chat_event(event).await;
                });
            }
            info!("Chat event dispatch ended");
        })
    };

    // Task 4: Game -> Chat, in log order
    let game_dispatch = {
        let bridge = bridge.clone();
        tokio::spawn(async move {
            while let Some(event) = game_rx.recv().await {
                bridge.handle_game_event(&event);
            }
            info!("Game event dispatch ended");
        })
    };

    // ============================================================
    // Run until shutdown or a task exits
    // ============================================================
    tokio::select! {
        biased;
        _ = shutdown_signal() => info!("Shutdown signal received"),
        _ = onebot_task => warn!("OneBot task exited"),
        _ = watcher_task => warn!("Log watcher task exited"),
        _ = chat_dispatch => warn!("Chat dispatch task exited"),
        _ = game_dispatch => warn!("Game dispatch task exited"),
    }

    // Give queued outbound messages a moment to flush.
    if onebot.is_connected() {
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    info!("Exiting...");
    Ok(())
}

/// Create an exponential backoff iterator for websocket reconnection.
/// 1s initial, 5min max, factor 2, with jitter, unlimited retries.
fn onebot_backoff() -> impl Iterator<Item = Duration> {
    backon::ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(300))
        .with_factor(2.0)
        .with_jitter()
        .without_max_times()
        .build()
}

/// Keep the OneBot websocket connected.
async fn run_onebot(mut connection: OneBotConnection) {
    let mut backoff = onebot_backoff();

    loop {
        match connection.connect().await {
            Ok(ws) => {
                backoff = onebot_backoff(); // Reset backoff on successful connection

                match connection.run(ws).await {
                    Ok(()) => info!("OneBot connection closed"),
                    Err(e) => error!("OneBot connection error: {}", e),
                }
            }
            Err(e) => error!("Failed to connect to OneBot: {}", e),
        }

        let delay = backoff.next().unwrap_or(Duration::from_secs(300));
        info!("Reconnecting to OneBot in {:.1} seconds...", delay.as_secs_f64());
        tokio::time::sleep(delay).await;
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
