// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `anonmatch serve` command implementation.
//!
//! Wires storage, the Telegram transport, the OTP mailer and the optional
//! media classifier into a [`MatchingEngine`], then runs the update
//! dispatcher with its background workers and the health gateway until a
//! shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use anonmatch_bot::workers::{spawn_maintenance, spawn_queue_worker, MAINTENANCE_PERIOD};
use anonmatch_bot::{shutdown, BotContext, Dispatcher, Router};
use anonmatch_config::AnonmatchConfig;
use anonmatch_core::{
    AnonmatchError, ChannelAdapter, CommunityStore, ContentClassifier, OtpMailer, PluginAdapter,
    StorageAdapter,
};
use anonmatch_email::SmtpMailer;
use anonmatch_gateway::GatewayState;
use anonmatch_matching::sightengine::SightengineClassifier;
use anonmatch_matching::MatchingEngine;
use anonmatch_prometheus::PrometheusAdapter;
use anonmatch_storage::SqliteStorage;
use anonmatch_telegram::TelegramChannel;

/// Runs the bot until SIGINT/SIGTERM.
pub async fn run_serve(config: AnonmatchConfig) -> Result<(), AnonmatchError> {
    init_tracing(config.bot.effective_log_level());

    info!("starting anonmatch serve");

    // Initialize Prometheus metrics (if enabled).
    let prometheus = if config.prometheus.enabled {
        match PrometheusAdapter::new() {
            Ok(adapter) => Some(adapter),
            Err(e) => {
                warn!(error = %e, "prometheus initialization failed, continuing without metrics");
                None
            }
        }
    } else {
        debug!("prometheus metrics disabled by configuration");
        None
    };

    // Built before storage so a bad token never touches the database.
    let mut telegram = TelegramChannel::new(&config.bot).inspect_err(|e| {
        error!(error = %e, "failed to initialize Telegram channel");
    })?;

    // Initialize storage; runs migrations.
    let sqlite = {
        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        Arc::new(storage)
    };
    let storage: Arc<dyn StorageAdapter + Send + Sync> = sqlite.clone();
    let community: Arc<dyn CommunityStore + Send + Sync> = sqlite.clone();

    let mailer: Arc<dyn OtpMailer + Send + Sync> = Arc::new(SmtpMailer::new(&config.smtp)?);

    let classifier: Option<Arc<dyn ContentClassifier + Send + Sync>> =
        if config.moderation.is_enabled() {
            match SightengineClassifier::new(&config.moderation) {
                Ok(c) => {
                    info!("media moderation enabled");
                    Some(Arc::new(c))
                }
                Err(e) => {
                    warn!(error = %e, "moderation client failed to build, media passes unchecked");
                    None
                }
            }
        } else {
            info!("media moderation disabled (no api credentials)");
            None
        };

    telegram.connect().await?;
    let channel: Arc<dyn ChannelAdapter + Send + Sync> = Arc::new(telegram);
    info!("telegram channel connected");

    // Install signal handler.
    let cancel = shutdown::install_signal_handler();

    let engine = MatchingEngine::new(
        &config,
        storage.clone(),
        channel.clone(),
        classifier,
        mailer,
        cancel.clone(),
    );
    let restored = engine.restore().await?;
    info!(restored, "waiting pool restored");

    let config = Arc::new(config);
    let ctx = BotContext::new(engine.clone(), community, config.clone(), cancel.clone());
    let dispatcher = Dispatcher::new(Router::new(ctx.clone()), &config.bot);

    // Health gateway.
    let gateway = if config.gateway.enabled {
        let mut state = GatewayState::new(storage.clone());
        if let Some(adapter) = &prometheus {
            let handle = adapter.handle().clone();
            state = state.with_metrics(Arc::new(move || handle.render()));
        }
        let matcher = engine.matcher.clone();
        state = state.with_queue_size(Arc::new(move || {
            let matcher = matcher.clone();
            async move { matcher.pool_size().await }.boxed()
        }));

        let gateway_config = config.gateway.clone();
        let server_state = state.clone();
        let gateway_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) =
                anonmatch_gateway::start_server(&gateway_config, server_state, gateway_cancel).await
            {
                error!(error = %e, "health gateway failed");
            }
        });
        Some((state, handle))
    } else {
        debug!("health gateway disabled by configuration");
        None
    };

    let background = vec![
        spawn_queue_worker(
            ctx.clone(),
            Duration::from_secs(config.matching.queue_tick_secs),
            cancel.clone(),
        ),
        spawn_maintenance(ctx, dispatcher.locks(), MAINTENANCE_PERIOD, cancel.clone()),
    ];

    if let Some((state, _)) = &gateway {
        state.set_accepting(true);
    }
    let result = dispatcher.run(channel.clone(), cancel.clone()).await;

    // Intake stopped; make sure everything else winds down too.
    if let Some((state, _)) = &gateway {
        state.set_accepting(false);
    }
    cancel.cancel();

    let drain_timeout = Duration::from_secs(config.bot.drain_timeout_secs);
    shutdown::drain_engine(&engine, drain_timeout).await;
    if tokio::time::timeout(drain_timeout, futures::future::join_all(background))
        .await
        .is_err()
    {
        warn!("background workers did not stop in time");
    }
    if let Some((_, handle)) = gateway {
        if let Err(e) = handle.await {
            warn!(error = %e, "health gateway task failed");
        }
    }

    if let Err(e) = channel.shutdown().await {
        warn!(error = %e, "telegram shutdown failed");
    }
    if let Err(e) = sqlite.close().await {
        warn!(error = %e, "storage checkpoint failed");
    }

    result?;
    info!("anonmatch serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber. `RUST_LOG` takes precedence.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("anonmatch={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
