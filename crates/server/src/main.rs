use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resow_core::{
    create_client_adapter, load_config, render_diff, reset_api_key, resolve_api_key,
    validate_config, validate_search_config, ApiKeyAuthenticator, Authenticator, Config, Metafile,
    Notifier, Pipeline, Scheduler, Store, TorznabClient,
};

use resow_server::api::create_router;
use resow_server::cli::{Cli, Command, SharedOptions};
use resow_server::state::AppState;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = tokio::runtime::Runtime::new().expect("Failed to start tokio runtime");
    if let Err(e) = runtime.block_on(run(cli)) {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::GenConfig { docker } => gen_config(&config_path, docker),
        Command::Tree { torrent } => {
            let meta = Metafile::load(&torrent)
                .with_context(|| format!("Failed to parse {}", torrent.display()))?;
            print!("{}", meta.render_tree());
            Ok(())
        }
        Command::Diff { a, b } => {
            let left =
                Metafile::load(&a).with_context(|| format!("Failed to parse {}", a.display()))?;
            let right =
                Metafile::load(&b).with_context(|| format!("Failed to parse {}", b.display()))?;
            print!("{}", render_diff(&left, &right));
            Ok(())
        }
        Command::ClearCache => {
            let (_config, store) = open_store(&config_path, &SharedOptions::default())?;
            let deleted = store.clear_decision_cache()?;
            info!(deleted, "Decision cache cleared");
            Ok(())
        }
        Command::ClearIndexerFailures => {
            let (_config, store) = open_store(&config_path, &SharedOptions::default())?;
            let cleared = store.clear_indexer_failures()?;
            info!(cleared, "Indexer failures cleared");
            Ok(())
        }
        Command::ApiKey => {
            let (config, store) = open_store(&config_path, &SharedOptions::default())?;
            println!("{}", resolve_api_key(&config, &store)?);
            Ok(())
        }
        Command::ResetApiKey => {
            let (_config, store) = open_store(&config_path, &SharedOptions::default())?;
            println!("{}", reset_api_key(&store)?);
            Ok(())
        }
        Command::TestNotification {
            notification_webhook_url,
        } => {
            let config = load_layered_config(&config_path, &SharedOptions::default())?;
            let url = notification_webhook_url.or(config.notification.webhook_url);
            if url.is_none() {
                bail!("No webhook URL configured");
            }
            let notifier = Notifier::new(url);
            notifier
                .send("resow", "Test notification")
                .await
                .context("Webhook delivery failed")?;
            info!("Test notification delivered");
            Ok(())
        }
        Command::Search(opts) => {
            let app = build_app(&config_path, &opts, true).await?;
            let summary = app.pipeline().bulk_search().await?;
            info!(
                matches = summary.matches,
                candidates = summary.candidates,
                "Search finished"
            );
            Ok(())
        }
        Command::Rss(opts) => {
            let app = build_app(&config_path, &opts, true).await?;
            let summary = app.pipeline().rss_scan().await?;
            info!(
                matches = summary.matches,
                candidates = summary.candidates,
                "RSS scan finished"
            );
            Ok(())
        }
        Command::Inject(opts) => {
            let app = build_app(&config_path, &opts, false).await?;
            let summary = app.pipeline().inject_saved().await?;
            info!(
                injected = summary.matches,
                artifacts = summary.candidates,
                "Inject finished"
            );
            Ok(())
        }
        Command::Daemon(opts) => daemon(&config_path, &opts).await,
    }
}

fn gen_config(path: &std::path::Path, docker: bool) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    std::fs::write(path, resow_core::config::example_config(docker))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Configuration written");
    Ok(())
}

fn load_layered_config(config_path: &std::path::Path, opts: &SharedOptions) -> Result<Config> {
    let mut config = if config_path.exists() {
        load_config(config_path)?
    } else {
        Config::default()
    };
    opts.apply(&mut config)?;
    Ok(config)
}

fn open_store(config_path: &std::path::Path, opts: &SharedOptions) -> Result<(Config, Store)> {
    let config = load_layered_config(config_path, opts)?;
    validate_config(&config)?;
    let store = Store::new(&config.database.path)?;
    Ok((config, store))
}

/// Assemble the full collaborator graph for search-running commands.
async fn build_app(
    config_path: &std::path::Path,
    opts: &SharedOptions,
    needs_sources: bool,
) -> Result<Arc<AppState>> {
    let config = load_layered_config(config_path, opts)?;
    if needs_sources {
        validate_search_config(&config)?;
    } else {
        validate_config(&config)?;
    }

    let store = Arc::new(Store::new(&config.database.path)?);
    let torznab = Arc::new(TorznabClient::new(
        config.search.search_timeout.as_duration(),
        config.search.snatch_timeout.as_duration(),
    )?);
    let client =
        create_client_adapter(&config.client, config.search.search_timeout.as_duration())?;
    let notifier = Arc::new(Notifier::new(config.notification.webhook_url.clone()));

    let pipeline = Arc::new(Pipeline::new(
        config.clone(),
        store.clone(),
        torznab.clone(),
        client,
        notifier,
    ));

    let authenticator: Arc<dyn Authenticator> =
        Arc::new(ApiKeyAuthenticator::resolve(&config, &store)?);

    Ok(Arc::new(AppState::new(
        config,
        authenticator,
        store,
        pipeline,
        torznab,
        None,
    )))
}

async fn daemon(config_path: &std::path::Path, opts: &SharedOptions) -> Result<()> {
    let config = load_layered_config(config_path, opts)?;
    validate_search_config(&config)?;

    let store = Arc::new(Store::new(&config.database.path)?);
    let torznab = Arc::new(TorznabClient::new(
        config.search.search_timeout.as_duration(),
        config.search.snatch_timeout.as_duration(),
    )?);
    let client =
        create_client_adapter(&config.client, config.search.search_timeout.as_duration())?;
    let notifier = Arc::new(Notifier::new(config.notification.webhook_url.clone()));
    let pipeline = Arc::new(Pipeline::new(
        config.clone(),
        store.clone(),
        torznab.clone(),
        client.clone(),
        notifier,
    ));

    // Startup probes: a misconfigured client or indexer set is fatal
    // before any loop starts.
    client
        .validate_config()
        .await
        .context("Torrent client probe failed")?;
    let indexers = pipeline
        .sync_indexers()
        .await
        .context("Indexer sync failed")?;
    info!(indexers = indexers.len(), "Startup probes complete");

    let scheduler = Arc::new(Scheduler::new(
        pipeline.clone(),
        store.clone(),
        config.search.search_cadence.map(|d| d.as_duration()),
        config.search.rss_cadence.map(|d| d.as_duration()),
    ));
    let handles = scheduler.start();

    let authenticator: Arc<dyn Authenticator> =
        Arc::new(ApiKeyAuthenticator::resolve(&config, &store)?);
    let state = Arc::new(AppState::new(
        config.clone(),
        authenticator,
        store,
        pipeline,
        torznab,
        Some(scheduler.clone()),
    ));

    if config.server.enabled {
        let addr = SocketAddr::new(config.server.host, config.server.port);
        let app = create_router(state);
        info!("Admin API listening on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(scheduler.clone()))
            .await
            .context("Server error")?;
    } else {
        info!("Admin API disabled, running scheduler only");
        shutdown_signal(scheduler.clone()).await;
    }

    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "Job loop ended abnormally");
        }
    }
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal(scheduler: Arc<Scheduler>) {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested, finishing in-flight work");
    scheduler.stop();
}
