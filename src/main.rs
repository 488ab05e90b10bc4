use std::{process, sync::Arc};

use serde::Serialize;
use tracing::{Dispatch, Level, debug, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use uuid::Uuid;
use vitrine::{
    application::{
        engine::{BackgroundEngine, BackgroundStores, EngineConfig},
        error::AppError,
        prefetch::PrefetchScheduler,
        view::{BackgroundFrame, BackgroundView},
    },
    config,
    domain::{
        media::MediaItem,
        zones::{self, ZoneConfig},
    },
    infra::{db::PostgresRepositories, error::InfraError, images::HttpImageDecoder, telemetry},
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let chain = error.report().chain();
    if dispatcher::has_been_set() {
        error!(error = %chain, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %chain, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::validation(format!("invalid configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        config::Command::Resolve(args) => run_resolve(&settings, args).await,
        config::Command::Warm => run_warm(&settings).await,
        config::Command::Watch(args) => run_watch(&settings, args).await,
        config::Command::Migrate => run_migrate(&settings).await,
    }
}

#[derive(Serialize)]
struct ResolvedBackground<'a> {
    page_key: &'a str,
    session_id: Uuid,
    media: Option<MediaItem>,
    width: Option<u32>,
    height: Option<u32>,
    zone: ZoneConfig,
}

async fn run_resolve(settings: &config::Settings, args: config::ResolveArgs) -> Result<(), AppError> {
    let page_key = validated_page_key(&args.page)?;
    let engine = build_engine(settings).await?;

    let media = engine.preload_for_page(page_key, args.force).await;
    let decoded = engine.get_cached(page_key).map(|entry| entry.image);
    let resolved = ResolvedBackground {
        page_key,
        session_id: engine.session_id(),
        width: decoded.as_ref().map(|image| image.width()),
        height: decoded.as_ref().map(|image| image.height()),
        media,
        zone: engine.zone_config(page_key).await,
    };

    let output = serde_json::to_string_pretty(&resolved)
        .map_err(|err| AppError::unexpected(format!("failed to encode background: {err}")))?;
    println!("{output}");
    Ok(())
}

async fn run_warm(settings: &config::Settings) -> Result<(), AppError> {
    let engine = build_engine(settings).await?;
    let pages = &settings.background.known_pages;

    info!(target = "vitrine::warm", pages = pages.len(), "warming backgrounds");
    engine.preload_multiple(pages).await;

    let mut missing = 0usize;
    for page_key in pages {
        match engine.get_cached(page_key) {
            Some(entry) => info!(
                target = "vitrine::warm",
                page_key = %page_key,
                media_id = %entry.media.id,
                "background ready"
            ),
            None => {
                missing += 1;
                warn!(target = "vitrine::warm", page_key = %page_key, "no background available");
            }
        }
    }

    info!(
        target = "vitrine::warm",
        warmed = pages.len() - missing,
        missing,
        "warm completed"
    );
    Ok(())
}

async fn run_watch(settings: &config::Settings, args: config::WatchArgs) -> Result<(), AppError> {
    let page_key = validated_page_key(&args.page)?.to_string();
    let engine = build_engine(settings).await?;

    let scheduler = PrefetchScheduler::new(engine.clone(), settings.background.known_pages.clone())
        .with_delay(settings.background.prefetch_delay);
    scheduler.on_navigate(&page_key).await;

    let view = BackgroundView::spawn(engine, page_key.clone());
    let mut frames = view.subscribe();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        target = "vitrine::watch",
        page_key = view.page_key(),
        prefetched = ?scheduler.known_pages(),
        "watching background; press Ctrl-C to stop"
    );
    loop {
        tokio::select! {
            changed = frames.changed() => match changed {
                Ok(()) => log_frame(&page_key, &frames.borrow_and_update()),
                Err(_) => {
                    info!(target = "vitrine::watch", page_key = %page_key, "background is not rotating");
                    (&mut shutdown).await.map_err(InfraError::from)?;
                    break;
                }
            },
            signal = &mut shutdown => {
                signal.map_err(InfraError::from)?;
                break;
            }
        }
    }

    info!(target = "vitrine::watch", page_key = %page_key, "watch stopped");
    Ok(())
}

async fn run_migrate(settings: &config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(settings).await?;
    PostgresRepositories::run_migrations(repositories.pool())
        .await
        .map_err(InfraError::from)?;
    info!(target = "vitrine::migrate", "migrations applied");
    Ok(())
}

fn log_frame(page_key: &str, frame: &BackgroundFrame) {
    match frame.current.as_ref() {
        Some(media) => info!(
            target = "vitrine::watch",
            page_key,
            generation = frame.generation,
            media_id = %media.id,
            url = %media.url,
            previous = ?frame.previous.as_ref().map(|previous| previous.id),
            transition = ?frame.transition,
            "background frame"
        ),
        None => info!(
            target = "vitrine::watch",
            page_key,
            generation = frame.generation,
            "placeholder frame"
        ),
    }
}

fn validated_page_key(page: &str) -> Result<&str, AppError> {
    zones::normalize_page_key(page).map_err(AppError::from)
}

async fn init_repositories(settings: &config::Settings) -> Result<PostgresRepositories, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let repositories = PostgresRepositories::new(pool);
    repositories
        .health_check()
        .await
        .map_err(InfraError::from)?;
    debug!(
        target = "vitrine::db",
        max_connections = settings.database.max_connections.get(),
        "database reachable"
    );
    Ok(repositories)
}

async fn build_engine(settings: &config::Settings) -> Result<Arc<BackgroundEngine>, AppError> {
    let repositories = Arc::new(init_repositories(settings).await?);
    let decoder = HttpImageDecoder::new(settings.images.clone()).map_err(AppError::from)?;

    Ok(Arc::new(BackgroundEngine::new(
        BackgroundStores::shared(repositories),
        Arc::new(decoder),
        EngineConfig::from(&settings.background),
    )))
}
