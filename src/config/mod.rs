//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{collections::BTreeMap, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::zones::ZoneDefaults;
use crate::domain::zones::{
    CarouselTransition, DEFAULT_CAROUSEL_INTERVAL_MS, HOME_PAGE_KEY, MAX_CAROUSEL_INTERVAL_MS,
    MAX_POOL_SIZE, MIN_CAROUSEL_INTERVAL_MS, MIN_POOL_SIZE, ZoneConfig, normalize_page_key,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "vitrine";
const ENV_PREFIX: &str = "VITRINE";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 4;
const DEFAULT_CACHE_TTL_SECS: u64 = 30 * 60;
const DEFAULT_RECENT_VIEW_LIMIT: u32 = 5;
const DEFAULT_PREFETCH_DELAY_MS: u64 = 500;
const DEFAULT_KNOWN_PAGES: [&str; 4] = ["home", "about", "gallery", "contact"];
const DEFAULT_IMAGE_WIDTH: u32 = 1920;
const DEFAULT_IMAGE_QUALITY: u8 = 80;
const DEFAULT_IMAGE_FORMAT: &str = "webp";
const DEFAULT_IMAGE_TIMEOUT_SECS: u64 = 15;
const SUPPORTED_IMAGE_FORMATS: [&str; 3] = ["webp", "jpeg", "png"];

/// Command-line arguments for the vitrine binary.
#[derive(Debug, Parser)]
#[command(
    name = "vitrine",
    version,
    about = "Page background resolution and caching engine"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "VITRINE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Resolve the background of one page and print it as JSON.
    Resolve(ResolveArgs),
    /// Preload the background of every known page.
    Warm,
    /// Follow the background frames of one page until interrupted.
    Watch(WatchArgs),
    /// Apply pending database migrations.
    Migrate,
}

#[derive(Debug, Args, Clone)]
pub struct ResolveArgs {
    /// Page key, e.g. `home` or `about`.
    #[arg(value_name = "PAGE")]
    pub page: String,

    /// Bypass cached zone configuration and candidate pools.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub force: bool,
}

#[derive(Debug, Args, Clone)]
pub struct WatchArgs {
    /// Page key to follow.
    #[arg(value_name = "PAGE")]
    pub page: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        global = true,
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL", global = true)]
    pub database_url: Option<String>,

    /// Override the background cache TTL.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS", global = true)]
    pub cache_ttl_seconds: Option<u64>,

    /// Override the image transform base URL.
    #[arg(long = "images-transform-base", value_name = "URL", global = true)]
    pub images_transform_base: Option<String>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub background: BackgroundSettings,
    pub images: ImageSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct BackgroundSettings {
    pub cache_ttl: Duration,
    pub recent_view_limit: NonZeroU32,
    pub prefetch_delay: Duration,
    pub known_pages: Vec<String>,
    pub zone_defaults: ZoneDefaults,
}

#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub transform_base: Option<Url>,
    pub width: NonZeroU32,
    pub quality: u8,
    pub format: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("background.known_pages")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    background: RawBackgroundSettings,
    images: RawImageSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(seconds) = overrides.cache_ttl_seconds {
            self.background.cache_ttl_seconds = Some(seconds);
        }
        if let Some(base) = overrides.images_transform_base.as_ref() {
            self.images.transform_base = Some(base.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            database,
            background,
            images,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            background: build_background_settings(background)?,
            images: build_image_settings(images)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_background_settings(
    background: RawBackgroundSettings,
) -> Result<BackgroundSettings, LoadError> {
    let ttl_seconds = background
        .cache_ttl_seconds
        .unwrap_or(DEFAULT_CACHE_TTL_SECS);
    if ttl_seconds == 0 {
        return Err(LoadError::invalid(
            "background.cache_ttl_seconds",
            "must be greater than zero",
        ));
    }

    let recent_view_limit = non_zero_u32(
        background
            .recent_view_limit
            .unwrap_or(DEFAULT_RECENT_VIEW_LIMIT)
            .into(),
        "background.recent_view_limit",
    )?;

    let prefetch_delay = Duration::from_millis(
        background
            .prefetch_delay_ms
            .unwrap_or(DEFAULT_PREFETCH_DELAY_MS),
    );

    let known_pages = match background.known_pages {
        Some(pages) => normalize_pages(pages)?,
        None => DEFAULT_KNOWN_PAGES.map(String::from).to_vec(),
    };

    let fallback = background.fallback.apply(ZoneConfig::default())?;
    let home = ZoneConfig {
        carousel_enabled: true,
        carousel_interval_ms: DEFAULT_CAROUSEL_INTERVAL_MS,
        ..fallback.clone()
    };
    let mut zone_defaults = ZoneDefaults::new(fallback).with_page(HOME_PAGE_KEY, home);
    for (raw_key, overrides) in background.pages {
        let page_key = normalize_page_key(&raw_key)
            .map_err(|err| LoadError::invalid("background.pages", err.to_string()))?;
        let base = zone_defaults.for_page(page_key);
        zone_defaults = zone_defaults.with_page(page_key, overrides.apply(base)?);
    }

    Ok(BackgroundSettings {
        cache_ttl: Duration::from_secs(ttl_seconds),
        recent_view_limit,
        prefetch_delay,
        known_pages,
        zone_defaults,
    })
}

fn build_image_settings(images: RawImageSettings) -> Result<ImageSettings, LoadError> {
    let transform_base = match images
        .transform_base
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        Some(value) => Some(Url::parse(value).map_err(|err| {
            LoadError::invalid("images.transform_base", format!("invalid url: {err}"))
        })?),
        None => None,
    };

    let width = non_zero_u32(
        images.width.unwrap_or(DEFAULT_IMAGE_WIDTH).into(),
        "images.width",
    )?;

    let quality = images.quality.unwrap_or(DEFAULT_IMAGE_QUALITY);
    if !(1..=100).contains(&quality) {
        return Err(LoadError::invalid(
            "images.quality",
            "must be between 1 and 100",
        ));
    }

    let format = images
        .format
        .map(|format| format.trim().to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_IMAGE_FORMAT.to_string());
    if !SUPPORTED_IMAGE_FORMATS.contains(&format.as_str()) {
        return Err(LoadError::invalid(
            "images.format",
            format!("expected one of {}", SUPPORTED_IMAGE_FORMATS.join(", ")),
        ));
    }

    let timeout_secs = images
        .request_timeout_seconds
        .unwrap_or(DEFAULT_IMAGE_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "images.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ImageSettings {
        transform_base,
        width,
        quality,
        format,
        request_timeout: Duration::from_secs(timeout_secs),
    })
}

fn normalize_pages(pages: Vec<String>) -> Result<Vec<String>, LoadError> {
    let mut normalized: Vec<String> = Vec::with_capacity(pages.len());
    for page in pages {
        let page = normalize_page_key(&page)
            .map_err(|err| LoadError::invalid("background.known_pages", err.to_string()))?;
        if !normalized.iter().any(|known| known == page) {
            normalized.push(page.to_string());
        }
    }
    if normalized.is_empty() {
        return Err(LoadError::invalid(
            "background.known_pages",
            "at least one page key is required",
        ));
    }
    Ok(normalized)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBackgroundSettings {
    cache_ttl_seconds: Option<u64>,
    recent_view_limit: Option<u32>,
    prefetch_delay_ms: Option<u64>,
    known_pages: Option<Vec<String>>,
    fallback: RawZoneDefault,
    pages: BTreeMap<String, RawZoneDefault>,
}

/// Partial zone configuration applied on top of a built-in default.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawZoneDefault {
    randomization_enabled: Option<bool>,
    carousel_enabled: Option<bool>,
    carousel_interval_ms: Option<u64>,
    carousel_transition: Option<CarouselTransition>,
    pool_size: Option<u32>,
}

impl RawZoneDefault {
    fn apply(self, mut base: ZoneConfig) -> Result<ZoneConfig, LoadError> {
        if let Some(enabled) = self.randomization_enabled {
            base.randomization_enabled = enabled;
        }
        if let Some(enabled) = self.carousel_enabled {
            base.carousel_enabled = enabled;
        }
        if let Some(interval) = self.carousel_interval_ms {
            if !(MIN_CAROUSEL_INTERVAL_MS..=MAX_CAROUSEL_INTERVAL_MS).contains(&interval) {
                return Err(LoadError::invalid(
                    "background.carousel_interval_ms",
                    format!(
                        "must be between {MIN_CAROUSEL_INTERVAL_MS} and {MAX_CAROUSEL_INTERVAL_MS}"
                    ),
                ));
            }
            base.carousel_interval_ms = interval;
        }
        if let Some(transition) = self.carousel_transition {
            base.carousel_transition = transition;
        }
        if let Some(pool_size) = self.pool_size {
            if !(MIN_POOL_SIZE..=MAX_POOL_SIZE).contains(&pool_size) {
                return Err(LoadError::invalid(
                    "background.pool_size",
                    format!("must be between {MIN_POOL_SIZE} and {MAX_POOL_SIZE}"),
                ));
            }
            base.pool_size = pool_size;
        }
        Ok(base)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawImageSettings {
    transform_base: Option<String>,
    width: Option<u32>,
    quality: Option<u8>,
    format: Option<String>,
    request_timeout_seconds: Option<u64>,
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
