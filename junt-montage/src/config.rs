//! Configuration for junt-montage
//!
//! **Priority:** CLI flag (or its env var) → TOML file → built-in defaults.
//! The root folder follows [`junt_common::config::resolve_root_folder`].

use clap::Parser;
use junt_common::config::{default_config_path, load_toml, resolve_root_folder};
use junt_common::{FadeCurve, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::services::clip_processor::DEFAULT_TARGET_LUFS;
use crate::services::downloader::{DEFAULT_AUDIO_FORMAT, DEFAULT_PROGRAM, DEFAULT_TIMEOUT_SECS};
use crate::services::job_orchestrator::{PersistenceMode, PipelineConfig};
use crate::services::musicbrainz_client::{DEFAULT_BASE_URL, DEFAULT_USER_AGENT};

pub const ROOT_FOLDER_ENV: &str = "JUNT_ROOT_FOLDER";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// Command-line arguments for junt-montage
#[derive(Parser, Debug, Default)]
#[command(name = "junt-montage")]
#[command(about = "Album preview montage service")]
#[command(version)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "JUNT_PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "JUNT_BIND_ADDRESS")]
    pub bind_address: Option<String>,

    /// Root folder for the database, temp files and saved montages
    #[arg(short, long, env = "JUNT_ROOT_FOLDER")]
    pub root_folder: Option<String>,

    /// TOML config file (defaults to ~/.config/junt/config.toml)
    #[arg(short, long, env = "JUNT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. "info" or "junt_montage=debug"
    #[arg(long, env = "JUNT_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub batch_size: usize,
    pub partial_ready_threshold: usize,
    pub target_lufs: f64,
    pub crossfade_curve: FadeCurve,
    pub persistence_mode: PersistenceMode,
    pub auto_save: bool,
    pub job_retention_hours: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            batch_size: 3,
            partial_ready_threshold: 3,
            target_lufs: DEFAULT_TARGET_LUFS,
            crossfade_curve: FadeCurve::EqualPower,
            persistence_mode: PersistenceMode::Montage,
            auto_save: false,
            job_retention_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuotaSection {
    pub enabled: bool,
    pub max_anonymous_jobs: u32,
    pub window_hours: u32,
}

impl Default for QuotaSection {
    fn default() -> Self {
        Self {
            enabled: true,
            max_anonymous_jobs: 1,
            window_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleanupSection {
    pub enabled: bool,
    pub max_age_hours: u64,
    pub interval_minutes: u64,
}

impl Default for CleanupSection {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age_hours: 1,
            interval_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloaderSection {
    pub program: String,
    pub audio_format: String,
    pub timeout_secs: u64,
}

impl Default for DownloaderSection {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            audio_format: DEFAULT_AUDIO_FORMAT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogSection {
    pub base_url: String,
    pub user_agent: String,
    pub requests_per_second: u32,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            requests_per_second: 1,
        }
    }
}

/// Contents of the TOML file; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MontageConfig {
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    pub root_folder: Option<String>,
    /// Allowed CORS origins; empty allows any
    pub cors_origins: Vec<String>,
    pub logging: LoggingSection,
    pub pipeline: PipelineSection,
    pub quota: QuotaSection,
    pub cleanup: CleanupSection,
    pub downloader: DownloaderSection,
    pub catalog: CatalogSection,
}

impl MontageConfig {
    /// Load the TOML file named by `--config`, else the platform default if present
    pub fn load(args: &Args) -> Result<Self> {
        let path = args.config.clone().or_else(default_config_path);
        match path {
            Some(path) => {
                let config: MontageConfig = load_toml(&path)?;
                tracing::info!("Loaded config from {}", path.display());
                Ok(config)
            }
            None => Ok(MontageConfig::default()),
        }
    }

    pub fn pipeline_config(&self, temp_dir: &Path) -> PipelineConfig {
        PipelineConfig {
            batch_size: self.pipeline.batch_size.max(1),
            partial_ready_threshold: self.pipeline.partial_ready_threshold.max(1),
            persistence_mode: self.pipeline.persistence_mode,
            auto_save: self.pipeline.auto_save,
            temp_dir: temp_dir.to_path_buf(),
        }
    }
}

/// Fully resolved runtime settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub bind_address: String,
    pub root_folder: PathBuf,
    pub log_level: String,
    pub config: MontageConfig,
}

impl Settings {
    pub fn resolve(args: &Args, config: MontageConfig) -> Self {
        let root_folder = resolve_root_folder(
            args.root_folder.as_deref(),
            ROOT_FOLDER_ENV,
            config.root_folder.as_deref(),
        );

        Self {
            port: args.port.or(config.port).unwrap_or(DEFAULT_PORT),
            bind_address: args
                .bind_address
                .clone()
                .or_else(|| config.bind_address.clone())
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            log_level: args
                .log_level
                .clone()
                .unwrap_or_else(|| config.logging.level.clone()),
            root_folder,
            config,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join("junt.db")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root_folder.join("temp")
    }

    pub fn montages_dir(&self) -> PathBuf {
        self.root_folder.join("montages")
    }
}
