use std::time::Duration;

use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use color_eyre::eyre::{Context, Result};
use serde::Deserialize;

const DEFAULT_STAGING_PREFIX: &str = "preview";
const DEFAULT_PROCESS_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct TomlDataDir {
    path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct TomlStaging {
    dir: Option<String>,
    prefix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct TomlBinPaths {
    pub ffmpeg: Option<String>,
    pub ffprobe: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct TomlProcessing {
    timeout_secs: Option<u64>,
    startup_self_check: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct TomlConfig {
    #[serde(rename = "DataDir")]
    pub data_dir: TomlDataDir,
    #[serde(rename = "Staging")]
    pub staging: Option<TomlStaging>,
    #[serde(rename = "BinPaths")]
    pub bin_paths: Option<TomlBinPaths>,
    #[serde(rename = "Processing")]
    pub processing: Option<TomlProcessing>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingConfig {
    /// Directory staged copies of source videos are written to
    pub dir: PathBuf,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BinPaths {
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Holds the database file and the root of the object store
    pub data_dir: PathBuf,
    pub staging: StagingConfig,
    pub bin_paths: BinPaths,
    /// Upper bound for a single ffmpeg/ffprobe invocation. None means wait forever.
    pub process_timeout: Option<Duration>,
    pub startup_self_check: bool,
}

pub async fn read_config(path: &Path) -> Result<Config> {
    let toml_str = tokio::fs::read_to_string(path)
        .await
        .context(format!("Error reading config file {}", path))?;
    // relative paths in the config file are relative to the file itself
    let config_dir = path.parent().unwrap_or(Path::new("."));
    parse_config(&toml_str, config_dir)
}

pub fn parse_config(toml_str: &str, config_dir: &Path) -> Result<Config> {
    let toml_config: TomlConfig = toml::from_str(toml_str).context("Error parsing config file")?;
    let resolve = |p: &str| -> PathBuf {
        let p = PathBuf::from(p);
        if p.is_absolute() {
            p
        } else {
            config_dir.join(p)
        }
    };
    let data_dir = resolve(&toml_config.data_dir.path);
    let staging = {
        let toml_staging = toml_config.staging.unwrap_or(TomlStaging {
            dir: None,
            prefix: None,
        });
        let dir = match toml_staging.dir {
            Some(dir) => resolve(&dir),
            None => PathBuf::try_from(std::env::temp_dir())
                .context("system temp directory path is not valid UTF-8")?,
        };
        StagingConfig {
            dir,
            prefix: toml_staging
                .prefix
                .unwrap_or_else(|| DEFAULT_STAGING_PREFIX.to_owned()),
        }
    };
    let bin_paths = toml_config
        .bin_paths
        .map(|bin_paths| BinPaths {
            ffmpeg: bin_paths.ffmpeg.map(PathBuf::from),
            ffprobe: bin_paths.ffprobe.map(PathBuf::from),
        })
        .unwrap_or_default();
    let (timeout_secs, startup_self_check) = match toml_config.processing {
        Some(processing) => (
            processing.timeout_secs.unwrap_or(DEFAULT_PROCESS_TIMEOUT_SECS),
            processing.startup_self_check.unwrap_or(false),
        ),
        None => (DEFAULT_PROCESS_TIMEOUT_SECS, false),
    };
    let process_timeout = match timeout_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    Ok(Config {
        data_dir,
        staging,
        bin_paths,
        process_timeout,
        startup_self_check,
    })
}
