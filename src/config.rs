use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "LabInsight";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_PORT: u16 = 8470;
const DEFAULT_WORKERS: usize = 2;
const DEFAULT_QUEUE_CAPACITY: usize = 64;
const DEFAULT_EXTRACTION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_OCR_MODEL: &str = "llama3.2-vision";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Get the application data directory (platform data dir + `labinsight`).
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("labinsight")
}

/// Filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "warn,labinsight=info,labinsight_lib=info"
}

/// Runtime configuration. Defaults overridden by `LABINSIGHT_*` variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub workers: usize,
    pub queue_capacity: usize,
    pub extraction_timeout: Duration,
    /// Vision OCR endpoint; image uploads fail extraction when unset.
    pub ocr_url: Option<String>,
    pub ocr_model: String,
    /// PDFium library used to render scanned PDF pages for OCR. Searched
    /// next to the executable, then on the system path, when unset.
    pub pdfium_path: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: app_data_dir(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            extraction_timeout: Duration::from_secs(DEFAULT_EXTRACTION_TIMEOUT_SECS),
            ocr_url: None,
            ocr_model: DEFAULT_OCR_MODEL.to_string(),
            pdfium_path: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(dir) = get("LABINSIGHT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(bind) = get("LABINSIGHT_BIND") {
            config.bind_addr = parse_value("LABINSIGHT_BIND", &bind)?;
        }
        if let Some(workers) = get("LABINSIGHT_WORKERS") {
            config.workers = parse_positive("LABINSIGHT_WORKERS", &workers)?;
        }
        if let Some(capacity) = get("LABINSIGHT_QUEUE_CAPACITY") {
            config.queue_capacity = parse_positive("LABINSIGHT_QUEUE_CAPACITY", &capacity)?;
        }
        if let Some(secs) = get("LABINSIGHT_EXTRACTION_TIMEOUT_SECS") {
            let secs = parse_positive("LABINSIGHT_EXTRACTION_TIMEOUT_SECS", &secs)?;
            config.extraction_timeout = Duration::from_secs(secs as u64);
        }
        if let Some(url) = get("LABINSIGHT_OCR_URL") {
            config.ocr_url = Some(url);
        }
        if let Some(model) = get("LABINSIGHT_OCR_MODEL") {
            config.ocr_model = model;
        }
        if let Some(path) = get("LABINSIGHT_PDFIUM_PATH") {
            config.pdfium_path = Some(PathBuf::from(path));
        }
        if let Some(max) = get("LABINSIGHT_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = parse_positive("LABINSIGHT_MAX_UPLOAD_BYTES", &max)?;
        }

        Ok(config)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("labinsight.db")
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.data_dir.join("objects")
    }
}

fn parse_value<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_positive(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    let n: usize = parse_value(key, value)?;
    if n == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(n)
}
