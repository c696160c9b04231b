use std::path::PathBuf;
use std::time::Duration;

/// Core configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | ./botica-data | Queue database and logs |
/// | QUEUE_DB_FILE | offline_queue.redb | Queue file under WORK_DIR |
/// | STORE_URL | http://localhost:8080 | Remote document store base URL |
/// | STORE_TIMEOUT_MS | 15000 | Per-request store timeout |
/// | CONNECTIVITY_PROBE_URL | (unset) | Health URL polled for reachability |
/// | CONNECTIVITY_PROBE_INTERVAL_SECS | 30 | Probe interval |
/// | SYNC_RETRY_INTERVAL_SECS | 900 | Periodic retry job interval |
/// | PRESCRIPTION_RETRY_BASE_SECS | 30 | Linear backoff step for prescription uploads |
/// | LOG_LEVEL | info | tracing max level |
/// | LOG_JSON | false | JSON log lines |
///
/// # Example
///
/// ```ignore
/// WORK_DIR=/data/botica STORE_URL=https://store.example.com ./app
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: String,
    pub queue_db_file: String,
    pub store_url: String,
    pub store_timeout_ms: u64,
    /// No probe runs when unset; the platform reports connectivity instead
    pub connectivity_probe_url: Option<String>,
    pub connectivity_probe_interval_secs: u64,
    pub sync_retry_interval_secs: u64,
    pub prescription_retry_base_secs: u64,
    pub log_level: String,
    pub log_json: bool,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load from environment variables (and `.env` if present)
    ///
    /// Unset or unparsable values fall back to defaults.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./botica-data".into()),
            queue_db_file: std::env::var("QUEUE_DB_FILE")
                .unwrap_or_else(|_| "offline_queue.redb".into()),
            store_url: std::env::var("STORE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into()),
            store_timeout_ms: env_or("STORE_TIMEOUT_MS", 15_000),
            connectivity_probe_url: std::env::var("CONNECTIVITY_PROBE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            connectivity_probe_interval_secs: env_or("CONNECTIVITY_PROBE_INTERVAL_SECS", 30),
            sync_retry_interval_secs: env_or("SYNC_RETRY_INTERVAL_SECS", 900),
            prescription_retry_base_secs: env_or("PRESCRIPTION_RETRY_BASE_SECS", 30),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: env_or("LOG_JSON", false),
        }
    }

    /// Environment configuration with a different work directory
    ///
    /// Used by tests
    pub fn with_work_dir(work_dir: impl Into<String>) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config
    }

    pub fn queue_db_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join(&self.queue_db_file)
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn connectivity_probe_interval(&self) -> Duration {
        Duration::from_secs(self.connectivity_probe_interval_secs.max(1))
    }

    pub fn sync_retry_interval(&self) -> Duration {
        Duration::from_secs(self.sync_retry_interval_secs.max(1))
    }

    pub fn prescription_retry_base(&self) -> Duration {
        Duration::from_secs(self.prescription_retry_base_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
