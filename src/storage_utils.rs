use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

use crate::timeframe::Timeframe;
use crate::yahoo::DEFAULT_BASE_URL;

// CONFIGURATION STRUCTS
// Stored as storage/config.json next to the binary.

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistoryConfig {
    pub period: String,   // lookback window, e.g. "2y"
    pub interval: String, // base bar width, always "1d"
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            period: "2y".to_string(),
            interval: Timeframe::Daily.id().to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub base_url: String,
    pub timeout_secs: u64, // upper bound for the single startup fetch
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 20,
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DisplayConfig {
    pub refresh_interval_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 1000,
        }
    }
}

impl DisplayConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(1))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub history: HistoryConfig,
    pub source: SourceConfig,
    pub display: DisplayConfig,
}

impl AppConfig {
    /// Load `config.json` from `base_dir`, writing defaults when it is missing.
    /// Storage and parse failures are logged and give the built-in defaults.
    pub async fn load_or_default(base_dir: anyhow::Result<PathBuf>) -> Self {
        match Self::load_from(base_dir).await {
            Ok(config) => config.normalized(),
            Err(e) => {
                warn!(error = %e, "config unavailable, using defaults");
                Self::default()
            }
        }
    }

    async fn load_from(base_dir: anyhow::Result<PathBuf>) -> anyhow::Result<Self> {
        let storage = AsyncStorageManager::new_in(base_dir?).await?;
        storage.load_or_init("config").await
    }

    // Weekly and monthly bars are resampled from daily ones.
    fn normalized(mut self) -> Self {
        let daily = Timeframe::Daily.id();
        if self.history.interval != daily {
            warn!(interval = %self.history.interval, "unsupported base interval, using {}", daily);
            self.history.interval = daily.to_string();
        }
        self
    }
}

/// `relative_path` resolved against the directory holding the running binary.
pub fn binary_relative<P: AsRef<Path>>(relative_path: P) -> anyhow::Result<PathBuf> {
    let exe_path = std::env::current_exe()?;
    let dir = exe_path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Could not find binary directory"))?
        .join(relative_path);
    Ok(dir)
}

// STORAGE MANAGER

pub struct AsyncStorageManager {
    // Absolute path to the storage directory (e.g. ".../target/debug/storage")
    pub base_dir: PathBuf,
}

impl AsyncStorageManager {
    /// **Constructor: new_in**
    /// Uses `base_dir` as-is, creating it if needed.
    pub async fn new_in(base_dir: PathBuf) -> anyhow::Result<Self> {
        if !fs::try_exists(&base_dir).await? {
            fs::create_dir_all(&base_dir).await?;
        }
        Ok(Self { base_dir })
    }

    fn path_of(&self, filename: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", filename))
    }

    /// **Generic Save Function**
    /// Pretty JSON, written to a `.tmp` sibling first and renamed into place
    /// so a crash mid-write never leaves a truncated file.
    pub async fn save<T: Serialize>(&self, filename: &str, data: &T) -> anyhow::Result<()> {
        let final_path = self.path_of(filename);
        let tmp_path = self.base_dir.join(format!("{}.json.tmp", filename));

        let json_bytes = serde_json::to_vec_pretty(data)?;
        fs::write(&tmp_path, json_bytes).await?;
        fs::rename(tmp_path, final_path).await?;

        Ok(())
    }

    /// **Generic Load Function**
    pub async fn load<T: DeserializeOwned>(&self, filename: &str) -> anyhow::Result<T> {
        // serde_json validates UTF-8 itself, so skip read_to_string.
        let content = fs::read(self.path_of(filename)).await?;
        let data = serde_json::from_slice(&content)?;
        Ok(data)
    }

    /// **Load Or Init**
    /// Loads `filename`, or writes and returns `T::default()` when the file
    /// does not exist yet. A file that exists but fails to parse is an error.
    pub async fn load_or_init<T>(&self, filename: &str) -> anyhow::Result<T>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        if fs::try_exists(self.path_of(filename)).await? {
            return self.load(filename).await;
        }

        let data = T::default();
        self.save(filename, &data).await?;
        info!(path = %self.path_of(filename).display(), "wrote default {}", filename);
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn scratch_storage(name: &str) -> AsyncStorageManager {
        let dir = std::env::temp_dir().join(format!("kchart-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir).await;
        AsyncStorageManager::new_in(dir).await.unwrap()
    }

    #[tokio::test]
    async fn load_or_init_writes_defaults_once() {
        let storage = scratch_storage("defaults").await;

        let first: AppConfig = storage.load_or_init("config").await.unwrap();
        assert_eq!(first, AppConfig::default());
        assert!(storage.path_of("config").exists());

        let mut edited = first.clone();
        edited.display.refresh_interval_ms = 250;
        storage.save("config", &edited).await.unwrap();

        let second: AppConfig = storage.load_or_init("config").await.unwrap();
        assert_eq!(second.display.refresh_interval(), Duration::from_millis(250));

        let _ = fs::remove_dir_all(&storage.base_dir).await;
    }

    #[tokio::test]
    async fn partial_config_falls_back_per_section() {
        let storage = scratch_storage("partial").await;
        fs::write(
            storage.path_of("config"),
            br#"{"history": {"period": "5y", "interval": "1d"}}"#,
        )
        .await
        .unwrap();

        let config: AppConfig = storage.load_or_init("config").await.unwrap();

        assert_eq!(config.history.period, "5y");
        assert_eq!(config.source, SourceConfig::default());
        assert_eq!(config.source.timeout(), Duration::from_secs(20));

        let _ = fs::remove_dir_all(&storage.base_dir).await;
    }

    #[tokio::test]
    async fn corrupt_config_is_an_error() {
        let storage = scratch_storage("corrupt").await;
        fs::write(storage.path_of("config"), b"{not json").await.unwrap();

        let result: anyhow::Result<AppConfig> = storage.load_or_init("config").await;
        assert!(result.is_err());

        let _ = fs::remove_dir_all(&storage.base_dir).await;
    }

    #[tokio::test]
    async fn unusable_storage_dir_falls_back_to_defaults() {
        let config = AppConfig::load_or_default(Ok(PathBuf::from("/proc/kchart-storage"))).await;
        assert_eq!(config, AppConfig::default());

        let config = AppConfig::load_or_default(Err(anyhow::anyhow!("no binary dir"))).await;
        assert_eq!(config, AppConfig::default());
    }

    #[tokio::test]
    async fn unparsable_config_falls_back_to_defaults() {
        let storage = scratch_storage("fallback").await;
        fs::write(storage.path_of("config"), b"{not json").await.unwrap();

        let config = AppConfig::load_or_default(Ok(storage.base_dir.clone())).await;
        assert_eq!(config, AppConfig::default());

        let _ = fs::remove_dir_all(&storage.base_dir).await;
    }

    #[tokio::test]
    async fn non_daily_interval_is_replaced() {
        let storage = scratch_storage("interval").await;
        fs::write(
            storage.path_of("config"),
            br#"{"history": {"period": "5y", "interval": "1h"}}"#,
        )
        .await
        .unwrap();

        let config = AppConfig::load_or_default(Ok(storage.base_dir.clone())).await;

        assert_eq!(config.history.period, "5y");
        assert_eq!(config.history.interval, "1d");

        let _ = fs::remove_dir_all(&storage.base_dir).await;
    }

    #[test]
    fn zero_timeout_is_clamped() {
        let source = SourceConfig {
            timeout_secs: 0,
            ..SourceConfig::default()
        };
        assert_eq!(source.timeout(), Duration::from_secs(1));
    }
}
