//! Tariff source trait and the file-backed tariff loader
//!
//! A tariff file holds either one config, applied to whichever stream asks
//! for it, or a map of stream name to config:
//!
//! ```json
//! {
//!   "pdam": { "kind": "block", "scheme": "stepped",
//!             "boundaries": [50, 100, 150], "rates": [1000, 1500, 2000] },
//!   "gas":  { "kind": "unit", "price": 12000 }
//! }
//! ```
//!
//! Nothing here is fatal to a computation. A missing file, a parse failure,
//! or an invalid entry is logged and the stream is served `None`, which the
//! calculators turn into the stream's default.

use crate::tariff::TariffConfig;
use async_trait::async_trait;
use meterbill_core::error::{MeterbillError, Result};
use meterbill_core::types::UtilityStream;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Environment variable naming the tariff file
pub const TARIFF_FILE_ENV: &str = "METERBILL_TARIFF_FILE";

/// Supplies the tariff of one utility stream
///
/// `Ok(None)` means no tariff is configured; callers use the default.
#[async_trait]
pub trait TariffSource: Send + Sync {
    /// Fetch the tariff of a stream
    async fn fetch_tariff(&self, stream: UtilityStream) -> Result<Option<TariffConfig>>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TariffFile {
    Single(TariffConfig),
    PerStream(BTreeMap<String, serde_json::Value>),
}

/// Tariffs read from one file
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LoadedTariffs {
    /// Nothing usable was loaded
    #[default]
    Empty,
    /// One config for every stream
    Single(TariffConfig),
    /// Validated configs keyed by stream
    PerStream(BTreeMap<UtilityStream, TariffConfig>),
}

impl LoadedTariffs {
    /// Parse a tariff file's content
    ///
    /// Fails only when the content is not JSON of either accepted shape.
    /// Entries with unknown stream names, bad fields, or failed validation
    /// are skipped with a warning.
    pub fn parse(content: &str) -> Result<Self> {
        let file: TariffFile = serde_json::from_str(content)?;
        Ok(match file {
            TariffFile::Single(config) => match config.validate() {
                Ok(()) => Self::Single(config),
                Err(e) => {
                    warn!("Ignoring tariff file: {}", e);
                    Self::Empty
                }
            },
            TariffFile::PerStream(entries) => Self::PerStream(parse_entries(entries)),
        })
    }

    /// Tariff for a stream, if one was loaded
    pub fn get(&self, stream: UtilityStream) -> Option<&TariffConfig> {
        match self {
            Self::Empty => None,
            Self::Single(config) => Some(config),
            Self::PerStream(map) => map.get(&stream),
        }
    }
}

fn parse_entries(
    entries: BTreeMap<String, serde_json::Value>,
) -> BTreeMap<UtilityStream, TariffConfig> {
    let mut tariffs = BTreeMap::new();

    for (name, value) in entries {
        let stream = match UtilityStream::from_str(&name) {
            Ok(stream) => stream,
            Err(_) => {
                warn!("Skipping tariff for unknown stream '{}'", name);
                continue;
            }
        };

        let config = match serde_json::from_value::<TariffConfig>(value) {
            Ok(config) => config,
            Err(e) => {
                warn!("Skipping malformed tariff for {}: {}", stream, e);
                continue;
            }
        };

        if let Err(e) = config.validate_for(stream) {
            warn!("Skipping tariff for {}: {}", stream, e);
            continue;
        }

        tariffs.insert(stream, config);
    }

    tariffs
}

/// Reads tariffs from a JSON file and caches them
///
/// The file is resolved once, in this order: the explicit path, the
/// `METERBILL_TARIFF_FILE` environment variable, then
/// `<config dir>/meterbill/tariffs.json`.
pub struct TariffLoader {
    path: Option<PathBuf>,
    cache: Arc<RwLock<Option<LoadedTariffs>>>,
}

impl TariffLoader {
    /// Create a loader, resolving the tariff file path
    pub fn new(explicit: Option<PathBuf>) -> Self {
        let path = explicit
            .or_else(|| std::env::var_os(TARIFF_FILE_ENV).map(PathBuf::from))
            .or_else(default_tariff_path);
        debug!("Tariff file: {:?}", path);
        Self::with_path(path)
    }

    /// Create a loader for an exact path, or for no file at all
    pub fn with_path(path: Option<PathBuf>) -> Self {
        Self {
            path,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    /// The tariff file this loader reads
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Everything loaded from the file
    pub async fn tariffs(&self) -> LoadedTariffs {
        {
            let cache = self.cache.read().await;
            if let Some(ref loaded) = *cache {
                return loaded.clone();
            }
        }

        let mut cache = self.cache.write().await;
        if let Some(ref loaded) = *cache {
            return loaded.clone();
        }
        let loaded = self.load().await;
        *cache = Some(loaded.clone());
        loaded
    }

    /// Drop the cache and read the file again
    pub async fn refresh(&self) -> LoadedTariffs {
        let mut cache = self.cache.write().await;
        *cache = None;
        drop(cache);

        self.tariffs().await
    }

    async fn load(&self) -> LoadedTariffs {
        let Some(path) = self.path.as_deref() else {
            info!("No tariff file configured, using defaults");
            return LoadedTariffs::Empty;
        };

        match read_tariff_file(path).await {
            Ok(loaded) => {
                info!("Loaded tariffs from {}", path.display());
                loaded
            }
            Err(MeterbillError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Tariff file {} not found, using defaults", path.display());
                LoadedTariffs::Empty
            }
            Err(e) => {
                warn!("Failed to load tariffs: {}, using defaults", e);
                LoadedTariffs::Empty
            }
        }
    }
}

#[async_trait]
impl TariffSource for TariffLoader {
    async fn fetch_tariff(&self, stream: UtilityStream) -> Result<Option<TariffConfig>> {
        Ok(self.tariffs().await.get(stream).cloned())
    }
}

/// Read and parse a tariff file
pub async fn read_tariff_file(path: &Path) -> Result<LoadedTariffs> {
    let content = tokio::fs::read_to_string(path).await?;
    LoadedTariffs::parse(&content).map_err(|e| MeterbillError::Parse {
        file: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// `<config dir>/meterbill/tariffs.json`
pub fn default_tariff_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("meterbill").join("tariffs.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tariff::{TariffConfig, UnitConfig};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_per_stream_map() {
        let loaded = LoadedTariffs::parse(
            r#"{
                "gas": {"kind": "unit", "price": 15000},
                "kwh_tm": {"kind": "flat", "rate": 1000, "second_rate": 1500, "ppj": 10}
            }"#,
        )
        .unwrap();

        assert_eq!(
            loaded.get(UtilityStream::Gas),
            Some(&TariffConfig::Unit(UnitConfig { price: 15_000.0 }))
        );
        assert!(loaded.get(UtilityStream::KwhTm).is_some());
        assert!(loaded.get(UtilityStream::Fuel).is_none());
    }

    #[test]
    fn test_parse_skips_bad_entries() {
        let loaded = LoadedTariffs::parse(
            r#"{
                "steam": {"kind": "unit", "price": 1},
                "fuel": {"kind": "unit", "price": -5},
                "pdam": {"kind": "unit", "price": 5},
                "abt": {"kind": "block", "boundaries": [100, 50], "rates": [1, 2, 3]},
                "gas": {"kind": "unit", "price": 1}
            }"#,
        )
        .unwrap();

        match loaded {
            LoadedTariffs::PerStream(map) => {
                assert_eq!(map.len(), 1);
                assert!(map.contains_key(&UtilityStream::Gas));
            }
            other => panic!("expected per-stream tariffs, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_skips_limits_of_the_wrong_mode() {
        let loaded = LoadedTariffs::parse(
            r#"{
                "heat-pump": {"kind": "threshold", "max": 5},
                "chiller": {"kind": "threshold", "delta_setpoint": 10},
                "freezer": {"kind": "threshold", "max": -15}
            }"#,
        )
        .unwrap();

        assert!(loaded.get(UtilityStream::HeatPump).is_none());
        assert!(loaded.get(UtilityStream::Chiller).is_none());
        assert!(loaded.get(UtilityStream::Freezer).is_some());
    }

    #[test]
    fn test_parse_single_config() {
        let loaded = LoadedTariffs::parse(r#"{"kind": "unit", "price": 42}"#).unwrap();
        assert_eq!(
            loaded.get(UtilityStream::BulkWater),
            Some(&TariffConfig::Unit(UnitConfig { price: 42.0 }))
        );
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(LoadedTariffs::parse("not json").is_err());
    }

    #[tokio::test]
    async fn test_loader_reads_file() {
        let file = write_temp(r#"{"fuel": {"kind": "unit", "price": 7000}}"#);
        let loader = TariffLoader::with_path(Some(file.path().to_path_buf()));

        let tariff = loader.fetch_tariff(UtilityStream::Fuel).await.unwrap();
        assert_eq!(tariff, Some(TariffConfig::Unit(UnitConfig { price: 7_000.0 })));
        assert_eq!(loader.fetch_tariff(UtilityStream::Gas).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_loader_falls_back_on_missing_or_broken_file() {
        let loader = TariffLoader::with_path(Some(PathBuf::from("/nonexistent/tariffs.json")));
        assert_eq!(loader.tariffs().await, LoadedTariffs::Empty);

        let broken = write_temp("{ broken");
        let loader = TariffLoader::with_path(Some(broken.path().to_path_buf()));
        assert_eq!(loader.fetch_tariff(UtilityStream::Pdam).await.unwrap(), None);
    }

    #[test]
    fn test_loader_without_path() {
        let loader = TariffLoader::with_path(None);
        assert!(loader.path().is_none());
        let tariff = tokio_test::block_on(loader.fetch_tariff(UtilityStream::Abt)).unwrap();
        assert_eq!(tariff, None);
    }

    #[tokio::test]
    async fn test_refresh_rereads_file() {
        let file = write_temp(r#"{"gas": {"kind": "unit", "price": 1}}"#);
        let loader = TariffLoader::with_path(Some(file.path().to_path_buf()));
        assert!(loader.fetch_tariff(UtilityStream::Gas).await.unwrap().is_some());

        std::fs::write(file.path(), r#"{"fuel": {"kind": "unit", "price": 2}}"#).unwrap();

        // Cached until refreshed
        assert!(loader.fetch_tariff(UtilityStream::Gas).await.unwrap().is_some());
        loader.refresh().await;
        assert!(loader.fetch_tariff(UtilityStream::Gas).await.unwrap().is_none());
        assert!(loader.fetch_tariff(UtilityStream::Fuel).await.unwrap().is_some());
    }
}
