use anyhow::Context;
use std::{
    fs,
    path::{Path, PathBuf},
};

use super::record::FeatureRecord;

/// Durable-storage key under which the feature snapshot is kept.
pub const FEATURE_CACHE_KEY: &str = "geoData";

/// Durable recovery cache of the feature store.
///
/// Every save is a full snapshot overwrite; the last write wins.
pub trait CacheStore {
    /// Read the last saved snapshot. `None` if nothing was saved yet.
    fn load(&self) -> anyhow::Result<Option<Vec<FeatureRecord>>>;

    fn save(&mut self, records: &[FeatureRecord]) -> anyhow::Result<()>;
}

/// Cache backed by a single JSON file holding the serialized record array.
pub struct JsonFileCache {
    filepath: PathBuf,
}

impl JsonFileCache {
    pub fn new(filepath: PathBuf) -> Self {
        Self { filepath }
    }

    /// Cache file at `<data_dir>/geoData.json`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(format!("{}.json", FEATURE_CACHE_KEY)))
    }

    pub fn filepath(&self) -> &Path {
        &self.filepath
    }
}

impl CacheStore for JsonFileCache {
    fn load(&self) -> anyhow::Result<Option<Vec<FeatureRecord>>> {
        if !self.filepath.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.filepath)
            .with_context(|| format!("Reading feature cache {:?}", self.filepath))?;
        let records = serde_json::from_str(&contents)
            .with_context(|| format!("Parsing feature cache {:?}", self.filepath))?;
        Ok(Some(records))
    }

    fn save(&mut self, records: &[FeatureRecord]) -> anyhow::Result<()> {
        let contents = serde_json::to_string(records)?;
        fs::write(&self.filepath, contents)
            .with_context(|| format!("Writing feature cache {:?}", self.filepath))
    }
}

/// Cache keeping the serialized snapshot in memory. Stores the JSON text rather than the records
/// so that loading goes through the same deserialization as the file cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    snapshot: Option<String>,
    writes: usize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(records: &[FeatureRecord]) -> anyhow::Result<Self> {
        Ok(Self {
            snapshot: Some(serde_json::to_string(records)?),
            writes: 0,
        })
    }

    /// Number of snapshot writes performed so far.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl CacheStore for MemoryCache {
    fn load(&self) -> anyhow::Result<Option<Vec<FeatureRecord>>> {
        match &self.snapshot {
            Some(snapshot) => Ok(Some(serde_json::from_str(snapshot)?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, records: &[FeatureRecord]) -> anyhow::Result<()> {
        self.snapshot = Some(serde_json::to_string(records)?);
        self.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
#[generic_tests::define]
mod tests {
    use testdir::testdir;

    use crate::store::record::{FeatureRecord, Identifier};

    use super::{CacheStore, JsonFileCache, MemoryCache};

    /// Creates a fresh, empty instance of a cache implementation.
    trait TestCache: CacheStore + Sized {
        fn create() -> Self;
    }

    impl TestCache for MemoryCache {
        fn create() -> Self {
            MemoryCache::new()
        }
    }

    impl TestCache for JsonFileCache {
        fn create() -> Self {
            JsonFileCache::in_dir(&testdir!())
        }
    }

    fn records() -> Vec<FeatureRecord> {
        vec![
            FeatureRecord::from_raw(
                Identifier::Number(1),
                serde_json::json!({
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [1.0, 2.0]},
                    "properties": {"id": 1}
                }),
            ),
            FeatureRecord::from_raw(
                Identifier::Text("b".to_string()),
                serde_json::json!({"type": "Feature", "geometry": null, "properties": {}}),
            ),
        ]
    }

    #[test]
    fn test_empty_cache_loads_none<C: TestCache>() {
        let cache = C::create();
        assert_eq!(None, cache.load().unwrap());
    }

    #[test]
    fn test_save_then_load<C: TestCache>() {
        let mut cache = C::create();
        cache.save(&records()).unwrap();
        assert_eq!(Some(records()), cache.load().unwrap());
    }

    #[test]
    fn test_last_write_wins<C: TestCache>() {
        let mut cache = C::create();
        cache.save(&records()).unwrap();
        cache.save(&records()[1..]).unwrap();
        assert_eq!(Some(records()[1..].to_vec()), cache.load().unwrap());
    }

    #[instantiate_tests(<MemoryCache>)]
    mod memory {}

    #[instantiate_tests(<JsonFileCache>)]
    mod json_file {}
}
