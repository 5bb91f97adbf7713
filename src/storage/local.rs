//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── places_storage_{area}_resolution{r}_radius{m}.json   # Places by id
//! └── coord_history_{area}_resolution{r}_radius{m}.json    # Visited cells
//! ```
//!
//! Visited cells are written as `[lat, lng, level]`. Plain `[lat, lng]`
//! pairs are still read and are taken to be at the snapshot's resolution.
//!
//! Both files are rewritten in full on every flush. Each write goes to a
//! `.tmp` sibling first and is renamed over the target, so a crash mid-write
//! leaves the previous snapshot intact.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use h3o::{CellIndex, LatLng};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::grid::{Resolution, Tile};
use crate::models::Place;
use crate::storage::{CrawlState, FlushSummary, PlaceStore, SnapshotKey, SnapshotStore, VisitedSet};

/// One visited cell on disk: its centroid and level.
type VisitedEntry = (f64, f64, u8);

/// A visited entry as read back, with or without its level.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum StoredCell {
    Leveled(f64, f64, u8),
    Pair(f64, f64),
}

impl StoredCell {
    fn with_default_level(self, resolution: Resolution) -> VisitedEntry {
        match self {
            Self::Leveled(lat, lng, level) => (lat, lng, level),
            Self::Pair(lat, lng) => (lat, lng, resolution.level()),
        }
    }
}

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    key: SnapshotKey,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>, key: SnapshotKey) -> Self {
        Self {
            root_dir: root_dir.into(),
            key,
        }
    }

    pub fn places_path(&self) -> PathBuf {
        self.root_dir.join(self.key.places_file())
    }

    pub fn visited_path(&self) -> PathBuf {
        self.root_dir.join(self.key.visited_file())
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
        Self::ensure_dir(path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        Self::write_bytes(path, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        match Self::read_bytes(path).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn load_places(&self) -> Result<PlaceStore> {
        let path = self.places_path();
        let places: BTreeMap<String, Place> = Self::read_json(&path).await?.unwrap_or_default();
        if let Some((key, place)) = places.iter().find(|(key, place)| **key != place.id) {
            return Err(AppError::validation(format!(
                "{}: entry '{}' holds place '{}'",
                path.display(),
                key,
                place.id
            )));
        }
        Ok(PlaceStore::from(places))
    }

    async fn load_visited(&self) -> Result<VisitedSet> {
        let path = self.visited_path();
        let stored: Vec<StoredCell> = Self::read_json(&path).await?.unwrap_or_default();
        stored
            .into_iter()
            .map(|cell| {
                let entry = cell.with_default_level(self.key.resolution);
                decode_cell(entry).map_err(|e| {
                    AppError::validation(format!("{}: {:?}: {e}", path.display(), entry))
                })
            })
            .collect()
    }
}

fn encode_cell(cell: CellIndex) -> VisitedEntry {
    let tile = Tile::new(cell);
    (tile.center.lat, tile.center.lng, tile.level())
}

fn decode_cell((lat, lng, level): VisitedEntry) -> Result<CellIndex> {
    let resolution = h3o::Resolution::try_from(level)
        .map_err(|e| AppError::validation(format!("bad level: {e}")))?;
    let ll = LatLng::new(lat, lng).map_err(|e| AppError::InvalidCoordinate(e.to_string()))?;
    Ok(ll.to_cell(resolution))
}

#[async_trait]
impl SnapshotStore for LocalStorage {
    async fn load(&self) -> Result<CrawlState> {
        let places = self.load_places().await?;
        let visited = self.load_visited().await?;
        log::info!(
            "Loaded storage with {} places and {} visited cells from {}",
            places.len(),
            visited.len(),
            self.root_dir.display()
        );
        Ok(CrawlState { places, visited })
    }

    async fn flush(&self, state: &CrawlState) -> Result<FlushSummary> {
        let places_path = self.places_path();
        let visited_path = self.visited_path();

        log::info!("Flushing storage with {} places", state.places.len());
        let places_result = Self::write_json(&places_path, state.places.as_map()).await;
        if let Err(e) = &places_result {
            log::error!("Failed to write {}: {}", places_path.display(), e);
        }

        log::info!(
            "Flushing crawled store location with {} cells",
            state.visited.len()
        );
        let entries: Vec<VisitedEntry> = state.visited.iter().map(encode_cell).collect();
        let visited_result = Self::write_json(&visited_path, &entries).await;
        if let Err(e) = &visited_result {
            log::error!("Failed to write {}: {}", visited_path.display(), e);
        }

        places_result?;
        visited_result?;

        Ok(FlushSummary {
            place_count: state.places.len(),
            visited_count: state.visited.len(),
            places_location: places_path.display().to_string(),
            visited_location: visited_path.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Resolution, tile_centers};
    use crate::models::Coordinate;
    use tempfile::TempDir;

    fn key() -> SnapshotKey {
        SnapshotKey::new("94402", Resolution::new(8).unwrap(), 1000)
    }

    fn sample_state() -> CrawlState {
        let mut state = CrawlState::default();
        state
            .places
            .merge(Place::new("a", "Alpha", Coordinate::new(37.55, -122.32)));
        state
            .places
            .merge(Place::new("b", "Beta", Coordinate::new(37.56, -122.33)));

        let center = Coordinate::new(37.5522, -122.3270);
        for level in [8, 9, 11] {
            let r = Resolution::new(level).unwrap();
            for tile in tile_centers(center, 300.0, r).unwrap() {
                state.visited.insert(tile.cell);
            }
        }
        state
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.txt");

        LocalStorage::write_bytes(&path, b"hello").await.unwrap();
        let data = LocalStorage::read_bytes(&path).await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_load_missing_files_is_empty() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), key());

        let state = storage.load().await.unwrap();
        assert!(state.places.is_empty());
        assert!(state.visited.is_empty());
    }

    #[tokio::test]
    async fn test_flush_then_load_restores_state() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path().join("nested"), key());
        let state = sample_state();

        let summary = storage.flush(&state).await.unwrap();
        assert_eq!(summary.place_count, 2);
        assert_eq!(summary.visited_count, state.visited.len());

        let loaded = storage.load().await.unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_snapshot_files_are_plain_json() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), key());
        storage.flush(&sample_state()).await.unwrap();

        let places: serde_json::Value =
            serde_json::from_slice(&std::fs::read(storage.places_path()).unwrap()).unwrap();
        assert_eq!(places["a"]["name"], "Alpha");
        assert_eq!(places["b"]["place_id"], "b");

        let visited: Vec<(f64, f64, u8)> =
            serde_json::from_slice(&std::fs::read(storage.visited_path()).unwrap()).unwrap();
        assert!(visited.iter().any(|(_, _, level)| *level == 11));
    }

    #[tokio::test]
    async fn test_flush_overwrites_previous_snapshot() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), key());
        storage.flush(&sample_state()).await.unwrap();

        let empty = CrawlState::default();
        storage.flush(&empty).await.unwrap();
        assert_eq!(storage.load().await.unwrap(), empty);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), key());
        std::fs::write(storage.visited_path(), b"[[1.0, 2.0").unwrap();

        assert!(matches!(storage.load().await, Err(AppError::Json(_))));
    }

    #[tokio::test]
    async fn test_visited_pairs_load_at_snapshot_resolution() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), key());
        let center = Coordinate::new(37.5522, -122.327);
        let fine = Resolution::new(10).unwrap();
        std::fs::write(
            storage.visited_path(),
            format!("[[37.5522, -122.327], [37.5522, -122.327, {}]]", fine.level()),
        )
        .unwrap();

        let state = storage.load().await.unwrap();
        assert_eq!(state.visited.len(), 2);
        assert!(state.visited.contains(crate::grid::cell_at(center, key().resolution).unwrap()));
        assert!(state.visited.contains(crate::grid::cell_at(center, fine).unwrap()));
    }

    #[tokio::test]
    async fn test_failed_places_write_still_writes_visited() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), key());
        std::fs::create_dir_all(storage.places_path().join("occupied")).unwrap();
        let state = sample_state();

        let err = storage.flush(&state).await.unwrap_err();
        assert!(matches!(err, AppError::Io(_)));

        let visited: Vec<(f64, f64, u8)> =
            serde_json::from_slice(&std::fs::read(storage.visited_path()).unwrap()).unwrap();
        assert_eq!(visited.len(), state.visited.len());
    }

    #[tokio::test]
    async fn test_mismatched_place_key_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path(), key());
        let body = serde_json::json!({
            "wrong": Place::new("right", "Mislabeled", Coordinate::new(1.0, 1.0))
        });
        std::fs::write(storage.places_path(), body.to_string()).unwrap();

        assert!(matches!(storage.load().await, Err(AppError::Validation(_))));
    }
}
