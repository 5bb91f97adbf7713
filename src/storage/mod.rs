//! Storage abstractions for crawl progress.
//!
//! A crawl keeps two insert-only collections: the places discovered so far,
//! and the grid cells already queried. Both are loaded at start and flushed
//! as whole snapshots at the end of a run.
//!
//! ## Directory Structure
//!
//! ```text
//! {data_dir}/
//! ├── places_storage_94402_resolution8_radius1000.json   # place_id -> raw record
//! └── coord_history_94402_resolution8_radius1000.json    # [[lat, lng, level], ...]
//! ```

pub mod local;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use h3o::CellIndex;

use crate::error::Result;
use crate::grid::Resolution;
use crate::models::Place;

// Re-export for convenience
pub use local::LocalStorage;

/// Outcome of merging a place into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    Added,
    Duplicate,
}

/// Discovered places keyed by provider id. First seen wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceStore {
    places: BTreeMap<String, Place>,
}

impl PlaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a place unless its id is already present.
    pub fn merge(&mut self, place: Place) -> Merge {
        if self.places.contains_key(&place.id) {
            return Merge::Duplicate;
        }
        self.places.insert(place.id.clone(), place);
        Merge::Added
    }

    pub fn get(&self, id: &str) -> Option<&Place> {
        self.places.get(id)
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    pub(crate) fn as_map(&self) -> &BTreeMap<String, Place> {
        &self.places
    }
}

impl From<BTreeMap<String, Place>> for PlaceStore {
    fn from(places: BTreeMap<String, Place>) -> Self {
        Self { places }
    }
}

/// Grid cells that have been fully queried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitedSet {
    cells: BTreeSet<CellIndex>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cell; returns false if it was already present.
    pub fn insert(&mut self, cell: CellIndex) -> bool {
        self.cells.insert(cell)
    }

    pub fn contains(&self, cell: CellIndex) -> bool {
        self.cells.contains(&cell)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = CellIndex> + '_ {
        self.cells.iter().copied()
    }
}

impl FromIterator<CellIndex> for VisitedSet {
    fn from_iter<I: IntoIterator<Item = CellIndex>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

/// Everything a crawl persists between runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlState {
    pub places: PlaceStore,
    pub visited: VisitedSet,
}

/// Identifies one crawl's snapshot pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotKey {
    pub area_code: String,
    pub resolution: Resolution,
    pub radius_m: u32,
}

impl SnapshotKey {
    pub fn new(area_code: impl Into<String>, resolution: Resolution, radius_m: u32) -> Self {
        Self {
            area_code: area_code.into(),
            resolution,
            radius_m,
        }
    }

    fn stem(&self) -> String {
        format!(
            "{}_resolution{}_radius{}",
            self.area_code, self.resolution, self.radius_m
        )
    }

    /// File name of the place snapshot.
    pub fn places_file(&self) -> String {
        format!("places_storage_{}.json", self.stem())
    }

    /// File name of the visited-cell snapshot.
    pub fn visited_file(&self) -> String {
        format!("coord_history_{}.json", self.stem())
    }
}

/// Metadata about a flush.
#[derive(Debug, Clone)]
pub struct FlushSummary {
    pub place_count: usize,
    pub visited_count: usize,
    pub places_location: String,
    pub visited_location: String,
}

/// Trait for crawl state backends.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the saved state, or an empty one if nothing was saved yet.
    async fn load(&self) -> Result<CrawlState>;

    /// Overwrite the saved state with `state`.
    async fn flush(&self, state: &CrawlState) -> Result<FlushSummary>;
}
