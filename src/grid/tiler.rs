// src/grid/tiler.rs

use h3o::{CellIndex, LatLng};

use crate::error::{AppError, Result};
use crate::grid::Resolution;
use crate::models::Coordinate;

/// A hexagonal cell of the search grid.
///
/// `center` is always derived from `cell`, so two tiles for the same cell
/// carry bit-identical coordinates whichever path produced them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tile {
    pub cell: CellIndex,
    pub center: Coordinate,
}

impl Tile {
    pub fn new(cell: CellIndex) -> Self {
        let ll = LatLng::from(cell);
        Self {
            cell,
            center: Coordinate::new(ll.lat(), ll.lng()),
        }
    }

    /// Grid level of the cell.
    pub fn level(&self) -> u8 {
        u8::from(self.cell.resolution())
    }
}

/// Cell containing `coord` at the given resolution.
pub fn cell_at(coord: Coordinate, resolution: Resolution) -> Result<CellIndex> {
    let ll = LatLng::new(coord.lat, coord.lng)
        .map_err(|e| AppError::InvalidCoordinate(format!("{coord}: {e}")))?;
    Ok(ll.to_cell(resolution.to_h3()?))
}

/// Tiles covering `radius_m` around `center`.
///
/// Returns the cell containing `center` plus every cell within
/// `floor(radius_m / edge_length)` grid steps of it. A radius smaller than
/// one edge yields the origin cell alone.
pub fn tile_centers(center: Coordinate, radius_m: f64, resolution: Resolution) -> Result<Vec<Tile>> {
    let edge = resolution.edge_length_m();
    let hops = (radius_m.max(0.0) / edge).floor() as u32;

    let origin = cell_at(center, resolution)?;
    let tiles: Vec<Tile> = origin
        .grid_disk::<Vec<_>>(hops)
        .into_iter()
        .map(Tile::new)
        .collect();

    log::info!(
        "Broke up {center} r={radius_m}m into {} hexes of {hops} hops with edge={edge}m (resolution {resolution})",
        tiles.len()
    );

    Ok(tiles)
}
