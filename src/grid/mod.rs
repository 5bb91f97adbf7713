//! Hexagonal tiling of a search area.
//!
//! - `Resolution`: supported grid levels and their edge lengths
//! - `tile_centers`: filled hexagonal disk of tiles around a center

mod resolution;
mod tiler;

pub use resolution::Resolution;
pub use tiler::{Tile, cell_at, tile_centers};
