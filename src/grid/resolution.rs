// src/grid/resolution.rs

use std::fmt;

use crate::error::{AppError, Result};

/// Supported levels with their hexagon edge length in meters, finest last.
const EDGE_LENGTHS_M: [(u8, f64); 5] = [
    (7, 5161.2),
    (8, 461.354),
    (9, 174.375),
    (10, 65.907),
    (11, 24.910),
];

/// A validated grid level.
///
/// Only levels present in the edge-length table can be constructed, so every
/// `Resolution` has a known edge length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Resolution {
    index: usize,
}

impl Resolution {
    /// Look up a level in the table.
    pub fn new(level: u8) -> Result<Self> {
        EDGE_LENGTHS_M
            .iter()
            .position(|(l, _)| *l == level)
            .map(|index| Self { index })
            .ok_or_else(|| AppError::UnsupportedResolution {
                level,
                supported: Self::supported_levels(),
            })
    }

    /// All supported levels, coarsest first.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..EDGE_LENGTHS_M.len()).map(|index| Self { index })
    }

    pub fn level(self) -> u8 {
        EDGE_LENGTHS_M[self.index].0
    }

    pub fn edge_length_m(self) -> f64 {
        EDGE_LENGTHS_M[self.index].1
    }

    /// Query radius for a single tile: the edge length rounded up.
    pub fn hex_radius_m(self) -> u32 {
        self.edge_length_m().ceil() as u32
    }

    /// Next finer level, if the table has one.
    pub fn finer(self) -> Option<Self> {
        (self.index + 1 < EDGE_LENGTHS_M.len()).then(|| Self {
            index: self.index + 1,
        })
    }

    /// Matching level of the underlying H3 grid.
    pub fn to_h3(self) -> Result<h3o::Resolution> {
        h3o::Resolution::try_from(self.level()).map_err(|_| AppError::UnsupportedResolution {
            level: self.level(),
            supported: Self::supported_levels(),
        })
    }

    fn supported_levels() -> String {
        Self::all()
            .map(|r| r.level().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl TryFrom<u8> for Resolution {
    type Error = AppError;

    fn try_from(level: u8) -> Result<Self> {
        Self::new(level)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}
