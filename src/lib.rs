// src/lib.rs

//! hexcrawl: exhaustive place discovery over an adaptive hexagonal grid

pub mod error;
pub mod grid;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
