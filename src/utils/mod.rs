//! Utility functions and helpers.

pub mod http;

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{AppError, Result};

fn area_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 _-]{0,31}$").expect("area code pattern is valid")
    })
}

/// Check that an area code is a plausible postal/administrative code.
///
/// The code also names the snapshot files, so path separators and other
/// punctuation are rejected.
pub fn validate_area_code(code: &str) -> Result<&str> {
    let code = code.trim();
    if area_code_pattern().is_match(code) {
        Ok(code)
    } else {
        Err(AppError::config(format!(
            "Malformed area code '{code}': expected 1-32 letters, digits, spaces, '_' or '-'"
        )))
    }
}
