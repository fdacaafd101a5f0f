//! # Constants and type definitions for lcaugment
//!
//! This module centralizes the **numerical defaults**, **common type aliases** and the
//! **star identifier** used throughout the crate.
//!
//! ## Overview
//!
//! - Default seed and period-matching tolerance
//! - Lomb–Scargle frequency grid defaults
//! - Robust-statistics constants
//! - Core type aliases (time, magnitude, phase)
//! - [`StarId`], the opaque identifier of a light curve

use std::collections::HashMap;

use ahash::RandomState;

use crate::observations::Observation;

// -------------------------------------------------------------------------------------------------
// Defaults
// -------------------------------------------------------------------------------------------------

/// Seed used by every light curve and search when none is given
pub const DEFAULT_SEED: u64 = 999;

/// Relative tolerance under which two periods are considered identical
pub const PERIOD_REL_TOL: f64 = 1e-5;

/// Smallest sample size visited by the minimum-observation search
pub const MIN_SEARCH_SAMPLE: usize = 2;

/// Lowest frequency (1/day) scanned by the Lomb–Scargle periodogram
pub const LS_MIN_FREQUENCY: f64 = 1.0 / 200.0;

/// Highest frequency (1/day) scanned by the Lomb–Scargle periodogram
pub const LS_MAX_FREQUENCY: f64 = 10.0;

/// Grid oversampling of the Lomb–Scargle periodogram
pub const LS_SAMPLES_PER_PEAK: usize = 5;

/// Tuning constant of the Tukey biweight location
pub const BIWEIGHT_C: f64 = 6.0;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Heliocentric Julian Date (days)
pub type Hjd = f64;
/// Apparent magnitude
pub type Magnitude = f64;
/// Position inside one period cycle, in `[0, 1)`
pub type Phase = f64;
/// Period in days
pub type Period = f64;

// -------------------------------------------------------------------------------------------------
// Identifiers and data containers
// -------------------------------------------------------------------------------------------------

/// Identifier of a star in a catalog.
///
/// Catalog ids are usually integers, but string designations are accepted and kept as-is.
/// The core never interprets the identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StarId {
    /// Integer catalog id (e.g. `Int(42)`)
    Int(i64),
    /// Any other designation
    String(String),
}

impl std::fmt::Display for StarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StarId::Int(n) => write!(f, "{n}"),
            StarId::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for StarId {
    fn from(n: i64) -> Self {
        StarId::Int(n)
    }
}

impl From<&str> for StarId {
    fn from(s: &str) -> Self {
        s.parse()
            .unwrap_or_else(|_| StarId::String(s.to_string()))
    }
}

impl From<StarId> for String {
    fn from(id: StarId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for StarId {
    type Error = std::num::ParseIntError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl std::str::FromStr for StarId {
    type Err = std::num::ParseIntError;

    /// Try to parse a `StarId` from a string.
    /// - Optional sign followed by digits → `Int(i64)`
    /// - Otherwise                        → `String(String)`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.parse::<i64>() {
            Ok(n) => Ok(StarId::Int(n)),
            Err(e) => {
                let digits = s.strip_prefix('-').unwrap_or(s);
                if digits.is_empty() || digits.chars().any(|c| !c.is_ascii_digit()) {
                    Ok(StarId::String(s.to_string()))
                } else {
                    // all digits but out of range
                    Err(e)
                }
            }
        }
    }
}

/// Observations of every star of a catalog, keyed by star.
pub type LightCurveSet = HashMap<StarId, Vec<Observation>, RandomState>;
