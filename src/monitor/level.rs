//! Threshold and percentage calculation.

use crate::config::Config;

/// Alert thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Alert at or below this many kilograms.
    pub low_kg: f64,
    /// Hopper capacity for percentage reporting.
    pub max_capacity_kg: Option<f64>,
}

impl Thresholds {
    /// Thresholds from config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            low_kg: config.low_threshold_kg,
            max_capacity_kg: config.max_capacity_kg,
        }
    }
}

/// Result of comparing one reading with the thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelReport {
    /// Reading in kilograms.
    pub kg: f64,
    /// Fill percentage, when a capacity is known.
    pub percent: Option<f64>,
    /// Whether the alert condition holds.
    pub is_low: bool,
}

/// Compare a reading with the thresholds.
pub fn assess(kg: f64, thresholds: &Thresholds) -> LevelReport {
    let percent = thresholds
        .max_capacity_kg
        .filter(|capacity| *capacity > 0.0)
        .map(|capacity| kg / capacity * 100.0);

    LevelReport {
        kg,
        percent,
        is_low: kg <= thresholds.low_kg,
    }
}
