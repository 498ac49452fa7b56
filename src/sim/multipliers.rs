//! Slot payout multipliers
//!
//! Center slots are the likely landings and pay the least; the rare edge
//! slots pay the most. Each risk mode is a distance-from-center table plus a
//! tail value for every distance past the end of the table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Named multiplier-curve profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RiskMode {
    /// Low volatility
    #[default]
    #[serde(rename = "Ante Up")]
    AnteUp,
    /// Medium volatility
    #[serde(rename = "Weekend Gambler")]
    WeekendGambler,
    /// High volatility, jackpot edges
    #[serde(rename = "High Roller")]
    HighRoller,
}

impl RiskMode {
    pub const ALL: [RiskMode; 3] = [RiskMode::AnteUp, RiskMode::WeekendGambler, RiskMode::HighRoller];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskMode::AnteUp => "Ante Up",
            RiskMode::WeekendGambler => "Weekend Gambler",
            RiskMode::HighRoller => "High Roller",
        }
    }

    /// Multipliers by distance from the center slot
    fn curve(&self) -> &'static [f64] {
        match self {
            RiskMode::AnteUp => &[0.8, 1.0, 1.2, 1.5, 2.0],
            RiskMode::WeekendGambler => &[0.5, 0.8, 1.1, 1.5, 3.0],
            RiskMode::HighRoller => &[0.2, 0.5, 0.8, 1.2, 3.0],
        }
    }

    /// Multiplier for every distance beyond the curve
    fn tail(&self) -> f64 {
        match self {
            RiskMode::AnteUp => 3.5,
            RiskMode::WeekendGambler => 8.0,
            RiskMode::HighRoller => 20.0,
        }
    }

    /// Multiplier for a slot `distance` steps from the center
    pub fn multiplier_at(&self, distance: usize) -> f64 {
        self.curve().get(distance).copied().unwrap_or_else(|| self.tail())
    }
}

impl fmt::Display for RiskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ante up" | "low" => Ok(RiskMode::AnteUp),
            "weekend gambler" | "medium" | "med" => Ok(RiskMode::WeekendGambler),
            "high roller" | "high" => Ok(RiskMode::HighRoller),
            other => Err(format!("unknown risk mode: {other}")),
        }
    }
}

/// Ordered multipliers, one per slot, left to right
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MultiplierTable {
    pub mode: RiskMode,
    values: Vec<f64>,
}

impl MultiplierTable {
    pub fn generate(mode: RiskMode, slot_count: usize) -> Self {
        let center = slot_count.saturating_sub(1) / 2;
        let values = (0..slot_count)
            .map(|i| {
                let distance = i.abs_diff(center);
                crate::round_cents(mode.multiplier_at(distance))
            })
            .collect();
        Self { mode, values }
    }

    pub fn get(&self, slot_index: usize) -> Option<f64> {
        self.values.get(slot_index).copied()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Largest multiplier on the board
    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    pub fn center_index(&self) -> usize {
        self.values.len().saturating_sub(1) / 2
    }
}
