//! Engine configuration
//!
//! Loaded from JSON; any missing field falls back to its default.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::*;
use crate::sim::{RiskMode, SpawnParams};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read or write config: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config value for {field}: {value}")]
    Invalid { field: &'static str, value: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seed for spawn jitter
    pub seed: u64,
    pub risk_mode: RiskMode,

    // === Wager defaults ===
    pub total_bet: f64,
    pub token_count: u32,

    // === Timing (milliseconds) ===
    pub auto_interval_ms: u32,
    pub settle_delay_ms: u32,
    /// Longest a token may fall before it is forfeited
    pub max_flight_ms: u32,

    // === Physics ===
    /// Downward acceleration (pixels/s^2)
    pub gravity: f32,
    pub token_restitution: f32,
    /// Velocity damping per 1/60 s
    pub token_air_friction: f32,
    /// Full width of the spawn velocity jitter (pixels/s)
    pub spawn_vx_jitter: f32,
    /// Full width of the spawn spin jitter (radians/s)
    pub spawn_spin_jitter: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED,
            risk_mode: RiskMode::default(),

            total_bet: DEFAULT_TOTAL_BET,
            token_count: 1,

            auto_interval_ms: AUTO_PLAY_INTERVAL_MS,
            settle_delay_ms: SETTLE_DELAY_MS,
            max_flight_ms: TOKEN_MAX_FLIGHT_MS,

            gravity: GRAVITY,
            token_restitution: TOKEN_RESTITUTION,
            token_air_friction: TOKEN_AIR_FRICTION,
            spawn_vx_jitter: TOKEN_SPAWN_VX_JITTER,
            spawn_spin_jitter: TOKEN_SPAWN_SPIN_JITTER,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let config = Self::from_json(&fs::read_to_string(path)?)?;
        log::info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        fs::write(path.as_ref(), self.to_json()?)?;
        log::info!("Engine config saved to {}", path.as_ref().display());
        Ok(())
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), SettingsError> {
        let checks: [(&'static str, f64, bool); 5] = [
            ("total_bet", self.total_bet, self.total_bet.is_finite() && self.total_bet >= 0.0),
            (
                "token_count",
                self.token_count as f64,
                self.token_count <= MAX_TOKENS_PER_DROP,
            ),
            ("gravity", self.gravity as f64, self.gravity.is_finite()),
            (
                "token_restitution",
                self.token_restitution as f64,
                (0.0..=1.0).contains(&self.token_restitution),
            ),
            (
                "token_air_friction",
                self.token_air_friction as f64,
                (0.0..1.0).contains(&self.token_air_friction),
            ),
        ];
        for (field, value, ok) in checks {
            if !ok {
                return Err(SettingsError::Invalid { field, value });
            }
        }
        Ok(())
    }

    pub fn auto_interval_ticks(&self) -> u64 {
        crate::ms_to_ticks(self.auto_interval_ms)
    }

    pub fn settle_delay_ticks(&self) -> u64 {
        crate::ms_to_ticks(self.settle_delay_ms)
    }

    pub fn max_flight_ticks(&self) -> u64 {
        crate::ms_to_ticks(self.max_flight_ms)
    }

    pub fn spawn_params(&self) -> SpawnParams {
        SpawnParams {
            restitution: self.token_restitution,
            air_friction: self.token_air_friction,
            vx_jitter: self.spawn_vx_jitter,
            spin_jitter: self.spawn_spin_jitter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_mirror_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.total_bet, 100.0);
        assert_eq!(config.token_count, 1);
        assert_eq!(config.auto_interval_ticks(), 108);
        assert_eq!(config.settle_delay_ticks(), 15);
        assert_eq!(config.max_flight_ticks(), 3_600);
        assert_eq!(config.spawn_params(), SpawnParams::default());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            EngineConfig::from_json(r#"{"seed": 7, "risk_mode": "High Roller"}"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.risk_mode, RiskMode::HighRoller);
        assert_eq!(config.total_bet, DEFAULT_TOTAL_BET);
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = EngineConfig::default();
        config.total_bet = 25.5;
        config.risk_mode = RiskMode::WeekendGambler;
        let parsed = EngineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"total_bet": -5.0}"#),
            Err(SettingsError::Invalid { field: "total_bet", .. })
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"token_restitution": 1.5}"#),
            Err(SettingsError::Invalid { .. })
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"token_count": 6}"#),
            Err(SettingsError::Invalid { field: "token_count", .. })
        ));
        // Zero is accepted here and refused when a bet is placed
        assert_eq!(
            EngineConfig::from_json(r#"{"token_count": 0}"#).unwrap().token_count,
            0
        );
        assert!(matches!(
            EngineConfig::from_json("{not json"),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("plinkoink-config-{}.json", std::process::id()));
        let config = EngineConfig {
            seed: 99,
            ..EngineConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
        let _ = fs::remove_file(&path);
        assert!(matches!(EngineConfig::load(&path), Err(SettingsError::Io(_))));
    }
}
