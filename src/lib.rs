//! PlinkOink - a Plinko-style drop game engine
//!
//! Core modules:
//! - `sim`: Deterministic simulation (board geometry, physics, scoring)
//! - `wager`: Bet validation, charging, settlement and auto-play
//! - `balance`: Balance service contract and persistence sync
//! - `report`: Round records and session ledger
//! - `settings`: Engine configuration
//! - `engine`: Rendering-facing facade that ties everything together

pub mod balance;
pub mod engine;
pub mod report;
pub mod settings;
pub mod sim;
pub mod wager;

pub use balance::{BalanceError, BalanceService, BalanceSync, FileBalanceService, MemoryBalanceService};
pub use engine::{EngineError, PlinkoEngine};
pub use report::{RoundRecord, SessionReport};
pub use settings::EngineConfig;
pub use sim::{BoardError, BoardLayout, MultiplierTable, RiskMode, ScoreEvent, TokenFrame};
pub use wager::{Batch, BatchId, Wager, WagerError, WagerPhase};

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (120 Hz keeps fast tokens from tunnelling through sensors)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Ticks per second of simulated time
    pub const TICKS_PER_SECOND: u32 = 120;

    /// Downward gravity (pixels/s²)
    pub const GRAVITY: f32 = 980.0;
    /// Hard cap on token speed
    pub const TOKEN_MAX_SPEED: f32 = 1500.0;

    /// Pegs in the top row of the pyramid
    pub const TOP_PEG_COUNT: u32 = 7;
    /// Row count clamp
    pub const MIN_PEG_ROWS: u32 = 10;
    pub const MAX_PEG_ROWS: u32 = 18;
    /// Peg radius as a fraction of board width, and its floor in pixels
    pub const PEG_RADIUS_RATIO: f32 = 0.0055;
    pub const MIN_PEG_RADIUS: f32 = 3.0;
    /// Horizontal peg spacing as a fraction of board width
    pub const PEG_SPACING_RATIO: f32 = 0.04;
    /// Fraction of the board height covered by the peg field
    pub const PEG_FIELD_HEIGHT: f32 = 0.7;
    /// First peg row, as a fraction of board height
    pub const PEG_FIELD_TOP: f32 = 0.15;
    pub const PEG_RESTITUTION: f32 = 0.3;

    /// Slot sensor line, as a fraction of board height (kept above the floor)
    pub const SLOT_LINE: f32 = 0.92;
    /// Fraction of a slot column covered by its sensor
    pub const SLOT_FILL: f32 = 0.9;
    pub const SLOT_SENSOR_HEIGHT: f32 = 6.0;

    /// Floor and wall thickness (placed outside the visible area)
    pub const WALL_THICKNESS: f32 = 50.0;

    /// Token radius as a fraction of board width, and its floor in pixels
    pub const TOKEN_RADIUS_RATIO: f32 = 0.01;
    pub const MIN_TOKEN_RADIUS: f32 = 3.0;
    /// Spawn height as a fraction of board height
    pub const TOKEN_SPAWN_HEIGHT: f32 = 0.05;
    /// Side spawn margin as a fraction of board width
    pub const TOKEN_SPAWN_MARGIN: f32 = 0.15;
    /// Spacing between spawned tokens, in token radii
    pub const TOKEN_SPAWN_SPACING: f32 = 2.4;
    pub const TOKEN_RESTITUTION: f32 = 0.45;
    /// Velocity loss per 1/60 s of flight
    pub const TOKEN_AIR_FRICTION: f32 = 0.002;
    /// Horizontal spawn jitter (pixels/s, ± half of this)
    pub const TOKEN_SPAWN_VX_JITTER: f32 = 72.0;
    /// Angular spawn jitter (radians/s, ± half of this)
    pub const TOKEN_SPAWN_SPIN_JITTER: f32 = 15.0;
    /// Upward kick when a token lands in a slot (pixels/s)
    pub const TOKEN_LANDING_REBOUND: f32 = 120.0;

    /// Delay between scoring and removal (ms)
    pub const SETTLE_DELAY_MS: u32 = 120;
    /// Auto-play cadence (ms between cycles)
    pub const AUTO_PLAY_INTERVAL_MS: u32 = 900;
    /// Unscored tokens older than this are removed and their stakes forfeited
    pub const TOKEN_MAX_FLIGHT_MS: u32 = 30_000;
    /// Upper bound on tokens per drop
    pub const MAX_TOKENS_PER_DROP: u32 = 5;
    pub const DEFAULT_TOTAL_BET: f64 = 100.0;
    /// Tolerance for comparing full-precision money amounts
    pub const MONEY_EPSILON: f64 = 1e-9;
}

/// Convert milliseconds into whole simulation ticks (at least one)
#[inline]
pub fn ms_to_ticks(ms: u32) -> u64 {
    let ticks = (ms as u64 * consts::TICKS_PER_SECOND as u64).div_ceil(1000);
    ticks.max(1)
}

/// Round a money amount to whole cents
#[inline]
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
