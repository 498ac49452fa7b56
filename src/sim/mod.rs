//! Deterministic simulation module
//!
//! Board geometry, physics and slot scoring live here. This module must be
//! pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by body/token ID)
//! - No rendering, economy or platform dependencies

pub mod board;
pub mod collision;
pub mod multipliers;
pub mod schedule;
pub mod scorer;
pub mod spawner;
pub mod state;
pub mod world;

pub use board::{BoardError, BoardLayout, Peg, Slot};
pub use collision::{CollisionResult, circle_circle_collision, circle_rect_collision};
pub use multipliers::{MultiplierTable, RiskMode};
pub use schedule::{DelayQueue, RepeatingTask, TaskHandle, TaskPoll};
pub use scorer::{Landing, ScoreEvent, Scorer};
pub use spawner::{SpawnParams, Spawner};
pub use state::{BatchId, Body, BodyId, BodyKind, BodyTag, RngState, Shape, Token, TokenFrame, TokenId, TokenPhase};
pub use world::{PhysicsWorld, SensorContact};
