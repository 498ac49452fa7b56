//! Simulation entity types
//!
//! Bodies live in an arena keyed by `BodyId`; tokens reference their body by
//! id so removal mid-frame never leaves a dangling handle.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

/// Stable handle into the physics world's body table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BodyId(pub u32);

/// Identifier of a falling token, never reused while the process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenId(pub u64);

/// Identifier of a charged wager batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchId(pub u64);

/// Collision shape
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Circle { radius: f32 },
    /// Axis-aligned rectangle centered on the body position
    Rect { half_extents: Vec2 },
}

/// How a body takes part in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    /// Never moves, blocks dynamic bodies
    Static,
    /// Never moves, reports overlaps without affecting motion
    Sensor,
    /// Integrated every step
    Dynamic,
}

/// What a body represents on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyTag {
    Boundary,
    Peg(u32),
    Slot(usize),
    Token(TokenId),
}

/// A rigid body in the physics world
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Body {
    pub kind: BodyKind,
    pub shape: Shape,
    pub tag: BodyTag,
    pub pos: Vec2,
    pub vel: Vec2,
    pub angle: f32,
    pub angular_vel: f32,
    pub restitution: f32,
    /// Fraction of velocity lost per 1/60 s
    pub air_friction: f32,
}

impl Body {
    pub fn static_circle(tag: BodyTag, pos: Vec2, radius: f32, restitution: f32) -> Self {
        Self {
            kind: BodyKind::Static,
            shape: Shape::Circle { radius },
            tag,
            pos,
            vel: Vec2::ZERO,
            angle: 0.0,
            angular_vel: 0.0,
            restitution,
            air_friction: 0.0,
        }
    }

    pub fn static_rect(tag: BodyTag, center: Vec2, size: Vec2) -> Self {
        Self {
            kind: BodyKind::Static,
            shape: Shape::Rect { half_extents: size / 2.0 },
            tag,
            pos: center,
            vel: Vec2::ZERO,
            angle: 0.0,
            angular_vel: 0.0,
            restitution: 0.0,
            air_friction: 0.0,
        }
    }

    pub fn sensor_rect(tag: BodyTag, center: Vec2, size: Vec2) -> Self {
        Self {
            kind: BodyKind::Sensor,
            ..Self::static_rect(tag, center, size)
        }
    }

    pub fn dynamic_circle(tag: BodyTag, pos: Vec2, radius: f32) -> Self {
        Self {
            kind: BodyKind::Dynamic,
            shape: Shape::Circle { radius },
            tag,
            pos,
            vel: Vec2::ZERO,
            angle: 0.0,
            angular_vel: 0.0,
            restitution: 0.0,
            air_friction: 0.0,
        }
    }

    /// Circle radius (0 for rectangles)
    pub fn radius(&self) -> f32 {
        match self.shape {
            Shape::Circle { radius } => radius,
            Shape::Rect { .. } => 0.0,
        }
    }
}

/// Lifecycle of a falling token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenPhase {
    Falling,
    /// Landed in a slot, waiting out the settle delay before removal
    Scored { slot_index: usize },
}

/// A falling token tracked from spawn to removal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub body: BodyId,
    pub batch: BatchId,
    pub radius: f32,
    pub phase: TokenPhase,
    /// World tick the token was spawned on
    pub spawned_tick: u64,
}

impl Token {
    /// Write-once scored flag
    pub fn scored(&self) -> bool {
        matches!(self.phase, TokenPhase::Scored { .. })
    }
}

/// Per-tick token snapshot for the rendering layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenFrame {
    pub id: TokenId,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub angle: f32,
}

/// RNG state wrapper for serialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u64,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn to_rng(&self) -> Pcg32 {
        Pcg32::seed_from_u64(self.seed)
    }
}
