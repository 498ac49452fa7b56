//! Procedural board geometry
//!
//! A triangular peg pyramid above a row of slot sensors. Everything scales
//! with the board width so the layout is resolution-independent, and the
//! output is a pure function of `(width, height)`.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::*;

/// Board construction failure
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum BoardError {
    #[error("invalid board dimensions: {width}x{height}")]
    InvalidDimensions { width: f32, height: f32 },
}

/// A static circular peg
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peg {
    pub id: u32,
    pub pos: Vec2,
    pub radius: f32,
}

/// A scoring sensor at the bottom of the board
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    /// Left-to-right index, matches the multiplier table order
    pub index: usize,
    /// Sensor center
    pub pos: Vec2,
    /// Sensor width (narrower than the slot column)
    pub width: f32,
    pub height: f32,
}

/// Static geometry for one board build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardLayout {
    pub width: f32,
    pub height: f32,
    pub top_peg_count: u32,
    pub rows: u32,
    pub pegs: Vec<Peg>,
    pub slots: Vec<Slot>,
}

/// Rectangle of a static boundary (center + full size)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryRect {
    pub center: Vec2,
    pub size: Vec2,
}

impl BoardLayout {
    /// Build pegs and slots for a `width` x `height` board
    pub fn generate(width: f32, height: f32) -> Result<Self, BoardError> {
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(BoardError::InvalidDimensions { width, height });
        }

        let rows = row_count(width, height);
        let pegs = generate_pegs(width, height, rows);
        let slots = generate_slots(width, height, TOP_PEG_COUNT + rows);

        log::info!(
            "Board {}x{}: {} rows, {} pegs, {} slots",
            width,
            height,
            rows,
            pegs.len(),
            slots.len()
        );

        Ok(Self {
            width,
            height,
            top_peg_count: TOP_PEG_COUNT,
            rows,
            pegs,
            slots,
        })
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Floor plus left/right walls, all just outside the visible area
    pub fn boundaries(&self) -> [BoundaryRect; 3] {
        let (w, h) = (self.width, self.height);
        let t = WALL_THICKNESS;
        [
            // Floor, top edge flush with the bottom of the board
            BoundaryRect {
                center: Vec2::new(w / 2.0, h + t / 2.0),
                size: Vec2::new(w, t),
            },
            BoundaryRect {
                center: Vec2::new(-t / 2.0, h / 2.0),
                size: Vec2::new(t, h),
            },
            BoundaryRect {
                center: Vec2::new(w + t / 2.0, h / 2.0),
                size: Vec2::new(t, h),
            },
        ]
    }
}

/// Horizontal peg spacing for a board width
#[inline]
pub fn peg_spacing(width: f32) -> f32 {
    width * PEG_SPACING_RATIO
}

/// Peg radius for a board width (never below the floor)
#[inline]
pub fn peg_radius(width: f32) -> f32 {
    (width * PEG_RADIUS_RATIO).max(MIN_PEG_RADIUS)
}

/// Rows that fit in the peg field, clamped to bound simulation cost
pub fn row_count(width: f32, height: f32) -> u32 {
    let max_rows = ((height * PEG_FIELD_HEIGHT) / (peg_spacing(width) * 1.15)).floor();
    // Saturating float->int cast keeps huge ratios in range
    (max_rows as u32).clamp(MIN_PEG_ROWS, MAX_PEG_ROWS)
}

fn generate_pegs(width: f32, height: f32, rows: u32) -> Vec<Peg> {
    let spacing = peg_spacing(width);
    let radius = peg_radius(width);
    let row_gap = (height * PEG_FIELD_HEIGHT) / rows as f32;

    let mut pegs = Vec::new();
    let mut next_id = 0;
    for row in 0..rows {
        let count = TOP_PEG_COUNT + row;
        let y = height * PEG_FIELD_TOP + row as f32 * row_gap;
        // Left-most peg offset so the row is centered
        let offset = -((count - 1) as f32 * spacing) / 2.0;

        for i in 0..count {
            let x = width / 2.0 + offset + i as f32 * spacing;
            pegs.push(Peg {
                id: next_id,
                pos: Vec2::new(x, y),
                radius,
            });
            next_id += 1;
        }
    }
    pegs
}

fn generate_slots(width: f32, height: f32, slot_count: u32) -> Vec<Slot> {
    let column = width / slot_count as f32;
    let y = height * SLOT_LINE;

    (0..slot_count as usize)
        .map(|index| Slot {
            index,
            pos: Vec2::new((index as f32 + 0.5) * column, y),
            width: column * SLOT_FILL,
            height: SLOT_SENSOR_HEIGHT,
        })
        .collect()
}
