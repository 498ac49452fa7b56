//! Token spawning
//!
//! Tokens are spread evenly around the horizontal center, with spacing
//! capped so they never overlap, and every position is clamped into the
//! legal spawn band regardless of how many are requested.

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::state::{BatchId, Body, BodyTag, Token, TokenId, TokenPhase};
use super::world::PhysicsWorld;
use crate::consts::*;

/// Physical parameters applied to every spawned token
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnParams {
    pub restitution: f32,
    pub air_friction: f32,
    /// Full width of the horizontal velocity jitter (pixels/s)
    pub vx_jitter: f32,
    /// Full width of the angular velocity jitter (radians/s)
    pub spin_jitter: f32,
}

impl Default for SpawnParams {
    fn default() -> Self {
        Self {
            restitution: TOKEN_RESTITUTION,
            air_friction: TOKEN_AIR_FRICTION,
            vx_jitter: TOKEN_SPAWN_VX_JITTER,
            spin_jitter: TOKEN_SPAWN_SPIN_JITTER,
        }
    }
}

/// Token radius for a board width
#[inline]
pub fn token_radius(width: f32) -> f32 {
    (width * TOKEN_RADIUS_RATIO).max(MIN_TOKEN_RADIUS)
}

/// Spawn positions for `count` tokens on a `width` x `height` board
pub fn spawn_positions(width: f32, height: f32, count: u32) -> Vec<Vec2> {
    if count == 0 {
        return Vec::new();
    }

    let radius = token_radius(width);
    let margin = width * TOKEN_SPAWN_MARGIN;
    let min_x = margin + radius;
    let max_x = (width - margin - radius).max(min_x);

    let base_spread = radius * TOKEN_SPAWN_SPACING;
    let spread = if count > 1 {
        base_spread.min((max_x - min_x) / (count - 1) as f32)
    } else {
        0.0
    };

    let y = height * TOKEN_SPAWN_HEIGHT;
    (0..count)
        .map(|i| {
            let offset_index = i as f32 - (count - 1) as f32 / 2.0;
            let x = (width / 2.0 + offset_index * spread).clamp(min_x, max_x);
            Vec2::new(x, y)
        })
        .collect()
}

/// Creates token bodies and hands out token ids
#[derive(Debug)]
pub struct Spawner {
    params: SpawnParams,
    next_token_id: u64,
}

impl Spawner {
    pub fn new(params: SpawnParams) -> Self {
        Self {
            params,
            next_token_id: 1,
        }
    }

    pub fn params(&self) -> &SpawnParams {
        &self.params
    }

    /// Register `count` new tokens for `batch` with the world
    ///
    /// A zero count spawns nothing.
    pub fn spawn(
        &mut self,
        world: &mut PhysicsWorld,
        rng: &mut Pcg32,
        width: f32,
        height: f32,
        count: u32,
        batch: BatchId,
    ) -> Vec<Token> {
        let radius = token_radius(width);
        let positions = spawn_positions(width, height, count);
        let spawned_tick = world.time_ticks();
        let mut tokens = Vec::with_capacity(positions.len());

        for pos in positions {
            let id = TokenId(self.next_token_id);
            self.next_token_id += 1;

            let mut body = Body::dynamic_circle(BodyTag::Token(id), pos, radius);
            body.restitution = self.params.restitution;
            body.air_friction = self.params.air_friction;
            body.vel = Vec2::new(jitter(rng, self.params.vx_jitter), 0.0);
            body.angular_vel = jitter(rng, self.params.spin_jitter);

            let body_id = world.add_dynamic_body(body);
            tokens.push(Token {
                id,
                body: body_id,
                batch,
                radius,
                phase: TokenPhase::Falling,
                spawned_tick,
            });
        }

        if !tokens.is_empty() {
            log::debug!("Spawned {} tokens for batch {:?}", tokens.len(), batch);
        }
        tokens
    }
}

/// Uniform value in [-width/2, width/2)
fn jitter(rng: &mut Pcg32, width: f32) -> f32 {
    if width <= 0.0 {
        return 0.0;
    }
    rng.random_range(-0.5..0.5) * width
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::RngState;
    use proptest::prelude::*;

    #[test]
    fn test_single_token_spawns_at_center() {
        let positions = spawn_positions(1000.0, 800.0, 1);
        assert_eq!(positions.len(), 1);
        assert!((positions[0] - Vec2::new(500.0, 40.0)).length() < 1e-3);
    }

    #[test]
    fn test_spread_is_symmetric() {
        let positions = spawn_positions(1000.0, 800.0, 5);
        assert_eq!(positions.len(), 5);
        // radius 10 -> spacing 24
        assert!((positions[1].x - positions[0].x - 24.0).abs() < 1e-3);
        assert!((positions[0].x + positions[4].x - 1000.0).abs() < 1e-3);
    }

    #[test]
    fn test_zero_count_is_noop() {
        let mut world = PhysicsWorld::new(GRAVITY, TOKEN_MAX_SPEED);
        let mut rng = RngState::new(1).to_rng();
        let mut spawner = Spawner::new(SpawnParams::default());
        let tokens = spawner.spawn(&mut world, &mut rng, 1000.0, 800.0, 0, BatchId(1));
        assert!(tokens.is_empty());
        assert_eq!(world.dynamic_count(), 0);
    }

    #[test]
    fn test_token_ids_increase_across_batches() {
        let mut world = PhysicsWorld::new(GRAVITY, TOKEN_MAX_SPEED);
        let mut rng = RngState::new(7).to_rng();
        let mut spawner = Spawner::new(SpawnParams::default());
        let first = spawner.spawn(&mut world, &mut rng, 1000.0, 800.0, 3, BatchId(1));
        let second = spawner.spawn(&mut world, &mut rng, 1000.0, 800.0, 2, BatchId(2));
        let ids: Vec<u64> = first.iter().chain(&second).map(|t| t.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert!(second.iter().all(|t| t.batch == BatchId(2)));
        assert_eq!(world.dynamic_count(), 5);
    }

    #[test]
    fn test_spawn_jitter_bounded() {
        let mut world = PhysicsWorld::new(GRAVITY, TOKEN_MAX_SPEED);
        let mut rng = RngState::new(99).to_rng();
        let mut spawner = Spawner::new(SpawnParams::default());
        let tokens = spawner.spawn(&mut world, &mut rng, 1000.0, 800.0, 5, BatchId(1));
        for token in tokens {
            let body = world.body(token.body).unwrap();
            assert!(body.vel.x.abs() <= TOKEN_SPAWN_VX_JITTER / 2.0);
            assert_eq!(body.vel.y, 0.0);
            assert!(body.angular_vel.abs() <= TOKEN_SPAWN_SPIN_JITTER / 2.0);
        }
    }

    #[test]
    fn test_same_seed_same_jitter() {
        let run = |seed| {
            let mut world = PhysicsWorld::new(GRAVITY, TOKEN_MAX_SPEED);
            let mut rng = RngState::new(seed).to_rng();
            let mut spawner = Spawner::new(SpawnParams::default());
            let tokens = spawner.spawn(&mut world, &mut rng, 1000.0, 800.0, 3, BatchId(1));
            tokens
                .iter()
                .map(|t| world.body(t.body).unwrap().vel)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
    }

    proptest! {
        #[test]
        fn prop_positions_stay_in_band(w in 100.0f32..3000.0, h in 100.0f32..3000.0, count in 0u32..200) {
            let positions = spawn_positions(w, h, count);
            prop_assert_eq!(positions.len(), count as usize);
            let radius = token_radius(w);
            let min_x = w * TOKEN_SPAWN_MARGIN + radius;
            let max_x = w - w * TOKEN_SPAWN_MARGIN - radius;
            for pair in positions.windows(2) {
                prop_assert!(pair[0].x <= pair[1].x);
            }
            for pos in positions {
                prop_assert!(pos.x >= min_x - 1e-3 && pos.x <= max_x + 1e-3);
            }
        }
    }
}
