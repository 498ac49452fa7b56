//! Slot contact resolution
//!
//! Each token goes `Falling -> Scored -> removed` exactly once. The first
//! slot contact scores the token on the spot; removal waits out a short
//! cosmetic delay in the tick-driven queue and never holds up payout.

use std::collections::BTreeMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::multipliers::MultiplierTable;
use super::schedule::DelayQueue;
use super::state::{BatchId, BodyTag, Token, TokenFrame, TokenId, TokenPhase};
use super::world::{PhysicsWorld, SensorContact};

/// A token's first slot contact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landing {
    pub token: TokenId,
    pub batch: BatchId,
    pub slot_index: usize,
    pub multiplier: f64,
}

/// Settled landing, as seen by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreEvent {
    pub event_id: u64,
    pub token: TokenId,
    pub batch: BatchId,
    pub slot_index: usize,
    pub multiplier: f64,
    pub payout: f64,
}

#[derive(Debug)]
pub struct Scorer {
    tokens: BTreeMap<TokenId, Token>,
    removals: DelayQueue<TokenId>,
    settle_delay_ticks: u64,
    landing_rebound: f32,
}

impl Scorer {
    pub fn new(settle_delay_ticks: u64, landing_rebound: f32) -> Self {
        Self {
            tokens: BTreeMap::new(),
            removals: DelayQueue::new(),
            settle_delay_ticks,
            landing_rebound,
        }
    }

    pub fn track(&mut self, token: Token) {
        self.tokens.insert(token.id, token);
    }

    pub fn token(&self, id: TokenId) -> Option<&Token> {
        self.tokens.get(&id)
    }

    pub fn live_count(&self) -> usize {
        self.tokens.len()
    }

    /// Tokens still falling (not yet scored)
    pub fn falling_count(&self) -> usize {
        self.tokens.values().filter(|t| !t.scored()).count()
    }

    /// Handle a sensor contact; returns a landing the first time a token hits a slot
    pub fn on_contact(
        &mut self,
        world: &mut PhysicsWorld,
        contact: SensorContact,
        table: &MultiplierTable,
        now: u64,
    ) -> Option<Landing> {
        let BodyTag::Slot(slot_index) = world.body(contact.sensor)?.tag else {
            return None;
        };
        let BodyTag::Token(token_id) = world.body(contact.body)?.tag else {
            return None;
        };
        let token = self.tokens.get_mut(&token_id)?;

        if token.scored() {
            return None;
        }
        token.phase = TokenPhase::Scored { slot_index };

        let multiplier = table.get(slot_index).unwrap_or(1.0);

        // Small rebound so the landing stays visible until removal
        if let Some(body) = world.dynamic_body_mut(token.body) {
            body.vel = Vec2::new(0.0, -self.landing_rebound);
        }
        self.removals.push(now + self.settle_delay_ticks, token_id);

        Some(Landing {
            token: token_id,
            batch: token.batch,
            slot_index,
            multiplier,
        })
    }

    /// Remove scored tokens whose settle delay has elapsed
    pub fn process_removals(&mut self, world: &mut PhysicsWorld, now: u64) -> Vec<TokenId> {
        let mut removed = Vec::new();
        for token_id in self.removals.pop_due(now) {
            if let Some(token) = self.tokens.remove(&token_id) {
                world.remove_body(token.body);
                removed.push(token_id);
            }
        }
        removed
    }

    /// Drop every tracked token, returning the ones that never scored
    pub fn clear(&mut self, world: &mut PhysicsWorld) -> Vec<Token> {
        self.removals.clear();
        let tokens = std::mem::take(&mut self.tokens);
        let mut unscored = Vec::new();
        for token in tokens.into_values() {
            world.remove_body(token.body);
            if !token.scored() {
                unscored.push(token);
            }
        }
        unscored
    }

    /// Remove tokens that have fallen longer than `max_flight_ticks` without scoring
    pub fn expire_stalled(&mut self, world: &mut PhysicsWorld, max_flight_ticks: u64) -> Vec<Token> {
        let now = world.time_ticks();
        let stalled: Vec<TokenId> = self
            .tokens
            .values()
            .filter(|t| !t.scored() && now.saturating_sub(t.spawned_tick) > max_flight_ticks)
            .map(|t| t.id)
            .collect();

        let mut expired = Vec::with_capacity(stalled.len());
        for id in stalled {
            if let Some(token) = self.tokens.remove(&id) {
                world.remove_body(token.body);
                expired.push(token);
            }
        }
        expired
    }

    /// Positions and angles of every live token
    pub fn frames(&self, world: &PhysicsWorld) -> Vec<TokenFrame> {
        self.tokens
            .values()
            .filter_map(|token| {
                let body = world.body(token.body)?;
                Some(TokenFrame {
                    id: token.id,
                    x: body.pos.x,
                    y: body.pos.y,
                    radius: token.radius,
                    angle: body.angle,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::multipliers::RiskMode;
    use crate::sim::state::{Body, BodyId};

    struct Fixture {
        world: PhysicsWorld,
        scorer: Scorer,
        table: MultiplierTable,
        sensors: Vec<BodyId>,
        token: TokenId,
        token_body: BodyId,
    }

    fn fixture() -> Fixture {
        let mut world = PhysicsWorld::new(980.0, 1500.0);
        let mut scorer = Scorer::new(15, 120.0);
        let table = MultiplierTable::generate(RiskMode::AnteUp, 3);
        let mut sensors = Vec::new();
        for index in 0..3 {
            let sensor = world.add_static_body(Body::sensor_rect(
                BodyTag::Slot(index),
                Vec2::new(10.0 + 20.0 * index as f32, 100.0),
                Vec2::new(18.0, 6.0),
            ));
            sensors.push(sensor);
        }
        let token = TokenId(1);
        let token_body = world.add_dynamic_body(Body::dynamic_circle(
            BodyTag::Token(token),
            Vec2::new(30.0, 0.0),
            5.0,
        ));
        scorer.track(Token {
            id: token,
            body: token_body,
            batch: BatchId(9),
            radius: 5.0,
            phase: TokenPhase::Falling,
            spawned_tick: 0,
        });
        Fixture {
            world,
            scorer,
            table,
            sensors,
            token,
            token_body,
        }
    }

    #[test]
    fn test_first_contact_scores() {
        let mut f = fixture();
        let contact = SensorContact {
            body: f.token_body,
            sensor: f.sensors[0],
        };
        let landing = f.scorer.on_contact(&mut f.world, contact, &f.table, 10).unwrap();
        assert_eq!(landing.slot_index, 0);
        assert_eq!(landing.multiplier, 1.0);
        assert_eq!(landing.batch, BatchId(9));
        assert!(f.scorer.token(f.token).unwrap().scored());
        assert_eq!(f.world.body(f.token_body).unwrap().vel, Vec2::new(0.0, -120.0));
    }

    #[test]
    fn test_repeat_contacts_are_ignored() {
        let mut f = fixture();
        let first = SensorContact {
            body: f.token_body,
            sensor: f.sensors[1],
        };
        let neighbour = SensorContact {
            body: f.token_body,
            sensor: f.sensors[2],
        };
        assert!(f.scorer.on_contact(&mut f.world, first, &f.table, 10).is_some());
        assert!(f.scorer.on_contact(&mut f.world, first, &f.table, 11).is_none());
        assert!(f.scorer.on_contact(&mut f.world, neighbour, &f.table, 12).is_none());
        assert_eq!(
            f.scorer.token(f.token).unwrap().phase,
            TokenPhase::Scored { slot_index: 1 }
        );
    }

    #[test]
    fn test_removal_after_settle_delay() {
        let mut f = fixture();
        let contact = SensorContact {
            body: f.token_body,
            sensor: f.sensors[0],
        };
        f.scorer.on_contact(&mut f.world, contact, &f.table, 10);
        assert!(f.scorer.process_removals(&mut f.world, 24).is_empty());
        assert_eq!(f.scorer.live_count(), 1);
        assert_eq!(f.scorer.process_removals(&mut f.world, 25), vec![f.token]);
        assert_eq!(f.scorer.live_count(), 0);
        assert!(f.world.body(f.token_body).is_none());
        // Late contact for a removed token is a no-op
        assert!(f.scorer.on_contact(&mut f.world, contact, &f.table, 30).is_none());
    }

    #[test]
    fn test_unscored_tokens_never_removed_by_queue() {
        let mut f = fixture();
        assert!(f.scorer.process_removals(&mut f.world, 1_000).is_empty());
        assert_eq!(f.scorer.falling_count(), 1);
    }

    #[test]
    fn test_non_slot_sensor_ignored() {
        let mut f = fixture();
        let contact = SensorContact {
            body: f.token_body,
            sensor: BodyId(999),
        };
        assert!(f.scorer.on_contact(&mut f.world, contact, &f.table, 1).is_none());
        assert!(!f.scorer.token(f.token).unwrap().scored());
    }

    #[test]
    fn test_clear_returns_unscored() {
        let mut f = fixture();
        let unscored = f.scorer.clear(&mut f.world);
        assert_eq!(unscored.len(), 1);
        assert_eq!(unscored[0].id, f.token);
        assert_eq!(f.world.dynamic_count(), 0);
    }

    #[test]
    fn test_frames_report_live_tokens() {
        let f = fixture();
        let frames = f.scorer.frames(&f.world);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].id, f.token);
        assert_eq!(frames[0].x, 30.0);
        assert_eq!(frames[0].radius, 5.0);
    }

    #[test]
    fn test_slot_index_read_from_sensor_tag() {
        let mut f = fixture();
        // A sensor that is not a slot never scores
        let boundary = f.world.add_static_body(Body::sensor_rect(
            BodyTag::Boundary,
            Vec2::new(0.0, 0.0),
            Vec2::new(4.0, 4.0),
        ));
        let contact = SensorContact {
            body: f.token_body,
            sensor: boundary,
        };
        assert!(f.scorer.on_contact(&mut f.world, contact, &f.table, 1).is_none());

        let contact = SensorContact {
            body: f.token_body,
            sensor: f.sensors[2],
        };
        let landing = f.scorer.on_contact(&mut f.world, contact, &f.table, 2).unwrap();
        assert_eq!(landing.slot_index, 2);
        assert_eq!(landing.token, f.token);
    }

    #[test]
    fn test_stalled_token_expires() {
        let mut f = fixture();
        for _ in 0..10 {
            f.world.step(1.0 / 120.0);
        }
        assert!(f.scorer.expire_stalled(&mut f.world, 10).is_empty());
        f.world.step(1.0 / 120.0);
        let expired = f.scorer.expire_stalled(&mut f.world, 10);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, f.token);
        assert_eq!(f.scorer.live_count(), 0);
        assert!(f.world.body(f.token_body).is_none());
    }

    #[test]
    fn test_scored_token_never_expires() {
        let mut f = fixture();
        let contact = SensorContact {
            body: f.token_body,
            sensor: f.sensors[0],
        };
        f.scorer.on_contact(&mut f.world, contact, &f.table, 0);
        for _ in 0..5 {
            f.world.step(1.0 / 120.0);
        }
        assert!(f.scorer.expire_stalled(&mut f.world, 1).is_empty());
        assert_eq!(f.scorer.live_count(), 1);
    }
}
