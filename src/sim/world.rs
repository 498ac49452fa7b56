//! Physics world
//!
//! Owns every body, the gravity constant and the fixed step. Static bodies
//! (pegs, boundaries) and sensors (slots) live apart from dynamic bodies so a
//! step can mutate tokens while reading obstacles. Iteration follows `BodyId`
//! order, which keeps a seeded run reproducible.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;

use super::collision::{
    bounce_velocity, circle_circle_collision, circle_overlaps_rect, circle_rect_collision,
    equal_mass_impulse,
};
use super::state::{Body, BodyId, BodyKind, Shape};

/// A dynamic body started overlapping a sensor during a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorContact {
    pub body: BodyId,
    pub sensor: BodyId,
}

pub struct PhysicsWorld {
    gravity: Vec2,
    max_speed: f32,
    /// Static obstacles and sensors (never move)
    fixed: BTreeMap<BodyId, Body>,
    /// Integrated bodies
    dynamic: BTreeMap<BodyId, Body>,
    /// Dynamic/sensor pairs currently overlapping
    active_contacts: BTreeSet<(BodyId, BodyId)>,
    /// Contacts raised since the last drain
    contacts: Vec<SensorContact>,
    next_id: u32,
    time_ticks: u64,
}

impl PhysicsWorld {
    pub fn new(gravity: f32, max_speed: f32) -> Self {
        Self {
            gravity: Vec2::new(0.0, gravity),
            max_speed,
            fixed: BTreeMap::new(),
            dynamic: BTreeMap::new(),
            active_contacts: BTreeSet::new(),
            contacts: Vec::new(),
            next_id: 1,
            time_ticks: 0,
        }
    }

    fn allocate_id(&mut self) -> BodyId {
        let id = BodyId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add a static or sensor body
    pub fn add_static_body(&mut self, mut body: Body) -> BodyId {
        if body.kind == BodyKind::Dynamic {
            body.kind = BodyKind::Static;
        }
        body.vel = Vec2::ZERO;
        body.angular_vel = 0.0;
        let id = self.allocate_id();
        self.fixed.insert(id, body);
        id
    }

    pub fn add_dynamic_body(&mut self, mut body: Body) -> BodyId {
        body.kind = BodyKind::Dynamic;
        let id = self.allocate_id();
        self.dynamic.insert(id, body);
        id
    }

    pub fn remove_body(&mut self, id: BodyId) -> Option<Body> {
        self.active_contacts.retain(|&(a, b)| a != id && b != id);
        self.dynamic.remove(&id).or_else(|| self.fixed.remove(&id))
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.dynamic.get(&id).or_else(|| self.fixed.get(&id))
    }

    /// Mutable access to a dynamic body (static bodies are immutable once added)
    pub fn dynamic_body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.dynamic.get_mut(&id)
    }

    pub fn dynamic_count(&self) -> usize {
        self.dynamic.len()
    }

    pub fn static_count(&self) -> usize {
        self.fixed.len()
    }

    pub fn time_ticks(&self) -> u64 {
        self.time_ticks
    }

    /// Take the sensor contacts raised since the last call
    pub fn drain_contacts(&mut self) -> Vec<SensorContact> {
        std::mem::take(&mut self.contacts)
    }

    /// Advance the world by one fixed timestep
    pub fn step(&mut self, dt: f32) {
        self.time_ticks += 1;

        self.integrate(dt);
        self.resolve_static_contacts();
        self.resolve_dynamic_pairs();
        self.detect_sensor_contacts(dt);
    }

    fn integrate(&mut self, dt: f32) {
        for body in self.dynamic.values_mut() {
            body.vel += self.gravity * dt;
            // Air friction is specified per 1/60 s frame
            let damping = (1.0 - body.air_friction).powf(dt * 60.0);
            body.vel *= damping;
            body.angular_vel *= damping;
            body.vel = body.vel.clamp_length_max(self.max_speed);

            body.pos += body.vel * dt;
            body.angle += body.angular_vel * dt;
        }
    }

    fn resolve_static_contacts(&mut self) {
        for body in self.dynamic.values_mut() {
            let radius = body.radius();
            for obstacle in self.fixed.values() {
                if obstacle.kind == BodyKind::Sensor {
                    continue;
                }
                let result = match obstacle.shape {
                    Shape::Circle { radius: r } => {
                        circle_circle_collision(body.pos, radius, obstacle.pos, r)
                    }
                    Shape::Rect { half_extents } => {
                        circle_rect_collision(body.pos, radius, obstacle.pos, half_extents)
                    }
                };
                if result.hit {
                    body.pos += result.normal * result.penetration;
                    let restitution = body.restitution.max(obstacle.restitution);
                    body.vel = bounce_velocity(body.vel, result.normal, restitution);
                }
            }
        }
    }

    fn resolve_dynamic_pairs(&mut self) {
        let ids: Vec<BodyId> = self.dynamic.keys().copied().collect();
        for (i, &a_id) in ids.iter().enumerate() {
            for &b_id in &ids[i + 1..] {
                let (Some(a), Some(b)) = (self.dynamic.get(&a_id), self.dynamic.get(&b_id)) else {
                    continue;
                };
                let result = circle_circle_collision(b.pos, b.radius(), a.pos, a.radius());
                if !result.hit {
                    continue;
                }
                // result.normal points from a toward b
                let normal = result.normal;
                let restitution = (a.restitution + b.restitution) * 0.5;
                let (vel_a, vel_b) = equal_mass_impulse(a.vel, b.vel, normal, restitution);
                let separation = normal * (result.penetration * 0.5);

                if let Some(a) = self.dynamic.get_mut(&a_id) {
                    a.vel = vel_a;
                    a.pos -= separation;
                }
                if let Some(b) = self.dynamic.get_mut(&b_id) {
                    b.vel = vel_b;
                    b.pos += separation;
                }
            }
        }
    }

    /// Overlap is tested over the whole step's travel so a fast token
    /// cannot skip a thin sensor
    fn detect_sensor_contacts(&mut self, dt: f32) {
        for (&body_id, body) in &self.dynamic {
            let travel = body.vel * dt;
            let swept_center = body.pos - travel * 0.5;
            let swept_extra = travel.abs() * 0.5;
            for (&sensor_id, sensor) in &self.fixed {
                let (BodyKind::Sensor, Shape::Rect { half_extents }) = (sensor.kind, sensor.shape)
                else {
                    continue;
                };
                let key = (body_id, sensor_id);
                if circle_overlaps_rect(
                    swept_center,
                    body.radius(),
                    sensor.pos,
                    half_extents + swept_extra,
                ) {
                    if self.active_contacts.insert(key) {
                        self.contacts.push(SensorContact {
                            body: body_id,
                            sensor: sensor_id,
                        });
                    }
                } else {
                    self.active_contacts.remove(&key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::{BodyTag, TokenId};

    fn token_at(pos: Vec2) -> Body {
        let mut body = Body::dynamic_circle(BodyTag::Token(TokenId(1)), pos, 5.0);
        body.restitution = 0.5;
        body
    }

    #[test]
    fn test_gravity_accelerates_downward() {
        let mut world = PhysicsWorld::new(980.0, 1500.0);
        let id = world.add_dynamic_body(token_at(Vec2::new(50.0, 0.0)));
        for _ in 0..60 {
            world.step(1.0 / 120.0);
        }
        let body = world.body(id).unwrap();
        // Half a second of free fall: v = g t, y ~ g t² / 2
        assert!((body.vel.y - 490.0).abs() < 5.0);
        assert!(body.pos.y > 115.0 && body.pos.y < 130.0);
        assert_eq!(world.time_ticks(), 60);
    }

    #[test]
    fn test_floor_stops_token() {
        let mut world = PhysicsWorld::new(980.0, 1500.0);
        world.add_static_body(Body::static_rect(
            BodyTag::Boundary,
            Vec2::new(50.0, 125.0),
            Vec2::new(200.0, 50.0),
        ));
        let id = world.add_dynamic_body(token_at(Vec2::new(50.0, 0.0)));
        for _ in 0..600 {
            world.step(1.0 / 120.0);
        }
        let body = world.body(id).unwrap();
        // Resting on the floor top (y = 100) with radius 5
        assert!(body.pos.y <= 100.0 && body.pos.y > 90.0);
    }

    #[test]
    fn test_peg_deflects_token() {
        let mut world = PhysicsWorld::new(980.0, 1500.0);
        world.add_static_body(Body::static_circle(BodyTag::Peg(0), Vec2::new(50.0, 60.0), 4.0, 0.3));
        // Slightly right of the peg top, so it rolls off to the right
        let id = world.add_dynamic_body(token_at(Vec2::new(52.0, 0.0)));
        for _ in 0..120 {
            world.step(1.0 / 120.0);
        }
        let body = world.body(id).unwrap();
        assert!(body.pos.x > 52.0);
        assert!(body.pos.y > 60.0);
    }

    #[test]
    fn test_sensor_contact_raised_once() {
        let mut world = PhysicsWorld::new(980.0, 1500.0);
        let sensor = world.add_static_body(Body::sensor_rect(
            BodyTag::Slot(0),
            Vec2::new(50.0, 100.0),
            Vec2::new(40.0, 6.0),
        ));
        let id = world.add_dynamic_body(token_at(Vec2::new(50.0, 0.0)));
        let mut contacts = Vec::new();
        for _ in 0..240 {
            world.step(1.0 / 120.0);
            contacts.extend(world.drain_contacts());
        }
        assert_eq!(contacts, vec![SensorContact { body: id, sensor }]);
        // Sensors do not stop the token
        assert!(world.body(id).unwrap().pos.y > 110.0);
    }

    #[test]
    fn test_fast_token_cannot_skip_thin_sensor() {
        let mut world = PhysicsWorld::new(0.0, 1500.0);
        let sensor = world.add_static_body(Body::sensor_rect(
            BodyTag::Slot(0),
            Vec2::new(0.0, 44.0),
            Vec2::new(40.0, 2.0),
        ));
        let mut body = Body::dynamic_circle(BodyTag::Token(TokenId(1)), Vec2::ZERO, 1.0);
        body.vel = Vec2::new(0.0, 1500.0);
        let id = world.add_dynamic_body(body);
        let mut contacts = Vec::new();
        for _ in 0..8 {
            world.step(1.0 / 120.0);
            contacts.extend(world.drain_contacts());
        }
        assert_eq!(contacts, vec![SensorContact { body: id, sensor }]);
    }

    #[test]
    fn test_tokens_push_apart() {
        let mut world = PhysicsWorld::new(0.0, 1500.0);
        let a = world.add_dynamic_body(token_at(Vec2::new(0.0, 0.0)));
        let b = world.add_dynamic_body(token_at(Vec2::new(6.0, 0.0)));
        world.step(1.0 / 120.0);
        let a = world.body(a).unwrap().pos;
        let b = world.body(b).unwrap().pos;
        assert!((b - a).length() >= 9.99);
    }

    #[test]
    fn test_remove_body() {
        let mut world = PhysicsWorld::new(980.0, 1500.0);
        let id = world.add_dynamic_body(token_at(Vec2::ZERO));
        assert_eq!(world.dynamic_count(), 1);
        assert!(world.remove_body(id).is_some());
        assert!(world.remove_body(id).is_none());
        assert!(world.body(id).is_none());
        assert_eq!(world.dynamic_count(), 0);
    }

    #[test]
    fn test_ids_are_unique_across_kinds() {
        let mut world = PhysicsWorld::new(980.0, 1500.0);
        let a = world.add_static_body(Body::static_circle(BodyTag::Peg(0), Vec2::ZERO, 3.0, 0.3));
        let b = world.add_dynamic_body(token_at(Vec2::ZERO));
        assert_ne!(a, b);
        assert_eq!(world.static_count(), 1);
    }
}
