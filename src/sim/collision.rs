//! Collision detection and response for circles against pegs and boxes
//!
//! Tokens are circles; pegs are circles; boundaries and slot sensors are
//! axis-aligned rectangles. Every test returns the normal pointing from the
//! obstacle toward the token, ready for the bounce response.

use glam::Vec2;

/// Result of a collision check
#[derive(Debug, Clone)]
pub struct CollisionResult {
    /// Whether a collision occurred
    pub hit: bool,
    /// Contact point on the obstacle surface (if hit)
    pub point: Vec2,
    /// Surface normal at collision (pointing toward the token center)
    pub normal: Vec2,
    /// Penetration depth (for position correction)
    pub penetration: f32,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            point: Vec2::ZERO,
            normal: Vec2::ZERO,
            penetration: 0.0,
        }
    }
}

/// Check collision between a moving circle and a static circle
pub fn circle_circle_collision(
    pos: Vec2,
    radius: f32,
    other_pos: Vec2,
    other_radius: f32,
) -> CollisionResult {
    let delta = pos - other_pos;
    let dist_sq = delta.length_squared();
    let min_dist = radius + other_radius;

    if dist_sq >= min_dist * min_dist {
        return CollisionResult::miss();
    }

    let dist = dist_sq.sqrt();
    // Concentric: push straight up, out of the peg
    let normal = if dist > 1e-6 { delta / dist } else { Vec2::NEG_Y };

    CollisionResult {
        hit: true,
        point: other_pos + normal * other_radius,
        normal,
        penetration: min_dist - dist,
    }
}

/// Check collision between a circle and an axis-aligned rectangle
pub fn circle_rect_collision(
    pos: Vec2,
    radius: f32,
    center: Vec2,
    half_extents: Vec2,
) -> CollisionResult {
    let local = pos - center;
    let closest = local.clamp(-half_extents, half_extents);
    let delta = local - closest;
    let dist_sq = delta.length_squared();

    if dist_sq > 1e-12 {
        if dist_sq >= radius * radius {
            return CollisionResult::miss();
        }
        let dist = dist_sq.sqrt();
        return CollisionResult {
            hit: true,
            point: center + closest,
            normal: delta / dist,
            penetration: radius - dist,
        };
    }

    // Center inside the box - exit through the nearest face
    let to_x = half_extents.x - local.x.abs();
    let to_y = half_extents.y - local.y.abs();
    let (normal, depth) = if to_x < to_y {
        (Vec2::new(local.x.signum(), 0.0), to_x)
    } else {
        (Vec2::new(0.0, local.y.signum()), to_y)
    };

    CollisionResult {
        hit: true,
        point: pos + normal * depth,
        normal,
        penetration: depth + radius,
    }
}

/// Overlap test only, for sensors
#[inline]
pub fn circle_overlaps_rect(pos: Vec2, radius: f32, center: Vec2, half_extents: Vec2) -> bool {
    circle_rect_collision(pos, radius, center, half_extents).hit
}

/// Bounce off a static surface with restitution
///
/// Only the normal component is scaled; with zero friction the tangential
/// component is kept as-is. Separating velocities are left untouched.
pub fn bounce_velocity(velocity: Vec2, normal: Vec2, restitution: f32) -> Vec2 {
    let vn = velocity.dot(normal);
    if vn >= 0.0 {
        return velocity;
    }
    velocity - (1.0 + restitution) * vn * normal
}

/// Equal-mass impulse between two circles
///
/// `normal` points from `a` toward `b`. Returns the new velocities.
pub fn equal_mass_impulse(vel_a: Vec2, vel_b: Vec2, normal: Vec2, restitution: f32) -> (Vec2, Vec2) {
    let rel_vn = (vel_b - vel_a).dot(normal);
    if rel_vn >= 0.0 {
        return (vel_a, vel_b);
    }
    let impulse = -(1.0 + restitution) * rel_vn * 0.5;
    (vel_a - normal * impulse, vel_b + normal * impulse)
}
