//! Link geometry: node positions and velocities in 3-D space (meters, m/s)

use serde::{Deserialize, Serialize};
use std::ops::Sub;

/// A point or velocity in 3-D space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Distance to another point in meters
    pub fn distance_to(&self, other: &Vec3) -> f64 {
        (*self - *other).norm()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// Sender and receiver kinematics for one link
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LinkGeometry {
    pub sender_position: Vec3,
    pub receiver_position: Vec3,
    pub sender_velocity: Vec3,
    pub receiver_velocity: Vec3,
}

impl LinkGeometry {
    /// Static link between two points
    pub fn fixed(sender: Vec3, receiver: Vec3) -> Self {
        Self {
            sender_position: sender,
            receiver_position: receiver,
            ..Default::default()
        }
    }

    pub fn with_velocities(mut self, sender: Vec3, receiver: Vec3) -> Self {
        self.sender_velocity = sender;
        self.receiver_velocity = receiver;
        self
    }

    /// Sender-receiver separation in meters
    pub fn distance(&self) -> f64 {
        self.sender_position.distance_to(&self.receiver_position)
    }

    /// Rate at which the separation shrinks (m/s, positive when closing)
    pub fn closing_speed(&self) -> f64 {
        let los = self.receiver_position - self.sender_position;
        let range = los.norm();
        if range == 0.0 {
            return 0.0;
        }
        let relative = self.receiver_velocity - self.sender_velocity;
        -relative.dot(&los) / range
    }

    pub fn is_finite(&self) -> bool {
        self.sender_position.is_finite()
            && self.receiver_position.is_finite()
            && self.sender_velocity.is_finite()
            && self.receiver_velocity.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 12.0);
        assert!((a.distance_to(&b) - 13.0).abs() < 1e-12);
    }

    #[test]
    fn test_closing_speed() {
        let geo = LinkGeometry::fixed(Vec3::ZERO, Vec3::new(100.0, 0.0, 0.0))
            .with_velocities(Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO);
        assert!((geo.closing_speed() - 10.0).abs() < 1e-12);

        // Receiver moving away
        let geo = geo.with_velocities(Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0));
        assert!((geo.closing_speed() + 5.0).abs() < 1e-12);

        // Tangential motion does not change range
        let geo = geo.with_velocities(Vec3::new(0.0, 30.0, 0.0), Vec3::ZERO);
        assert!(geo.closing_speed().abs() < 1e-12);
    }

    #[test]
    fn test_colocated() {
        let geo = LinkGeometry::fixed(Vec3::ZERO, Vec3::ZERO);
        assert_eq!(geo.distance(), 0.0);
        assert_eq!(geo.closing_speed(), 0.0);
    }
}
