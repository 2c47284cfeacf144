use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Sub};

///Represents a vector in 2D space.
///The planet surface is centered on the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    ///Builds a unit vector pointing at `angle` radians.
    pub fn from_angle(angle: f32) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn magnitude_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    ///Returns the normalized vector, or zero for a zero-length input.
    pub fn normalize(&self) -> Vec2 {
        let mag = self.magnitude();
        if mag == 0.0 || !mag.is_finite() {
            Vec2::ZERO
        } else {
            Vec2 {
                x: self.x / mag,
                y: self.y / mag,
            }
        }
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vec2 {
        Vec2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    pub fn distance_squared(&self, other: Vec2) -> f32 {
        (*self - other).magnitude_squared()
    }

    pub fn distance(&self, other: Vec2) -> f32 {
        (*self - other).magnitude()
    }

    ///Angle of the vector in radians, measured from the +x axis.
    pub fn angle(&self) -> f32 {
        self.y.atan2(self.x)
    }

    ///Rotates the vector counter-clockwise by `angle` radians.
    pub fn rotate(&self, angle: f32) -> Vec2 {
        let (sin, cos) = angle.sin_cos();
        Vec2 {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
        }
    }

    ///Clamps each component into `[-1, 1]` and drops non-finite values.
    ///Used to sanitize stick-style input coming off the wire.
    pub fn clamp_unit(&self) -> Vec2 {
        let clean = |v: f32| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
        Vec2 {
            x: clean(self.x),
            y: clean(self.y),
        }
    }

    ///Pulls the point back inside a disc of `radius` around the origin.
    ///Returns true if the point had to be moved.
    pub fn clamp_to_disc(&mut self, radius: f32) -> bool {
        let dist = self.magnitude();
        if dist > radius && dist > 0.0 {
            *self = self.scale(radius / dist);
            true
        } else {
            false
        }
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, other: Vec2) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, scalar: f32) -> Vec2 {
        self.scale(scalar)
    }
}

///Returns true if two circles overlap or touch.
pub fn circles_overlap(a: Vec2, radius_a: f32, b: Vec2, radius_b: f32) -> bool {
    let reach = radius_a + radius_b;
    a.distance_squared(b) <= reach * reach
}
