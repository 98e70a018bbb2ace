use glam::Vec3;

/// Camera that drifts along +X by a fixed step each frame.
///
/// Only `x` drives the stream; the rest is for whoever draws the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlyThroughCamera {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub step: f64,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for FlyThroughCamera {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 25.0,
            z: 90.0,
            step: 0.2,
            fov_degrees: 45.0,
            near: 1.0,
            far: 1000.0,
        }
    }
}

impl FlyThroughCamera {
    pub fn with_step(step: f64) -> Self {
        Self {
            step,
            ..Self::default()
        }
    }

    /// Move one frame forward. Returns the new X.
    pub fn advance(&mut self) -> f64 {
        self.x += self.step;
        self.x
    }

    pub fn eye(&self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }

    /// Point straight ahead down -Z.
    pub fn target(&self) -> Vec3 {
        self.eye() - Vec3::Z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_defaults() {
        let cam = FlyThroughCamera::default();
        assert_eq!(cam.eye(), Vec3::new(0.0, 25.0, 90.0));
        assert_eq!(cam.step, 0.2);
        assert_eq!(cam.fov_degrees, 45.0);
    }

    #[test]
    fn advance_moves_along_x() {
        let mut cam = FlyThroughCamera::with_step(0.5);
        cam.advance();
        assert_eq!(cam.advance(), 1.0);
        assert_eq!(cam.target(), Vec3::new(1.0, 25.0, 89.0));
    }
}
