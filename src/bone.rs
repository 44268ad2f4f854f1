//! A single rigid segment of a chain.

use nalgebra::UnitQuaternion;
use std::f64::consts::PI;

use crate::error::IkError;
use crate::kernel::{from_euler_xzy, to_euler_xzy};

/// A rest length cached alongside its square, so the analytic joint solver never has to
/// re-derive `l²` from `l` inside a hot loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Length {
    l: f64,
    l2: f64,
}

impl Length {
    /// `length` must be strictly positive.
    pub fn new(length: f64) -> Result<Self, IkError> {
        if length <= 0.0 {
            return Err(IkError::NonPositiveLength { length });
        }
        Ok(Length {
            l: length,
            l2: length * length,
        })
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.l
    }

    #[inline]
    pub fn squared(&self) -> f64 {
        self.l2
    }
}

/// Per-joint rotational limits, applied on the Tait–Bryan X-Z-Y decomposition of a
/// bone's local rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraints {
    /// Fraction of the ideal per-iteration rotation actually applied. `0` locks the
    /// joint; `1` leaves it unconstrained.
    pub flexibility: f64,
    pub min_angles: (f64, f64, f64),
    pub max_angles: (f64, f64, f64),
}

impl Default for Constraints {
    fn default() -> Self {
        Constraints {
            flexibility: 1.0,
            min_angles: (-PI, -PI, -PI),
            max_angles: (PI, PI, PI),
        }
    }
}

/// A single segment between two joints: a rest length, a rotation relative to its
/// parent, a cached world orientation, and a constraint box.
///
/// `global_orientation` is a cache written by the forward pass. Between a call to
/// [`crate::solver::Solver::iterate_back`] and the following
/// [`crate::solver::Solver::iterate_front`], it is stale and must not be read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bone {
    length: Length,
    rotation: UnitQuaternion<f64>,
    global_orientation: UnitQuaternion<f64>,
    constraints: Constraints,
}

impl Bone {
    /// `length` must be strictly positive. `local_rotation` is normalized on entry.
    pub fn new(length: f64, local_rotation: UnitQuaternion<f64>) -> Result<Self, IkError> {
        Ok(Bone {
            length: Length::new(length)?,
            rotation: UnitQuaternion::new_normalize(local_rotation.into_inner()),
            global_orientation: UnitQuaternion::identity(),
            constraints: Constraints::default(),
        })
    }

    #[inline]
    pub fn length(&self) -> Length {
        self.length
    }

    #[inline]
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        self.rotation
    }

    pub fn set_rotation(&mut self, q: UnitQuaternion<f64>) {
        self.rotation = q;
    }

    #[inline]
    pub fn global_orientation(&self) -> UnitQuaternion<f64> {
        self.global_orientation
    }

    pub fn set_global_orientation(&mut self, q: UnitQuaternion<f64>) {
        self.global_orientation = q;
    }

    #[inline]
    pub fn constraints(&self) -> Constraints {
        self.constraints
    }

    pub fn set_constraints(&mut self, c: Constraints) {
        self.constraints = c;
    }

    /// Projects `q` onto this bone's allowed Euler-angle box.
    ///
    /// The X-Z-Y decomposition order is intentional: clamping X first and Y last keeps
    /// a symmetric X limit intact even after a further Y rotation is composed in.
    pub fn apply_constraint(&self, q: UnitQuaternion<f64>) -> UnitQuaternion<f64> {
        let (ax, az, ay) = to_euler_xzy(&q);
        let (min_x, min_z, min_y) = self.constraints.min_angles;
        let (max_x, max_z, max_y) = self.constraints.max_angles;
        from_euler_xzy((
            ax.clamp(min_x, max_x),
            az.clamp(min_z, max_z),
            ay.clamp(min_y, max_y),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rejects_non_positive_length() {
        assert!(Length::new(0.0).is_err());
        assert!(Length::new(-1.0).is_err());
        assert!(Bone::new(0.0, UnitQuaternion::identity()).is_err());
    }

    #[test]
    fn length_caches_square() {
        let l = Length::new(2.0).unwrap();
        assert_abs_diff_eq!(l.value(), 2.0);
        assert_abs_diff_eq!(l.squared(), 4.0);
    }

    #[test]
    fn default_constraints_are_unconstrained_and_fully_flexible() {
        let c = Constraints::default();
        assert_abs_diff_eq!(c.flexibility, 1.0);
        assert_abs_diff_eq!(c.min_angles.0, -PI);
        assert_abs_diff_eq!(c.max_angles.0, PI);
    }

    #[test]
    fn apply_constraint_clamps_into_box() {
        let mut bone = Bone::new(1.0, UnitQuaternion::identity()).unwrap();
        bone.set_constraints(Constraints {
            flexibility: 1.0,
            min_angles: (-PI / 4.0, 0.0, -PI / 4.0),
            max_angles: (PI / 4.0, 0.0, PI / 4.0),
        });
        let extreme = UnitQuaternion::from_euler_angles(PI / 2.0, 0.0, PI / 2.0);
        let projected = bone.apply_constraint(extreme);
        let (ax, az, ay) = to_euler_xzy(&projected);
        assert!(ax <= PI / 4.0 + 1e-9 && ax >= -PI / 4.0 - 1e-9);
        assert_abs_diff_eq!(az, 0.0, epsilon = 1e-9);
        assert!(ay <= PI / 4.0 + 1e-9 && ay >= -PI / 4.0 - 1e-9);
    }

    #[test]
    fn apply_constraint_is_identity_when_already_inside_box() {
        let bone = Bone::new(1.0, UnitQuaternion::identity()).unwrap();
        let q = from_euler_xzy((0.1, 0.05, -0.2));
        let projected = bone.apply_constraint(q);
        assert_abs_diff_eq!(projected.angle_to(&q), 0.0, epsilon = 1e-9);
    }
}
