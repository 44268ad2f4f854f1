//! Pure functions on vectors, quaternions, and rotation matrices.
//!
//! Every function here is total: degenerate inputs are absorbed by substituting a
//! canonical axis rather than by returning an error, per the core's failure model —
//! callers never have to branch on a `Result` from this module. In debug builds a
//! substitution also fires a `debug_assert!` and a `log::trace!` so a host can notice
//! chronic degeneracy (e.g. a zero-length bone direction) without paying for it in
//! release builds.

use nalgebra::{Matrix3, Quaternion, Unit, UnitQuaternion, Vector3};

/// Tolerance used inside the kernel itself (cross-product lengths, triangle-inequality
/// clamps, `acos`/`asin` domain checks).
pub const EPS_CORE: f64 = 1e-14;

/// Tolerance used by the solver's convergence test and documented as the precision
/// contract a caller can rely on.
pub const EPS_USER: f64 = 1e-7;

/// The canonical bone axis. Every bone points along this direction in its own local
/// frame; changing it would invalidate every geometric test in this crate.
#[inline]
pub fn y_axis() -> Vector3<f64> {
    Vector3::y()
}

/// Returns a unit vector orthogonal to `a`, falling back through `ẑ` then `ŷ` as
/// candidates for the cross product if `a` and `b` are (near-)parallel or either input
/// is (near-)zero.
///
/// Degenerate input (`a` near zero, so every cross product is near zero) returns `ŷ`
/// and asserts in debug builds.
pub fn normal(a: &Vector3<f64>, b: &Vector3<f64>) -> Vector3<f64> {
    let mut c = a.cross(b);
    if c.norm_squared() < EPS_CORE {
        c = a.cross(&Vector3::z());
    }
    if c.norm_squared() < EPS_CORE {
        c = a.cross(&Vector3::y());
    }
    if c.norm_squared() < EPS_CORE {
        debug_assert!(false, "normal: no candidate cross product escaped degeneracy");
        log::trace!("normal: degenerate input, falling back to y-axis");
        return Vector3::y();
    }
    c.normalize()
}

/// Signed angle from `from` to `to`, measured about `axis` (which must be unit and
/// orthogonal to the plane spanned by `from` and `to`).
fn oriented_angle(from: &Vector3<f64>, to: &Vector3<f64>, axis: &Vector3<f64>) -> f64 {
    let sin_part = axis.dot(&from.cross(to));
    let cos_part = from.dot(to);
    sin_part.atan2(cos_part)
}

/// Minimal rotation that carries `from` onto `to`. Neither argument needs to be unit.
///
/// Antipodal inputs resolve through [`normal`]'s fallback, producing a `π` rotation
/// around an arbitrary orthogonal axis — deterministic, if not unique.
pub fn rotation_between(from: &Vector3<f64>, to: &Vector3<f64>) -> UnitQuaternion<f64> {
    let cross = from.cross(to);
    if cross.norm_squared() < EPS_CORE && from.dot(to) > 0.0 {
        return UnitQuaternion::identity();
    }
    let axis = normal(from, to);
    let angle = oriented_angle(from, to, &axis);
    UnitQuaternion::from_axis_angle(&Unit::new_unchecked(axis), angle)
}

/// Decomposes `q` into Tait–Bryan angles applied in the order X, then Z, then Y:
/// `q == FromEulerXZY(ToEulerXZY(q))` on the branch `αz ∈ [-π/2, π/2]`.
///
/// Returns `(αx, αz, αy)`.
pub fn to_euler_xzy(q: &UnitQuaternion<f64>) -> (f64, f64, f64) {
    let raw = q.quaternion();
    let (x, y, z, w) = (raw.i, raw.j, raw.k, raw.w);

    let sin_z = (2.0 * (w * z - x * y)).clamp(-1.0, 1.0);
    let az = sin_z.asin();

    let r21 = 2.0 * (y * z + x * w);
    let r11 = 1.0 - 2.0 * (x * x + z * z);
    let ax = if r21.abs() > EPS_CORE || r11.abs() > EPS_CORE {
        r21.atan2(r11)
    } else {
        0.0
    };

    let r02 = 2.0 * (x * z + y * w);
    let r00 = 1.0 - 2.0 * (y * y + z * z);
    let ay = if r02.abs() > EPS_CORE || r00.abs() > EPS_CORE {
        r02.atan2(r00)
    } else {
        0.0
    };

    (ax, az, ay)
}

/// Reconstructs the quaternion for Tait–Bryan angles `(αx, αz, αy)`, equivalent to
/// `angleAxis(αx, x̂) · angleAxis(αz, ẑ) · angleAxis(αy, ŷ)` but computed directly from
/// half-angle sines/cosines — no quaternion product at runtime.
pub fn from_euler_xzy(angles: (f64, f64, f64)) -> UnitQuaternion<f64> {
    let (ax, az, ay) = angles;
    let (sx, cx) = (ax * 0.5).sin_cos();
    let (sz, cz) = (az * 0.5).sin_cos();
    let (sy, cy) = (ay * 0.5).sin_cos();

    let x = sx * cy * cz - cx * sy * sz;
    let y = cx * cz * sy - sx * cy * sz;
    let z = cx * cy * sz + sx * sy * cz;
    let w = cx * cy * cz + sx * sy * sz;

    UnitQuaternion::new_normalize(Quaternion::new(w, x, y, z))
}

/// `target · baseᵀ`, the rotation matrix carrying the `base` frame onto the `target`
/// frame. Not used by the core iteration; exposed for callers that need a matrix form.
pub fn transfer_matrix(base: &Matrix3<f64>, target: &Matrix3<f64>) -> Matrix3<f64> {
    target * base.transpose()
}
