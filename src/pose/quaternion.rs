//! A hand-rolled unit quaternion with exactly the operations the RK4
//! integrator needs: component-wise add and scalar multiplication (to
//! combine RK4 slopes), normalization with a `w ≥ 0` sign convention,
//! conversion to a rotation matrix, and quaternion multiplication. These are
//! reimplemented rather than delegated to a generic linear-algebra
//! dependency, per the integration contract this module is grounded on
//! (a JPL-convention composition, not the Hamilton product most quaternion
//! libraries default to).

use super::vector::Vector3;

/// `(x, y, z, w)` stored with `w` named last to match the JPL layout the
/// integrator's slope combination is grounded on; callers outside this
/// module should treat the fields as opaque and go through the methods.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    /// The identity rotation.
    pub const IDENTITY: Quaternion = Quaternion { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// Component-wise addition, used to combine RK4 slopes.
    pub fn add(self, rhs: Quaternion) -> Quaternion {
        Quaternion::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z, self.w + rhs.w)
    }

    /// Component-wise scalar multiplication.
    pub fn scale(self, s: f64) -> Quaternion {
        Quaternion::new(self.x * s, self.y * s, self.z * s, self.w * s)
    }

    pub fn norm(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    /// Normalize to unit length, flipping sign first if `w < 0` so the
    /// result always has `w ≥ 0`.
    pub fn normalized(self) -> Quaternion {
        let q = if self.w < 0.0 { self.scale(-1.0) } else { self };
        let n = q.norm();
        if n == 0.0 {
            q
        } else {
            q.scale(1.0 / n)
        }
    }

    /// JPL quaternion product `self ⊗ rhs`, sign-normalized so the result's
    /// `w` is never negative.
    pub fn multiply(self, rhs: Quaternion) -> Quaternion {
        let (qx, qy, qz, qw) = (self.x, self.y, self.z, self.w);
        let (px, py, pz, pw) = (rhs.x, rhs.y, rhs.z, rhs.w);
        let result = Quaternion::new(
            qw * px + qz * py - qy * pz + qx * pw,
            -qz * px + qw * py + qx * pz + qy * pw,
            qy * px - qx * py + qw * pz + qz * pw,
            -qx * px - qy * py - qz * pz + qw * pw,
        );
        if result.w < 0.0 {
            result.scale(-1.0)
        } else {
            result
        }
    }

    pub fn conjugate(self) -> Quaternion {
        Quaternion::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Inverse of a unit quaternion (its conjugate).
    pub fn inverse(self) -> Quaternion {
        self.conjugate()
    }

    /// The JPL rotation matrix this quaternion represents, row-major.
    pub fn to_rotation_matrix(self) -> [[f64; 3]; 3] {
        let (qx, qy, qz, qw) = (self.x, self.y, self.z, self.w);
        let two_w2_minus_1 = 2.0 * qw * qw - 1.0;
        [
            [two_w2_minus_1 + 2.0 * qx * qx, 2.0 * qw * qz + 2.0 * qx * qy, -2.0 * qw * qy + 2.0 * qx * qz],
            [-2.0 * qw * qz + 2.0 * qx * qy, two_w2_minus_1 + 2.0 * qy * qy, 2.0 * qw * qx + 2.0 * qy * qz],
            [2.0 * qw * qy + 2.0 * qx * qz, -2.0 * qw * qx + 2.0 * qy * qz, two_w2_minus_1 + 2.0 * qz * qz],
        ]
    }

    /// Apply this quaternion's rotation matrix transposed to `v`: `Rᵀv`.
    pub fn rotate_transpose(self, v: Vector3) -> Vector3 {
        let r = self.to_rotation_matrix();
        Vector3::new(
            r[0][0] * v.x + r[1][0] * v.y + r[2][0] * v.z,
            r[0][1] * v.x + r[1][1] * v.y + r[2][1] * v.z,
            r[0][2] * v.x + r[1][2] * v.y + r[2][2] * v.z,
        )
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Quaternion::IDENTITY
    }
}

/// The quaternion-kinematics derivative `½ Ω(ω) q`.
pub(crate) fn q_dot(angular_velocity: Vector3, q: Quaternion) -> Quaternion {
    let (wx, wy, wz) = (angular_velocity.x, angular_velocity.y, angular_velocity.z);
    let (qx, qy, qz, qw) = (q.x, q.y, q.z, q.w);
    Quaternion::new(
        0.5 * (wz * qy - wy * qz + wx * qw),
        0.5 * (-wz * qx + wx * qz + wy * qw),
        0.5 * (wy * qx - wx * qy + wz * qw),
        0.5 * (-(wx * qx + wy * qy + wz * qz)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_times_anything_is_that_thing() {
        let q = Quaternion::new(0.1, 0.2, 0.3, 0.9).normalized();
        let result = Quaternion::IDENTITY.multiply(q);
        assert!((result.x - q.x).abs() < 1e-12);
        assert!((result.y - q.y).abs() < 1e-12);
        assert!((result.z - q.z).abs() < 1e-12);
        assert!((result.w - q.w).abs() < 1e-12);
    }

    #[test]
    fn normalized_always_has_nonnegative_w() {
        let q = Quaternion::new(1.0, 2.0, 3.0, -4.0).normalized();
        assert!(q.w >= 0.0);
        assert!((q.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn identity_rotation_matrix_is_the_identity() {
        let r = Quaternion::IDENTITY.to_rotation_matrix();
        for (i, row) in r.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((v - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn q_dot_of_identity_with_zero_angular_velocity_is_zero() {
        let d = q_dot(Vector3::ZERO, Quaternion::IDENTITY);
        assert_eq!(d, Quaternion::new(0.0, 0.0, 0.0, 0.0));
    }
}
