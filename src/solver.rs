//! Owns the active pose and the cached joint positions; implements the analytic
//! backward sweep (binary-joint solve + root look-at) and the forward pass.

use nalgebra::{Unit, UnitQuaternion, Vector2, Vector3};

use crate::bone::Bone;
use crate::error::IkError;
use crate::kernel::{normal, rotation_between, y_axis, EPS_CORE};
use crate::pose::Pose;

/// `poses[0]` is the live pose; the rest of the vector is an unused extension point for
/// pose blending (see the crate-level design notes).
#[derive(Debug, Clone)]
pub struct Solver {
    poses: Vec<Pose>,
    joints: Vec<Vector3<f64>>,
    target: Vector3<f64>,
}

impl Default for Solver {
    fn default() -> Self {
        Solver {
            poses: vec![Pose::new()],
            joints: vec![Vector3::zeros()],
            target: Vector3::zeros(),
        }
    }
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    fn pose(&self) -> &Pose {
        &self.poses[0]
    }

    fn pose_mut(&mut self) -> &mut Pose {
        &mut self.poses[0]
    }

    /// Appends a bone to the live pose and a placeholder joint. Joint positions stay
    /// stale until [`Solver::complete_chain`] or [`Solver::iterate_front`] runs.
    pub fn add_bone(&mut self, length: f64, local_rotation: UnitQuaternion<f64>) -> Result<(), IkError> {
        let bone = Bone::new(length, local_rotation)?;
        self.pose_mut().push(bone);
        let placeholder = *self.joints.last().expect("joints is never empty");
        self.joints.push(placeholder);
        Ok(())
    }

    /// Runs one forward pass.
    pub fn complete_chain(&mut self) {
        self.iterate_front();
    }

    /// Translates every joint so `joints[0] == p`; no rotation changes, so chain shape
    /// is preserved.
    pub fn override_root_position(&mut self, p: Vector3<f64>) {
        let delta = p - self.joints[0];
        for j in &mut self.joints {
            *j += delta;
        }
    }

    pub fn set_target_position(&mut self, t: Vector3<f64>) {
        self.target = t;
    }

    /// Returns `false` and makes no change if `i` is out of range.
    pub fn set_constraint(&mut self, i: usize, c: crate::bone::Constraints) -> bool {
        match self.pose_mut().get_mut(i) {
            Some(bone) => {
                bone.set_constraints(c);
                true
            }
            None => false,
        }
    }

    pub fn joints(&self) -> &[Vector3<f64>] {
        &self.joints
    }

    pub fn tip(&self) -> Vector3<f64> {
        *self.joints.last().expect("joints is never empty")
    }

    pub fn root(&self) -> Vector3<f64> {
        self.joints[0]
    }

    pub fn target(&self) -> Vector3<f64> {
        self.target
    }

    pub fn bone_length(&self, i: usize) -> Option<f64> {
        self.pose().get(i).map(|b| b.length().value())
    }

    pub fn bone_count(&self) -> usize {
        self.pose().len()
    }

    pub fn delta_rotations(&self) -> Vec<UnitQuaternion<f64>> {
        let mut out = Vec::with_capacity(self.pose().len());
        let mut prev_global = UnitQuaternion::identity();
        for bone in self.pose().iter() {
            out.push(prev_global.inverse() * bone.global_orientation());
            prev_global = bone.global_orientation();
        }
        out
    }

    /// Rewrites local rotations tip-to-root using the analytic two-bone subproblem at
    /// every interior joint, then aligns the root with [`Solver::look_at`].
    ///
    /// Leaves `joints[1..]` and every bone's `global_orientation` stale; call
    /// [`Solver::iterate_front`] to restore them before reading joint positions.
    pub fn iterate_back(&mut self) {
        let n = self.pose().len();
        if n == 0 {
            return;
        }

        let root = self.joints[0];
        let local_target = self.target - root;
        let mut chain_tip = self.joints[n] - root;
        let mut cumulative_rotation = UnitQuaternion::identity();

        for i in (1..n).rev() {
            let current_joint = cumulative_rotation.transform_vector(&(self.joints[i] - root));
            let tip_arm = chain_tip - current_joint;
            if tip_arm.norm_squared() < EPS_CORE {
                continue;
            }
            chain_tip = self.solve_binary_joint(i, current_joint, tip_arm, local_target, &mut cumulative_rotation);
        }

        self.look_at(chain_tip, local_target, &mut cumulative_rotation);

        let root_global = self.pose()[0].global_orientation();
        self.pose_mut()[0].set_rotation(cumulative_rotation * root_global);
    }

    /// Solves the rigid two-link subproblem rooted at `joints[i]` and writes
    /// `bones[i].rotation`. Returns the updated chain tip (root-relative) and mutates
    /// `cumulative_rotation` in place.
    fn solve_binary_joint(
        &mut self,
        i: usize,
        root: Vector3<f64>,
        tip: Vector3<f64>,
        target: Vector3<f64>,
        cumulative_rotation: &mut UnitQuaternion<f64>,
    ) -> Vector3<f64> {
        let y = root.normalize();
        let z = normal(&y, &target.normalize());
        let x = z.cross(&y).normalize();

        let lroot = root.norm();
        let ltip = tip.norm();

        let mut chord = Vector2::new(target.dot(&x), target.dot(&y));
        chord.x = chord.x.max(0.0);

        let (alpha_root, alpha_joint) = calculate_angles(lroot, ltip, chord);

        let root_rotation =
            UnitQuaternion::from_axis_angle(&Unit::new_unchecked(z), std::f64::consts::FRAC_PI_2 - alpha_root);
        let new_root_dir = root_rotation.transform_vector(&y);
        let (s, c) = (alpha_root - alpha_joint).sin_cos();
        let mut new_tip_dir = x * c + y * s;

        let root_bone = self.pose()[0];
        *cumulative_rotation = root_bone.apply_constraint(root_rotation * *cumulative_rotation);

        let current_tip = root_rotation.transform_vector(&tip.normalize());
        let ideal_rotation = rotation_between(&current_tip, &new_tip_dir);
        let flexibility = self.pose()[i].constraints().flexibility;
        let scaled_angle = ideal_rotation.angle() * flexibility;
        let tip_rotation = match ideal_rotation.axis() {
            Some(axis) => UnitQuaternion::from_axis_angle(&axis, scaled_angle),
            None => UnitQuaternion::identity(),
        };
        new_tip_dir = tip_rotation.transform_vector(&current_tip);

        let parent_global = *cumulative_rotation * self.pose()[i - 1].global_orientation();
        let child_global = tip_rotation * *cumulative_rotation * self.pose()[i].global_orientation();
        let child_local = parent_global.inverse() * child_global;
        let projected = self.pose()[i].apply_constraint(child_local);
        self.pose_mut()[i].set_rotation(projected);

        new_tip_dir * ltip + new_root_dir * lroot
    }

    /// Aligns the remaining root-side arm with the target direction, subject to the
    /// root bone's constraint.
    fn look_at(&mut self, direction: Vector3<f64>, target: Vector3<f64>, cumulative_rotation: &mut UnitQuaternion<f64>) {
        if target.norm_squared() > EPS_CORE {
            let aligned = rotation_between(&direction.normalize(), &target.normalize()) * *cumulative_rotation;
            *cumulative_rotation = self.pose()[0].apply_constraint(aligned);
        }
    }

    /// Recomputes joint positions and global orientations root-to-tip from the stored
    /// local rotations.
    pub fn iterate_front(&mut self) {
        let n = self.pose().len();
        let mut rotation = UnitQuaternion::identity();
        for i in 0..n {
            rotation *= self.pose()[i].rotation();
            let step = rotation.transform_vector(&y_axis()) * self.pose()[i].length().value();
            let next = self.joints[i] + step;
            self.joints[i + 1] = next;
            self.pose_mut()[i].set_global_orientation(rotation);
        }
    }
}

/// Closed-form planar two-bone IK: the angle the root arm must turn through
/// (`alpha_root`) and the interior joint angle (`alpha_joint`), both measured against
/// the chord from the joint to the (plane-projected) target.
fn calculate_angles(lroot: f64, ltip: f64, chord: Vector2<f64>) -> (f64, f64) {
    let clen = chord.norm().clamp((lroot - ltip).abs(), lroot + ltip);

    let alpha_chord = if chord.x > EPS_CORE {
        chord.y.atan2(chord.x)
    } else {
        chord.y.signum() * std::f64::consts::FRAC_PI_2
    };

    let alpha_root = if clen * clen > EPS_CORE {
        let cos_arg = ((lroot * lroot - ltip * ltip + clen * clen) / (2.0 * lroot * clen)).clamp(-1.0, 1.0);
        alpha_chord + cos_arg.acos()
    } else {
        0.0
    };

    let cos_joint = ((lroot * lroot + ltip * ltip - clen * clen) / (2.0 * lroot * ltip)).clamp(-1.0, 1.0);
    let alpha_joint = std::f64::consts::PI - cos_joint.acos();

    (alpha_root, alpha_joint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn straight_chain(lengths: &[f64]) -> Solver {
        let mut solver = Solver::new();
        for &l in lengths {
            solver.add_bone(l, UnitQuaternion::identity()).unwrap();
        }
        solver.complete_chain();
        solver
    }

    #[test]
    fn joint_count_matches_bone_count_plus_one() {
        let solver = straight_chain(&[1.0, 1.0, 1.0]);
        assert_eq!(solver.joints().len(), solver.bone_count() + 1);
    }

    #[test]
    fn complete_chain_places_joints_along_y() {
        let solver = straight_chain(&[1.0, 2.0]);
        assert_abs_diff_eq!(solver.joints()[0], Vector3::zeros());
        assert_abs_diff_eq!(solver.joints()[1], Vector3::new(0.0, 1.0, 0.0));
        assert_abs_diff_eq!(solver.joints()[2], Vector3::new(0.0, 3.0, 0.0));
    }

    #[test]
    fn override_root_position_shifts_every_joint_and_keeps_shape() {
        let mut solver = straight_chain(&[1.0, 1.0]);
        let before: Vec<_> = solver.joints().to_vec();
        solver.override_root_position(Vector3::new(5.0, 5.0, 5.0));
        let after = solver.joints();
        for (b, a) in before.iter().zip(after.iter()) {
            assert_abs_diff_eq!(*a - *b, Vector3::new(5.0, 5.0, 5.0), epsilon = 1e-10);
        }
    }

    #[test]
    fn set_constraint_rejects_out_of_range_index() {
        let mut solver = straight_chain(&[1.0]);
        assert!(!solver.set_constraint(5, crate::bone::Constraints::default()));
    }

    #[test]
    fn two_colinear_bones_reach_in_plane_target() {
        let mut solver = straight_chain(&[1.0, 1.0]);
        solver.set_target_position(Vector3::new(0.0, 1.0, 1.0));
        solver.iterate_back();
        solver.iterate_front();
        assert_abs_diff_eq!(solver.tip(), Vector3::new(0.0, 1.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn unreachable_target_clamps_to_workspace_boundary() {
        let mut solver = straight_chain(&[1.0, 1.0]);
        solver.set_target_position(Vector3::new(0.0, 0.0, 10.0));
        solver.iterate_back();
        solver.iterate_front();
        assert_abs_diff_eq!(solver.tip(), Vector3::new(0.0, 0.0, 2.0), epsilon = 1e-6);
    }

    #[test]
    fn single_bone_look_at_reaches_any_direction() {
        let mut solver = straight_chain(&[1.0]);
        solver.set_target_position(Vector3::new(0.0, 0.0, -1.0));
        solver.iterate_back();
        solver.iterate_front();
        assert_abs_diff_eq!(solver.tip(), Vector3::new(0.0, 0.0, -1.0), epsilon = 1e-6);
    }

    #[test]
    fn idempotent_alignment_when_target_equals_tip() {
        let mut solver = straight_chain(&[1.0, 1.0, 1.0]);
        let tip = solver.tip();
        solver.set_target_position(tip);
        let before: Vec<_> = solver.joints().to_vec();
        solver.iterate_back();
        solver.iterate_front();
        for (b, a) in before.iter().zip(solver.joints().iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
        }
    }
}
