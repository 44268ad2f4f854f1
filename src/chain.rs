//! Top-level object a host owns: wraps one [`Solver`], accepts bone additions, and
//! drives convergence.

use nalgebra::{UnitQuaternion, Vector3};

use crate::bone::Constraints;
use crate::error::IkError;
use crate::kernel::EPS_USER;
use crate::solver::Solver;

/// A single-branch chain of rigid bones driven toward a target by repeated
/// back/front sweeps.
#[derive(Debug, Clone)]
pub struct IkChain {
    solver: Solver,
}

impl Default for IkChain {
    fn default() -> Self {
        IkChain { solver: Solver::new() }
    }
}

impl IkChain {
    /// Empty chain, root = `(0,0,0)`, target = `(0,0,0)`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns to the post-[`IkChain::new`] state. No bone or pose state survives.
    pub fn reset(&mut self) {
        self.solver = Solver::new();
    }

    pub fn set_root_position(&mut self, v: Vector3<f64>) {
        self.solver.override_root_position(v);
    }

    /// Appends a bone. `length` must be positive; joints are stale until
    /// [`IkChain::complete_chain`] or [`IkChain::update_chain_position`] runs.
    pub fn add_bone(&mut self, length: f64, local_rotation: UnitQuaternion<f64>) -> Result<(), IkError> {
        self.solver.add_bone(length, local_rotation)
    }

    /// Forces a forward pass; joints and global orientations are current afterward.
    pub fn complete_chain(&mut self) {
        self.solver.complete_chain();
    }

    pub fn set_target_position(&mut self, v: Vector3<f64>) {
        self.solver.set_target_position(v);
    }

    /// Returns `false` and makes no change if `i` is out of range.
    pub fn set_constraint(&mut self, i: usize, c: Constraints) -> bool {
        self.solver.set_constraint(i, c)
    }

    /// Runs up to `n` paired back/front sweeps. Returns the number of sweeps actually
    /// used: `0` if the tip already lies within `ε_user` of the target, `n` if
    /// convergence was not reached within budget.
    pub fn update_chain_position(&mut self, n: usize) -> usize {
        for used in 0..n {
            if (self.solver.tip() - self.solver.target()).norm_squared() < EPS_USER {
                return used;
            }
            self.solver.iterate_back();
            self.solver.iterate_front();
        }
        n
    }

    /// Each bone's rotation expressed in its parent's global frame.
    pub fn delta_rotations(&self) -> Vec<UnitQuaternion<f64>> {
        self.solver.delta_rotations()
    }

    pub fn root_position(&self) -> Vector3<f64> {
        self.solver.root()
    }

    pub fn target_position(&self) -> Vector3<f64> {
        self.solver.target()
    }

    pub fn bone_length(&self, i: usize) -> Option<f64> {
        self.solver.bone_length(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chain_is_empty_at_origin() {
        let chain = IkChain::new();
        assert_eq!(chain.root_position(), Vector3::zeros());
        assert_eq!(chain.target_position(), Vector3::zeros());
        assert_eq!(chain.bone_length(0), None);
    }

    #[test]
    fn reset_returns_to_post_new_state() {
        let mut chain = IkChain::new();
        chain.add_bone(1.0, UnitQuaternion::identity()).unwrap();
        chain.complete_chain();
        chain.set_root_position(Vector3::new(1.0, 2.0, 3.0));
        chain.reset();
        assert_eq!(chain.root_position(), Vector3::zeros());
        assert_eq!(chain.bone_length(0), None);
    }

    #[test]
    fn add_bone_rejects_non_positive_length() {
        let mut chain = IkChain::new();
        assert!(chain.add_bone(0.0, UnitQuaternion::identity()).is_err());
        assert!(chain.add_bone(-1.0, UnitQuaternion::identity()).is_err());
    }

    #[test]
    fn update_chain_position_reports_zero_when_already_converged() {
        let mut chain = IkChain::new();
        chain.add_bone(1.0, UnitQuaternion::identity()).unwrap();
        chain.complete_chain();
        let tip = chain.solver.tip();
        chain.set_target_position(tip);
        assert_eq!(chain.update_chain_position(5), 0);
    }

    #[test]
    fn update_chain_position_converges_within_budget() {
        let mut chain = IkChain::new();
        chain.add_bone(1.0, UnitQuaternion::identity()).unwrap();
        chain.add_bone(1.0, UnitQuaternion::identity()).unwrap();
        chain.complete_chain();
        chain.set_target_position(Vector3::new(0.0, 1.0, 1.0));
        let used = chain.update_chain_position(10);
        assert!(used < 10);
        assert!((chain.solver.tip() - chain.target_position()).norm() < 1e-5);
    }
}
