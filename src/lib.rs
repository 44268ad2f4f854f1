//! Analytic inverse-kinematics solver for a single-branch chain of rigid bones.
//!
//! The entry point is [`chain::IkChain`]. It owns a [`solver::Solver`], which in turn
//! owns the live [`pose::Pose`] (an ordered sequence of [`bone::Bone`]s) and the cached
//! world-space joint positions. [`kernel`] holds the pure vector/quaternion math the
//! solver is built on.

pub mod bone;
pub mod chain;
pub mod error;
pub mod kernel;
pub mod pose;
pub mod solver;

pub use bone::{Bone, Constraints};
pub use chain::IkChain;
pub use error::IkError;
pub use kernel::{EPS_CORE, EPS_USER};
pub use pose::Pose;
pub use solver::Solver;
