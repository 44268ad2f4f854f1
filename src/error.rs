use thiserror::Error;

/// Contract violations the core recognizes.
///
/// Geometric degeneracies, unreachable targets, and non-convergence are not errors: the
/// kernel absorbs the first silently (see [`crate::kernel`]) and the solver reports the
/// other two through plain return values (`IkChain::update_chain_position`'s residual
/// iteration count).
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum IkError {
    /// A bone was constructed (or appended to a chain) with `length <= 0`.
    #[error("bone length must be positive, got {length}")]
    NonPositiveLength { length: f64 },
}
