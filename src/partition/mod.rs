//! Host/accelerator work partitioning.
//!
//! A [`Partitioner`] splits an index-addressable task domain between host
//! workers and the accelerator. Under [`Strategy::Static`] the split is a
//! fixed cut point; under [`Strategy::Dynamic`] every participant claims
//! indices from a shared [`Worklist`] cursor, so ownership is decided at run
//! time and each index is still handed out exactly once.

pub mod partitioner;
pub mod worklist;

pub use partitioner::{Lane, Partitioner};
pub use worklist::Worklist;

/// Index of one independent unit of work, in `[0, n_tasks)`.
pub type TaskIndex = usize;

/// How the task domain is divided between host and accelerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Static,
    Dynamic,
}

impl Strategy {
    /// `alpha` in `[0, 1]` selects a static split; anything else (NaN
    /// included) falls back to dynamic claiming.
    pub fn from_alpha(alpha: f64) -> Self {
        if (0.0..=1.0).contains(&alpha) {
            Strategy::Static
        } else {
            Strategy::Dynamic
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_from_alpha() {
        assert_eq!(Strategy::from_alpha(0.0), Strategy::Static);
        assert_eq!(Strategy::from_alpha(0.5), Strategy::Static);
        assert_eq!(Strategy::from_alpha(1.0), Strategy::Static);
        assert_eq!(Strategy::from_alpha(-0.01), Strategy::Dynamic);
        assert_eq!(Strategy::from_alpha(1.01), Strategy::Dynamic);
        assert_eq!(Strategy::from_alpha(f64::NAN), Strategy::Dynamic);
        assert_eq!(Strategy::from_alpha(f64::INFINITY), Strategy::Dynamic);
    }
}
