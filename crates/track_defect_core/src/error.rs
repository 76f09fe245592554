//! Error types for model assembly and constraint accumulation.
//!
//! Evaluation of an assembled profile never fails; everything that can go
//! wrong is detected either when the model is assembled or, for buffer
//! sizes, before an accumulation pass touches any buffer.

use thiserror::Error;

/// Unified error type for the crate.
#[derive(Debug, Error)]
pub enum TrackError {
    /// A defect window is empty, reversed or not finite.
    #[error("invalid defect window [{start}, {end}]: expected finite bounds with start < end")]
    InvalidWindow { start: f64, end: f64 },

    /// A waveform parameter is out of its valid range.
    #[error("invalid waveform: {0}")]
    InvalidWaveform(String),

    /// The defect would push an `asin` argument to or beyond unit magnitude.
    #[error("defect `{name}` leaves the asin domain: peak argument {peak:.6e} must stay below 1")]
    DomainViolation { name: String, peak: f64 },

    /// Generic configuration problem.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A defect names a follower that is not part of the layout.
    #[error("unknown follower `{0}`")]
    UnknownFollower(String),

    /// Two followers share a name.
    #[error("duplicate follower `{0}`")]
    DuplicateFollower(String),

    /// The six-row constraint blocks of two followers intersect.
    #[error("followers `{first}` and `{second}` have overlapping constraint rows")]
    OverlappingFollowers { first: String, second: String },

    /// A link group references a link name missing from the identity table.
    #[error("unknown link `{0}`")]
    UnknownLink(String),

    /// A link group references an element parameter set that does not exist.
    #[error("unknown link element `{0}`")]
    UnknownElement(String),

    /// A link identity was claimed by more than one group.
    #[error("link `{link}` is assigned to both `{first}` and `{second}`")]
    DuplicateLinkAssignment {
        link: String,
        first: String,
        second: String,
    },

    /// A caller buffer is smaller than the configured layout requires.
    #[error("{buffer} too small: need at least {expected}, got {actual}")]
    BufferMismatch {
        buffer: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Analytic derivative tiers disagree with automatic differentiation.
    #[error(
        "defect `{name}` failed derivative audit at s = {s}: {tier} of row {row} is {analytic:.6e}, expected {reference:.6e}"
    )]
    DerivativeMismatch {
        name: String,
        s: f64,
        tier: &'static str,
        row: usize,
        analytic: f64,
        reference: f64,
    },

    /// Model description could not be parsed.
    #[error("failed to parse model description: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for `Result<T, TrackError>`.
pub type TrackResult<T> = Result<T, TrackError>;
