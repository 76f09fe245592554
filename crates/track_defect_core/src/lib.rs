//! The `track_defect_core` crate superimposes track geometry defects onto the
//! follower constraints of a multibody railway vehicle model.
//!
//! Key components:
//! - **Profiles**: `DefectProfile` (window, affected rows, pose tiers) and the
//!   configurable `TrackDefect` (longitudinal level, alignment, crosslevel).
//! - **Kinematics**: `DefectKinematics` writes signed pose, Jacobian and Jdqd
//!   corrections into caller-owned buffers.
//! - **Accumulator**: `ConstraintAccumulator` sums every active profile onto every follower.
//! - **Link forces**: `LinkForceTable` resolves linear spring/damper laws by link identity.
//! - **Audit**: dual-number cross-check of the analytic derivative tiers.
pub mod accumulator;
pub mod audit;
pub mod autodiff;
pub mod config;
pub mod error;
pub mod kinematics;
pub mod link_force;
pub mod pose;
pub mod profile;
pub mod traits;
pub mod waveform;

pub use accumulator::{ConstraintAccumulator, FollowerLayout, FollowerSelection, ProfileId};
pub use config::{load_model, DefectConfig, TrackModel, TrackModelConfig};
pub use error::{TrackError, TrackResult};
pub use kinematics::{ConstraintBuffers, DefectCorrection, DefectKinematics};
pub use link_force::{LinkForceTable, LinkGroup, LinkModelConfig};
pub use pose::{Pose6, PoseRow, RowMask};
pub use profile::{DefectKind, DefectWindow, TrackDefect};
pub use traits::DefectProfile;
pub use waveform::Waveform;
