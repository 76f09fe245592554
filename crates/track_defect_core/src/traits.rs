use crate::pose::{Pose6, PoseTiers, RowMask};
use crate::profile::DefectWindow;
use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in defect shape functions.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// A track geometry perturbation along the curviline coordinate `s`.
///
/// Implementors provide the pose increment and its first two derivatives
/// with respect to `s`, in closed form, for `s` inside [`Self::window`].
/// The provided methods enforce the window: outside it every tier is
/// exactly zero and the in-window evaluators are never called.
pub trait DefectProfile: Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Closed interval outside of which the profile contributes nothing.
    fn window(&self) -> DefectWindow;

    /// Rows receiving Jacobian and Jdqd corrections.
    fn affected_rows(&self) -> RowMask;

    fn pose_in_window(&self, s: f64) -> Pose6;

    fn pose_ds_in_window(&self, s: f64) -> Pose6;

    /// Second derivative of the pose with respect to `s`.
    fn pose_dss_in_window(&self, s: f64) -> Pose6;

    fn delta_pose(&self, s: f64) -> Pose6 {
        if !self.window().contains(s) {
            return Pose6::zeros();
        }
        self.pose_in_window(s)
    }

    fn delta_pose_ds(&self, s: f64) -> Pose6 {
        if !self.window().contains(s) {
            return Pose6::zeros();
        }
        self.pose_ds_in_window(s)
    }

    /// Quadratic-velocity contraction `d²pose/ds² · sd²`.
    ///
    /// `s` is the only coordinate the pose depends on, so `dJ/dq · qd`
    /// collapses to the second derivative scaled by `sd` twice.
    fn delta_pose_velocity_term(&self, s: f64, sd: f64) -> Pose6 {
        if !self.window().contains(s) {
            return Pose6::zeros();
        }
        self.pose_dss_in_window(s) * (sd * sd)
    }

    /// All three tiers at once, `None` outside the window.
    fn tiers(&self, s: f64, sd: f64) -> Option<PoseTiers> {
        if !self.window().contains(s) {
            return None;
        }
        Some(PoseTiers {
            pose: self.pose_in_window(s),
            pose_ds: self.pose_ds_in_window(s),
            velocity_term: self.pose_dss_in_window(s) * (sd * sd),
        })
    }
}
