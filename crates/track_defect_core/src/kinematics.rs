//! Superimposes defect corrections onto a follower's constraint equations.
//!
//! A follower constrains six track joints to the track pose `f(s)`, so its
//! residual is `h = q_track − f(s)`. The defect adds `δf(s)` to the pose and
//! therefore contributes
//!
//! - `+δf(s)` to the pose,
//! - `−δf'(s)` to the Jacobian column of `s`,
//! - `−δf''(s) · sd²` to the Jdqd term.
//!
//! Jacobian and Jdqd corrections carry the same sign flip; both are
//! derivatives of the same residual.

use crate::pose::{Pose6, RowMask};
use crate::traits::DefectProfile;
use nalgebra::{DMatrix, DVector};

/// Caller-owned buffers of one constraint evaluation.
#[derive(Debug)]
pub struct ConstraintBuffers<'a> {
    pub pose: &'a mut DVector<f64>,
    pub jacobian: &'a mut DMatrix<f64>,
    pub jdqd: &'a mut DVector<f64>,
}

impl<'a> ConstraintBuffers<'a> {
    pub fn new(
        pose: &'a mut DVector<f64>,
        jacobian: &'a mut DMatrix<f64>,
        jdqd: &'a mut DVector<f64>,
    ) -> Self {
        Self {
            pose,
            jacobian,
            jdqd,
        }
    }
}

/// Signed corrections of one profile at one `(s, sd)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefectCorrection {
    pub pose: Pose6,
    /// Restricted to the affected rows.
    pub jacobian_column: Pose6,
    /// Restricted to the affected rows.
    pub jdqd: Pose6,
}

impl DefectCorrection {
    pub fn zero() -> Self {
        Self {
            pose: Pose6::zeros(),
            jacobian_column: Pose6::zeros(),
            jdqd: Pose6::zeros(),
        }
    }
}

/// Stateless driver turning profile tiers into constraint corrections.
pub struct DefectKinematics;

impl DefectKinematics {
    pub fn evaluate(profile: &dyn DefectProfile, s: f64, sd: f64) -> DefectCorrection {
        let Some(tiers) = profile.tiers(s, sd) else {
            return DefectCorrection::zero();
        };
        let rows = profile.affected_rows();
        DefectCorrection {
            pose: tiers.pose,
            jacobian_column: -masked(&tiers.pose_ds, rows),
            jdqd: -masked(&tiers.velocity_term, rows),
        }
    }

    /// Adds pose, Jacobian and Jdqd corrections in place.
    ///
    /// Rows `[row_offset, row_offset + 6)` of every buffer and column
    /// `column` of the Jacobian must exist.
    ///
    /// # Panics
    ///
    /// Panics if a buffer is too small for the addressed rows or column.
    /// [`ConstraintAccumulator`](crate::accumulator::ConstraintAccumulator)
    /// checks sizes first and returns an error instead.
    pub fn apply(
        profile: &dyn DefectProfile,
        s: f64,
        sd: f64,
        buffers: &mut ConstraintBuffers<'_>,
        row_offset: usize,
        column: usize,
    ) {
        let Some(tiers) = profile.tiers(s, sd) else {
            return;
        };
        let rows = profile.affected_rows();
        add_pose(buffers.pose, &tiers.pose, row_offset);
        for row in rows.rows() {
            let i = row.index();
            buffers.jacobian[(row_offset + i, column)] -= tiers.pose_ds[i];
            buffers.jdqd[row_offset + i] -= tiers.velocity_term[i];
        }
    }

    /// Position stage only.
    ///
    /// # Panics
    ///
    /// Panics if the buffer does not cover the addressed rows, like [`Self::apply`].
    pub fn apply_pose(profile: &dyn DefectProfile, s: f64, pose: &mut DVector<f64>, row_offset: usize) {
        if !profile.window().contains(s) {
            return;
        }
        add_pose(pose, &profile.pose_in_window(s), row_offset);
    }

    /// Jacobian stage only.
    ///
    /// # Panics
    ///
    /// Panics if the buffer does not cover the addressed rows, like [`Self::apply`].
    pub fn apply_jacobian(
        profile: &dyn DefectProfile,
        s: f64,
        jacobian: &mut DMatrix<f64>,
        row_offset: usize,
        column: usize,
    ) {
        if !profile.window().contains(s) {
            return;
        }
        let pose_ds = profile.pose_ds_in_window(s);
        for row in profile.affected_rows().rows() {
            jacobian[(row_offset + row.index(), column)] -= pose_ds[row.index()];
        }
    }

    /// Acceleration stage only.
    ///
    /// # Panics
    ///
    /// Panics if the buffer does not cover the addressed rows, like [`Self::apply`].
    pub fn apply_jdqd(
        profile: &dyn DefectProfile,
        s: f64,
        sd: f64,
        jdqd: &mut DVector<f64>,
        row_offset: usize,
    ) {
        if !profile.window().contains(s) {
            return;
        }
        let term = profile.pose_dss_in_window(s) * (sd * sd);
        for row in profile.affected_rows().rows() {
            jdqd[row_offset + row.index()] -= term[row.index()];
        }
    }
}

fn add_pose(pose: &mut DVector<f64>, delta: &Pose6, row_offset: usize) {
    for (i, value) in delta.iter().enumerate() {
        pose[row_offset + i] += value;
    }
}

fn masked(values: &Pose6, rows: RowMask) -> Pose6 {
    let mut out = Pose6::zeros();
    for row in rows.rows() {
        out[row.index()] = values[row.index()];
    }
    out
}
