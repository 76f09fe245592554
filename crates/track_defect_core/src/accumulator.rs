use crate::error::{TrackError, TrackResult};
use crate::kinematics::{ConstraintBuffers, DefectKinematics};
use crate::pose::Pose6;
use crate::traits::DefectProfile;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where a track follower lives in the global system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowerLayout {
    pub name: String,
    /// Index of the curviline coordinate in `q`/`qd`, and Jacobian column.
    pub coordinate: usize,
    /// First of the follower's six constraint rows.
    pub row_offset: usize,
}

impl FollowerLayout {
    pub fn new(name: impl Into<String>, coordinate: usize, row_offset: usize) -> Self {
        Self {
            name: name.into(),
            coordinate,
            row_offset,
        }
    }

    fn row_end(&self) -> usize {
        self.row_offset + 6
    }
}

/// Which followers a profile applies to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FollowerSelection {
    /// Every follower, each at its own arc length.
    #[default]
    All,
    Named(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProfileId(pub usize);

#[derive(Debug)]
struct FollowerSlot {
    layout: FollowerLayout,
    profiles: Vec<usize>,
}

/// Applies registered defect profiles to every follower of a model.
///
/// Followers are visited in layout order and their profiles in registration
/// order, so results are bit-for-bit reproducible.
#[derive(Debug)]
pub struct ConstraintAccumulator {
    followers: Vec<FollowerSlot>,
    profiles: Vec<Box<dyn DefectProfile>>,
    rows_required: usize,
    coordinates_required: usize,
}

impl ConstraintAccumulator {
    pub fn new(layouts: Vec<FollowerLayout>) -> TrackResult<Self> {
        for (i, layout) in layouts.iter().enumerate() {
            if layout.name.trim().is_empty() {
                return Err(TrackError::InvalidConfig(format!(
                    "follower #{i} has an empty name"
                )));
            }
            if layout.row_offset.checked_add(6).is_none() || layout.coordinate.checked_add(1).is_none() {
                return Err(TrackError::InvalidConfig(format!(
                    "follower `{}` has out-of-range coordinate {} or row offset {}",
                    layout.name, layout.coordinate, layout.row_offset
                )));
            }
            for other in &layouts[..i] {
                if other.name == layout.name {
                    return Err(TrackError::DuplicateFollower(layout.name.clone()));
                }
                if other.row_offset < layout.row_end() && layout.row_offset < other.row_end() {
                    return Err(TrackError::OverlappingFollowers {
                        first: other.name.clone(),
                        second: layout.name.clone(),
                    });
                }
            }
        }

        let rows_required = layouts.iter().map(FollowerLayout::row_end).max().unwrap_or(0);
        let coordinates_required = layouts
            .iter()
            .map(|l| l.coordinate + 1)
            .max()
            .unwrap_or(0);

        Ok(Self {
            followers: layouts
                .into_iter()
                .map(|layout| FollowerSlot {
                    layout,
                    profiles: Vec::new(),
                })
                .collect(),
            profiles: Vec::new(),
            rows_required,
            coordinates_required,
        })
    }

    pub fn add_profile(
        &mut self,
        profile: Box<dyn DefectProfile>,
        selection: FollowerSelection,
    ) -> TrackResult<ProfileId> {
        let targets: Vec<usize> = match &selection {
            FollowerSelection::All => (0..self.followers.len()).collect(),
            FollowerSelection::Named(names) => names
                .iter()
                .map(|name| {
                    self.follower_index(name)
                        .ok_or_else(|| TrackError::UnknownFollower(name.clone()))
                })
                .collect::<TrackResult<_>>()?,
        };

        let id = self.profiles.len();
        debug!(
            profile = profile.name(),
            followers = targets.len(),
            "registered defect profile"
        );
        self.profiles.push(profile);
        for target in targets {
            let slot = &mut self.followers[target];
            if !slot.profiles.contains(&id) {
                slot.profiles.push(id);
            }
        }
        Ok(ProfileId(id))
    }

    pub fn follower_index(&self, name: &str) -> Option<usize> {
        self.followers.iter().position(|f| f.layout.name == name)
    }

    pub fn followers(&self) -> impl Iterator<Item = &FollowerLayout> {
        self.followers.iter().map(|f| &f.layout)
    }

    pub fn profile(&self, id: ProfileId) -> Option<&dyn DefectProfile> {
        self.profiles.get(id.0).map(|p| p.as_ref())
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.len()
    }

    /// Profiles applied to a follower, in evaluation order.
    pub fn profiles_of(&self, follower: usize) -> impl Iterator<Item = &dyn DefectProfile> {
        self.followers
            .get(follower)
            .into_iter()
            .flat_map(|slot| slot.profiles.iter())
            .map(move |&id| self.profiles[id].as_ref())
    }

    /// Minimum constraint row count of the caller's buffers.
    pub fn rows_required(&self) -> usize {
        self.rows_required
    }

    /// Minimum length of `q`/`qd`, and Jacobian column count.
    pub fn coordinates_required(&self) -> usize {
        self.coordinates_required
    }

    /// Adds all defect corrections for the current state.
    pub fn accumulate(
        &self,
        q: &[f64],
        qd: &[f64],
        buffers: &mut ConstraintBuffers<'_>,
    ) -> TrackResult<()> {
        self.check_state("q", q)?;
        self.check_state("qd", qd)?;
        self.check_vector("pose buffer", buffers.pose)?;
        self.check_matrix(buffers.jacobian)?;
        self.check_vector("jdqd buffer", buffers.jdqd)?;

        for slot in &self.followers {
            let layout = &slot.layout;
            let s = q[layout.coordinate];
            let sd = qd[layout.coordinate];
            for &id in &slot.profiles {
                DefectKinematics::apply(
                    self.profiles[id].as_ref(),
                    s,
                    sd,
                    buffers,
                    layout.row_offset,
                    layout.coordinate,
                );
            }
        }
        Ok(())
    }

    pub fn accumulate_pose(&self, q: &[f64], pose: &mut DVector<f64>) -> TrackResult<()> {
        self.check_state("q", q)?;
        self.check_vector("pose buffer", pose)?;
        for slot in &self.followers {
            let s = q[slot.layout.coordinate];
            for &id in &slot.profiles {
                DefectKinematics::apply_pose(self.profiles[id].as_ref(), s, pose, slot.layout.row_offset);
            }
        }
        Ok(())
    }

    pub fn accumulate_jacobian(&self, q: &[f64], jacobian: &mut DMatrix<f64>) -> TrackResult<()> {
        self.check_state("q", q)?;
        self.check_matrix(jacobian)?;
        for slot in &self.followers {
            let layout = &slot.layout;
            let s = q[layout.coordinate];
            for &id in &slot.profiles {
                DefectKinematics::apply_jacobian(
                    self.profiles[id].as_ref(),
                    s,
                    jacobian,
                    layout.row_offset,
                    layout.coordinate,
                );
            }
        }
        Ok(())
    }

    pub fn accumulate_jdqd(
        &self,
        q: &[f64],
        qd: &[f64],
        jdqd: &mut DVector<f64>,
    ) -> TrackResult<()> {
        self.check_state("q", q)?;
        self.check_state("qd", qd)?;
        self.check_vector("jdqd buffer", jdqd)?;
        for slot in &self.followers {
            let layout = &slot.layout;
            let (s, sd) = (q[layout.coordinate], qd[layout.coordinate]);
            for &id in &slot.profiles {
                DefectKinematics::apply_jdqd(self.profiles[id].as_ref(), s, sd, jdqd, layout.row_offset);
            }
        }
        Ok(())
    }

    /// Adds every profile of `follower` to a standalone pose evaluated at `s`.
    ///
    /// Out-of-range follower indices are a no-op.
    pub fn superimpose_pose(&self, follower: usize, s: f64, pose: &mut Pose6) {
        for profile in self.profiles_of(follower) {
            *pose += profile.delta_pose(s);
        }
    }

    fn check_state(&self, buffer: &'static str, values: &[f64]) -> TrackResult<()> {
        check_len(buffer, self.coordinates_required, values.len())
    }

    fn check_vector(&self, buffer: &'static str, values: &DVector<f64>) -> TrackResult<()> {
        check_len(buffer, self.rows_required, values.len())
    }

    fn check_matrix(&self, jacobian: &DMatrix<f64>) -> TrackResult<()> {
        check_len("jacobian rows", self.rows_required, jacobian.nrows())?;
        check_len("jacobian columns", self.coordinates_required, jacobian.ncols())
    }
}

fn check_len(buffer: &'static str, expected: usize, actual: usize) -> TrackResult<()> {
    if actual < expected {
        return Err(TrackError::BufferMismatch {
            buffer,
            expected,
            actual,
        });
    }
    Ok(())
}
