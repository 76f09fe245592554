use nalgebra::Vector6;
use serde::{Deserialize, Serialize};

/// Six-coordinate track pose increment `[x, y, z, yaw, pitch, roll]`.
pub type Pose6 = Vector6<f64>;

/// Named rows of a [`Pose6`] and of a follower's six constraint equations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseRow {
    X,
    Y,
    Z,
    Yaw,
    Pitch,
    Roll,
}

impl PoseRow {
    pub const ALL: [PoseRow; 6] = [
        PoseRow::X,
        PoseRow::Y,
        PoseRow::Z,
        PoseRow::Yaw,
        PoseRow::Pitch,
        PoseRow::Roll,
    ];

    pub fn index(self) -> usize {
        match self {
            PoseRow::X => 0,
            PoseRow::Y => 1,
            PoseRow::Z => 2,
            PoseRow::Yaw => 3,
            PoseRow::Pitch => 4,
            PoseRow::Roll => 5,
        }
    }
}

/// Set of pose rows a profile writes Jacobian and Jdqd corrections to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowMask(u8);

impl RowMask {
    pub const EMPTY: RowMask = RowMask(0);

    pub fn of(rows: &[PoseRow]) -> Self {
        rows.iter().fold(Self::EMPTY, |mask, &row| mask.with(row))
    }

    pub fn with(self, row: PoseRow) -> Self {
        RowMask(self.0 | (1 << row.index()))
    }

    pub fn contains(self, row: PoseRow) -> bool {
        self.0 & (1 << row.index()) != 0
    }

    /// Affected rows in ascending order.
    pub fn rows(self) -> impl Iterator<Item = PoseRow> {
        PoseRow::ALL.into_iter().filter(move |row| self.contains(*row))
    }
}

/// The three derivative tiers of a profile at one `(s, sd)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseTiers {
    /// Pose increment.
    pub pose: Pose6,
    /// First derivative of `pose` with respect to `s`.
    pub pose_ds: Pose6,
    /// `d²pose/ds² · sd²`.
    pub velocity_term: Pose6,
}
