//! Model description and assembly.
//!
//! The description is read once at model-assembly time; everything it
//! names is resolved into an immutable [`TrackModel`] before the first
//! solver evaluation.

use crate::accumulator::{ConstraintAccumulator, FollowerLayout, FollowerSelection};
use crate::audit::{audit_defect, AuditSettings};
use crate::error::TrackResult;
use crate::link_force::{LinkForceTable, LinkModelConfig};
use crate::profile::{DefectKind, DefectWindow, TrackDefect};
use crate::waveform::Waveform;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// One defect of the model description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefectConfig {
    pub name: String,
    pub window: DefectWindow,
    pub kind: DefectKind,
    pub waveform: Waveform,
    /// Followers the defect applies to; all of them when absent.
    #[serde(default)]
    pub followers: Option<Vec<String>>,
}

impl DefectConfig {
    pub fn build(&self) -> TrackResult<TrackDefect> {
        TrackDefect::new(self.name.clone(), self.window, self.kind, self.waveform)
    }

    fn selection(&self) -> FollowerSelection {
        match &self.followers {
            Some(names) => FollowerSelection::Named(names.clone()),
            None => FollowerSelection::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackModelConfig {
    pub followers: Vec<FollowerLayout>,
    #[serde(default)]
    pub defects: Vec<DefectConfig>,
    #[serde(default)]
    pub links: LinkModelConfig,
    #[serde(default)]
    pub audit: AuditSettings,
}

/// Assembled, immutable model.
#[derive(Debug)]
pub struct TrackModel {
    pub constraints: ConstraintAccumulator,
    pub links: LinkForceTable,
}

impl TrackModel {
    pub fn assemble(config: &TrackModelConfig) -> TrackResult<Self> {
        let mut constraints = ConstraintAccumulator::new(config.followers.clone())?;

        for defect_config in &config.defects {
            let defect = defect_config.build()?;
            if config.audit.enabled {
                audit_defect(&defect, &config.audit)?;
            }
            constraints.add_profile(Box::new(defect), defect_config.selection())?;
        }

        for (index, follower) in constraints.followers().enumerate() {
            if constraints.profiles_of(index).next().is_none() {
                warn!(follower = %follower.name, "follower has no track defect");
            }
        }

        let links = LinkForceTable::from_config(&config.links)?;

        info!(
            followers = config.followers.len(),
            defects = constraints.profile_count(),
            link_groups = links.groups().len(),
            rows = constraints.rows_required(),
            "assembled track model"
        );
        Ok(Self { constraints, links })
    }

    pub fn from_json_str(text: &str) -> TrackResult<Self> {
        let config: TrackModelConfig = serde_json::from_str(text)?;
        Self::assemble(&config)
    }
}

/// Reads and assembles a model description file.
pub fn load_model(path: impl AsRef<Path>) -> Result<TrackModel> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read model description {}", path.display()))?;
    TrackModel::from_json_str(&text)
        .with_context(|| format!("Failed to assemble model from {}", path.display()))
}
