//! Linear spring/damper laws for the elastic links of a vehicle model.
//!
//! Links are grouped (primary longitudinal stiffness, secondary vertical
//! stiffness, ...) and each group shares one set of parameters. The table
//! is resolved once from configuration and then looked up by the integer
//! identity the engine passes to its link force hook.

use crate::error::{TrackError, TrackResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Standard gravity used for supported-mass biases, m/s².
pub const GRAVITY: f64 = 9.81;

/// Largest link identity the dense lookup table accepts.
pub const MAX_LINK_IDENTITY: usize = 1 << 16;

/// Force law parameters of one link group, SI units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkGroup {
    pub name: String,
    /// N/m
    pub stiffness: f64,
    /// N·s/m
    pub damping: f64,
    /// m
    pub natural_length: f64,
    /// Constant force added to the law, N.
    #[serde(default)]
    pub bias: f64,
}

impl LinkGroup {
    /// `F = K (z − z0) + C ż + bias`
    pub fn force(&self, z: f64, zd: f64) -> f64 {
        self.stiffness * (z - self.natural_length) + self.damping * zd + self.bias
    }
}

/// Units of [`ElementParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterUnits {
    Si,
    /// kN/m, kN·s/m and mm, as entered in the engine's user model.
    #[default]
    UserModel,
}

/// One spring/damper element as entered in the user model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementParams {
    pub k: f64,
    pub c: f64,
    pub l: f64,
}

impl ElementParams {
    /// `(K [N/m], C [N·s/m], Z0 [m])`
    pub fn to_si(&self, units: ParameterUnits) -> (f64, f64, f64) {
        match units {
            ParameterUnits::Si => (self.k, self.c, self.l),
            ParameterUnits::UserModel => (self.k * 1000.0, self.c * 1000.0, self.l / 1000.0),
        }
    }
}

/// A group as described in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkGroupConfig {
    pub name: String,
    /// Elements acting in parallel: stiffness and damping are summed, the
    /// natural length is taken from the first element.
    pub elements: Vec<String>,
    /// Link names belonging to the group.
    pub links: Vec<String>,
    #[serde(default)]
    pub bias: f64,
    /// Mass carried by the group's links; adds `−m g` to the bias.
    #[serde(default)]
    pub supported_mass: Option<f64>,
}

/// Link section of the model description.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinkModelConfig {
    #[serde(default)]
    pub units: ParameterUnits,
    /// Symbolic link name to the engine's integer identity.
    #[serde(default)]
    pub link_ids: BTreeMap<String, usize>,
    #[serde(default)]
    pub elements: BTreeMap<String, ElementParams>,
    #[serde(default)]
    pub groups: Vec<LinkGroupConfig>,
}

/// Identity-indexed group table.
#[derive(Debug, Clone, Default)]
pub struct LinkForceTable {
    groups: Vec<LinkGroup>,
    by_identity: Vec<Option<usize>>,
}

impl LinkForceTable {
    /// Builds the table from explicit groups and identity lists.
    pub fn new(entries: Vec<(LinkGroup, Vec<usize>)>) -> TrackResult<Self> {
        let mut table = Self::default();
        for (group, identities) in entries {
            check_finite(&group)?;
            let index = table.groups.len();
            for identity in identities {
                if identity > MAX_LINK_IDENTITY {
                    return Err(TrackError::InvalidConfig(format!(
                        "link group `{}`: identity {identity} exceeds the maximum of {MAX_LINK_IDENTITY}",
                        group.name
                    )));
                }
                if table.by_identity.len() <= identity {
                    table.by_identity.resize(identity + 1, None);
                }
                if let Some(previous) = table.by_identity[identity] {
                    return Err(TrackError::DuplicateLinkAssignment {
                        link: format!("#{identity}"),
                        first: table.groups[previous].name.clone(),
                        second: group.name.clone(),
                    });
                }
                table.by_identity[identity] = Some(index);
            }
            table.groups.push(group);
        }
        Ok(table)
    }

    pub fn from_config(config: &LinkModelConfig) -> TrackResult<Self> {
        let mut owner: BTreeMap<&str, &str> = BTreeMap::new();
        let mut entries = Vec::with_capacity(config.groups.len());

        for group in &config.groups {
            let first = group.elements.first().ok_or_else(|| {
                TrackError::InvalidConfig(format!("link group `{}` has no elements", group.name))
            })?;

            let mut stiffness = 0.0;
            let mut damping = 0.0;
            for name in &group.elements {
                let params = config
                    .elements
                    .get(name)
                    .ok_or_else(|| TrackError::UnknownElement(name.clone()))?;
                let (k, c, _) = params.to_si(config.units);
                stiffness += k;
                damping += c;
            }
            let (_, _, natural_length) = config.elements[first].to_si(config.units);
            let bias = group.bias - group.supported_mass.unwrap_or(0.0) * GRAVITY;

            let mut identities = Vec::with_capacity(group.links.len());
            for link in &group.links {
                let identity = *config
                    .link_ids
                    .get(link)
                    .ok_or_else(|| TrackError::UnknownLink(link.clone()))?;
                if let Some(previous) = owner.insert(link, &group.name) {
                    return Err(TrackError::DuplicateLinkAssignment {
                        link: link.clone(),
                        first: previous.to_string(),
                        second: group.name.clone(),
                    });
                }
                identities.push(identity);
            }

            debug!(
                group = %group.name,
                stiffness,
                damping,
                natural_length,
                bias,
                links = identities.len(),
                "resolved link group"
            );
            entries.push((
                LinkGroup {
                    name: group.name.clone(),
                    stiffness,
                    damping,
                    natural_length,
                    bias,
                },
                identities,
            ));
        }

        let unassigned = config
            .link_ids
            .keys()
            .filter(|name| !owner.contains_key(name.as_str()))
            .count();
        if unassigned > 0 {
            warn!(unassigned, "links without a group produce zero force");
        }

        Self::new(entries)
    }

    pub fn group_of(&self, identity: usize) -> Option<&LinkGroup> {
        self.by_identity
            .get(identity)
            .copied()
            .flatten()
            .map(|index| &self.groups[index])
    }

    /// Force of link `identity`; links outside every group yield `0.0`.
    pub fn force(&self, identity: usize, z: f64, zd: f64) -> f64 {
        self.group_of(identity)
            .map_or(0.0, |group| group.force(z, zd))
    }

    pub fn groups(&self) -> &[LinkGroup] {
        &self.groups
    }
}

fn check_finite(group: &LinkGroup) -> TrackResult<()> {
    let values = [
        group.stiffness,
        group.damping,
        group.natural_length,
        group.bias,
    ];
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(TrackError::InvalidConfig(format!(
            "link group `{}` has non-finite parameters",
            group.name
        )))
    }
}
