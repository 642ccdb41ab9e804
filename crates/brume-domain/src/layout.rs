//! Zone/instance/mesh-level layout of a run.
//!
//! [`DomainLayout::validate`] runs once at startup to reject impossible
//! layouts before any solver state is allocated.

use std::error::Error;
use std::fmt;

use brume_core::id::{DomainKey, InstanceId, ZoneId};

/// Shape of one zone: how many time instances it carries, how deep its
/// multigrid stack is, and whether its grid moves during the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZoneDesc {
    /// Time instances in this zone. Ordinary runs have one; periodic
    /// (harmonic-balance) runs have several.
    pub instances: u16,
    /// Multigrid levels, finest first. Always at least one.
    pub mesh_levels: u16,
    /// Whether mesh coordinates change during the run, which makes them
    /// part of the rotated time history.
    pub moving_grid: bool,
}

impl ZoneDesc {
    /// A single-instance, single-level, fixed-grid zone.
    pub fn single() -> Self {
        Self {
            instances: 1,
            mesh_levels: 1,
            moving_grid: false,
        }
    }
}

/// Layout of every zone in the run.
#[derive(Clone, Debug, Default)]
pub struct DomainLayout {
    zones: Vec<ZoneDesc>,
}

impl DomainLayout {
    /// Build a layout from zone descriptors, in zone-ID order.
    pub fn new(zones: Vec<ZoneDesc>) -> Self {
        Self { zones }
    }

    /// Number of zones.
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// Whether more than one zone participates, which switches the
    /// steady output rule from per-iteration to per-outer-step.
    pub fn multizone(&self) -> bool {
        self.zones.len() > 1
    }

    /// Descriptor of one zone.
    pub fn zone(&self, zone: ZoneId) -> Option<&ZoneDesc> {
        self.zones.get(zone.0 as usize)
    }

    /// All (zone, instance) keys in deterministic order.
    pub fn keys(&self) -> impl Iterator<Item = DomainKey> + '_ {
        self.zones.iter().enumerate().flat_map(|(z, desc)| {
            (0..desc.instances)
                .map(move |i| DomainKey::new(ZoneId(z as u16), InstanceId(i)))
        })
    }

    /// Check the layout for structural errors.
    ///
    /// # Errors
    ///
    /// [`LayoutError`] naming the first offending zone.
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.zones.is_empty() {
            return Err(LayoutError::NoZones);
        }
        for (z, desc) in self.zones.iter().enumerate() {
            let zone = ZoneId(z as u16);
            if desc.instances == 0 {
                return Err(LayoutError::NoInstances { zone });
            }
            if desc.mesh_levels == 0 {
                return Err(LayoutError::NoMeshLevels { zone });
            }
        }
        Ok(())
    }
}

/// Errors from layout validation (startup-time).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    /// The layout contains no zones.
    NoZones,
    /// A zone declares zero time instances.
    NoInstances {
        /// The offending zone.
        zone: ZoneId,
    },
    /// A zone declares zero mesh levels.
    NoMeshLevels {
        /// The offending zone.
        zone: ZoneId,
    },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoZones => write!(f, "layout has no zones"),
            Self::NoInstances { zone } => {
                write!(f, "zone {zone} declares zero time instances")
            }
            Self::NoMeshLevels { zone } => {
                write!(f, "zone {zone} declares zero mesh levels")
            }
        }
    }
}

impl Error for LayoutError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_zone_layout_validates() {
        let layout = DomainLayout::new(vec![ZoneDesc::single()]);
        layout.validate().unwrap();
        assert!(!layout.multizone());
        assert_eq!(layout.zone_count(), 1);
    }

    #[test]
    fn empty_layout_rejected() {
        let layout = DomainLayout::new(vec![]);
        assert_eq!(layout.validate(), Err(LayoutError::NoZones));
    }

    #[test]
    fn zero_instances_rejected() {
        let layout = DomainLayout::new(vec![
            ZoneDesc::single(),
            ZoneDesc {
                instances: 0,
                mesh_levels: 1,
                moving_grid: false,
            },
        ]);
        assert_eq!(
            layout.validate(),
            Err(LayoutError::NoInstances { zone: ZoneId(1) })
        );
    }

    #[test]
    fn zero_mesh_levels_rejected() {
        let layout = DomainLayout::new(vec![ZoneDesc {
            instances: 1,
            mesh_levels: 0,
            moving_grid: false,
        }]);
        assert_eq!(
            layout.validate(),
            Err(LayoutError::NoMeshLevels { zone: ZoneId(0) })
        );
    }

    #[test]
    fn keys_enumerate_zones_and_instances_in_order() {
        let layout = DomainLayout::new(vec![
            ZoneDesc {
                instances: 2,
                mesh_levels: 1,
                moving_grid: false,
            },
            ZoneDesc::single(),
        ]);
        let keys: Vec<String> = layout.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["z0:i0", "z0:i1", "z1:i0"]);
    }

    #[test]
    fn two_zones_are_multizone() {
        let layout = DomainLayout::new(vec![ZoneDesc::single(), ZoneDesc::single()]);
        assert!(layout.multizone());
    }
}
