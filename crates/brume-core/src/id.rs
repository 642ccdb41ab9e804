//! Strongly-typed identifiers for domains and iteration indices.

use std::fmt;

/// Identifies an independently discretized physical zone.
///
/// Zones are registered at layout construction and assigned sequential
/// IDs. `ZoneId(n)` corresponds to the n-th zone in the domain layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId(pub u16);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for ZoneId {
    fn from(v: u16) -> Self {
        Self(v)
    }
}

/// Identifies a time instance within a zone.
///
/// Harmonic-balance problems carry several instances per zone; ordinary
/// runs have exactly one, `InstanceId(0)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u16);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for InstanceId {
    fn from(v: u16) -> Self {
        Self(v)
    }
}

/// Multigrid level within a zone. Level 0 is the finest mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshLevel(pub u16);

impl MeshLevel {
    /// The finest mesh level.
    pub const FINEST: MeshLevel = MeshLevel(0);
}

impl fmt::Display for MeshLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for MeshLevel {
    fn from(v: u16) -> Self {
        Self(v)
    }
}

/// Addresses one (zone, instance) pair.
///
/// Solution buffers are exclusively owned by their key; cross-zone data
/// only moves through the explicit communicator exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainKey {
    /// The owning zone.
    pub zone: ZoneId,
    /// The time instance within the zone.
    pub instance: InstanceId,
}

impl DomainKey {
    /// Build a key from a zone and instance.
    pub fn new(zone: ZoneId, instance: InstanceId) -> Self {
        Self { zone, instance }
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "z{}:i{}", self.zone, self.instance)
    }
}

/// Position in the recorded primal run, addressed by the adjoint walk.
///
/// The adjoint marches backward, so the index decreases as adjoint time
/// advances and may go negative. Negative indices are *virtual*: they
/// address steps before the primal run began, carry no stored solution,
/// and must resolve to the module's default state instead of a storage
/// lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DirectStep(pub i64);

impl DirectStep {
    /// The step `levels` positions earlier in the primal run.
    pub fn back(self, levels: u32) -> DirectStep {
        DirectStep(self.0 - i64::from(levels))
    }

    /// Whether this step precedes the recorded primal run.
    pub fn is_virtual(self) -> bool {
        self.0 < 0
    }

    /// The storage index for this step, if one can exist.
    pub fn stored_index(self) -> Option<u64> {
        u64::try_from(self.0).ok()
    }
}

impl fmt::Display for DirectStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for DirectStep {
    fn from(v: i64) -> Self {
        Self(v)
    }
}
