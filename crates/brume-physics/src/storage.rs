//! Restart storage: converged primal solutions addressed by step.
//!
//! Forward unsteady runs persist each converged step; reverse-time
//! drivers read them back while rotating histories. Virtual steps
//! before the run began never reach storage, so keys carry plain
//! unsigned indices.

use std::error::Error;
use std::fmt;

use brume_core::{ModuleKind, ZoneId};
use indexmap::IndexMap;

// ── Keys ────────────────────────────────────────────────────────────────────

/// What a snapshot holds: one module's solution or the mesh coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SnapshotTarget {
    /// Solution of the module of the given kind.
    State(ModuleKind),
    /// Node coordinates of the (possibly deformed) mesh.
    Coordinates,
}

impl fmt::Display for SnapshotTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(kind) => write!(f, "{kind}"),
            Self::Coordinates => write!(f, "coords"),
        }
    }
}

/// Addresses one stored snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    /// Zone the snapshot belongs to.
    pub zone: ZoneId,
    /// What the snapshot holds.
    pub target: SnapshotTarget,
    /// Converged physical step the snapshot was taken at.
    pub step: u64,
}

impl SnapshotKey {
    /// Key for a module solution snapshot.
    pub fn state(zone: ZoneId, kind: ModuleKind, step: u64) -> Self {
        Self {
            zone,
            target: SnapshotTarget::State(kind),
            step,
        }
    }

    /// Key for a mesh-coordinate snapshot.
    pub fn coordinates(zone: ZoneId, step: u64) -> Self {
        Self {
            zone,
            target: SnapshotTarget::Coordinates,
            step,
        }
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "z{}/{}@{}", self.zone, self.target, self.step)
    }
}

// ── Storage contract ────────────────────────────────────────────────────────

/// Read side of the restart store.
///
/// Implementations are consulted only for steps a forward run could have
/// produced; a miss is an expected condition near the start of the run
/// and callers substitute the module's default state for it. Stores are
/// shared read-only between drivers, hence `Send + Sync`.
pub trait RestartStorage: Send + Sync {
    /// Load the snapshot stored under `key`.
    fn load(&self, key: SnapshotKey) -> Result<Vec<f64>, StorageError>;
}

/// Failure to produce a stored snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Nothing is stored under the key.
    NotFound {
        /// The key that missed.
        key: SnapshotKey,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { key } => write!(f, "no snapshot stored under {key}"),
        }
    }
}

impl Error for StorageError {}

// ── In-memory store ─────────────────────────────────────────────────────────

/// Restart store backed by a map, written by forward runs in-process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    snapshots: IndexMap<SnapshotKey, Vec<f64>>,
}

impl MemoryStorage {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) a snapshot.
    pub fn store(&mut self, key: SnapshotKey, data: Vec<f64>) {
        self.snapshots.insert(key, data);
    }

    /// Whether a snapshot exists under `key`.
    pub fn contains(&self, key: SnapshotKey) -> bool {
        self.snapshots.contains_key(&key)
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl RestartStorage for MemoryStorage {
    fn load(&self, key: SnapshotKey) -> Result<Vec<f64>, StorageError> {
        self.snapshots
            .get(&key)
            .cloned()
            .ok_or(StorageError::NotFound { key })
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_and_load_round_trip() {
        let mut storage = MemoryStorage::new();
        let key = SnapshotKey::state(ZoneId(0), ModuleKind::Flow, 7);
        storage.store(key, vec![1.0, 2.0]);
        assert!(storage.contains(key));
        assert_eq!(storage.load(key), Ok(vec![1.0, 2.0]));
    }

    #[test]
    fn missing_key_reports_not_found() {
        let storage = MemoryStorage::new();
        let key = SnapshotKey::coordinates(ZoneId(1), 3);
        assert_eq!(storage.load(key), Err(StorageError::NotFound { key }));
    }

    #[test]
    fn targets_do_not_collide() {
        let mut storage = MemoryStorage::new();
        let state = SnapshotKey::state(ZoneId(0), ModuleKind::Flow, 2);
        let coords = SnapshotKey::coordinates(ZoneId(0), 2);
        storage.store(state, vec![1.0]);
        storage.store(coords, vec![9.0]);
        assert_eq!(storage.load(state), Ok(vec![1.0]));
        assert_eq!(storage.load(coords), Ok(vec![9.0]));
    }

    #[test]
    fn keys_render_for_diagnostics() {
        let key = SnapshotKey::state(ZoneId(2), ModuleKind::Heat, 11);
        assert_eq!(key.to_string(), "z2/heat@11");
        let key = SnapshotKey::coordinates(ZoneId(0), 0);
        assert_eq!(key.to_string(), "z0/coords@0");
    }
}
