//! Rank communication seam.
//!
//! Execution is synchronous and rank-parallel: every rank runs the same
//! control flow, and the only suspension points are the collectives
//! defined here. [`SoloComm`] serves single-rank runs. [`ChannelComm`]
//! builds an in-process full mesh of channels, used to test that the
//! orchestration layer keeps all ranks in lockstep, including the fatal
//! desynchronization path.

use crossbeam_channel::{unbounded, Receiver, Sender};
use indexmap::IndexMap;

use brume_core::error::CommError;
use brume_core::kind::ModuleKind;

// ── Exchange tags ──────────────────────────────────────────────────

/// What a boundary exchange carries.
///
/// All ranks must present the same tag to the same collective; a
/// mismatch means control flow diverged and is fatal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeTag {
    /// Shared-boundary solution values of one module.
    Solution(ModuleKind),
    /// Mesh point coordinates at partition boundaries.
    Coordinates,
}

impl ExchangeTag {
    /// Stable discriminant used in desynchronization reports.
    pub fn token(self) -> u64 {
        match self {
            Self::Solution(kind) => {
                let idx = match kind {
                    ModuleKind::Flow => 0,
                    ModuleKind::Turbulence => 1,
                    ModuleKind::Heat => 2,
                    ModuleKind::Radiation => 3,
                    ModuleKind::Structure => 4,
                    ModuleKind::MeshDeform => 5,
                };
                0x10 | idx
            }
            Self::Coordinates => 0x20,
        }
    }
}

// ── Communicator trait ─────────────────────────────────────────────

/// Collective operations between the ranks of a distributed run.
///
/// # Contract
///
/// Every rank must reach every collective in the same order with the
/// same tag or token. Collectives block until all peers arrive; there is
/// no cancellation, an in-flight collective always completes. Divergence
/// surfaces as [`CommError::Desync`] and is fatal.
///
/// # Object safety
///
/// The trait is object safe; orchestration code holds `&dyn Communicator`.
pub trait Communicator: Send {
    /// This rank's index, in `0..size`.
    fn rank(&self) -> usize;

    /// Number of cooperating ranks.
    fn size(&self) -> usize;

    /// Collective agreement check: every rank presents `token`, and all
    /// tokens must match.
    ///
    /// # Errors
    ///
    /// [`CommError::Desync`] when a peer presented a different token;
    /// [`CommError::Disconnected`] when a peer is gone.
    fn agree(&self, token: u64) -> Result<(), CommError>;

    /// Collective exchange of shared-boundary payloads. Returns each
    /// peer's payload keyed by peer rank, in ascending rank order.
    ///
    /// # Errors
    ///
    /// [`CommError::Desync`] when a peer exchanged under a different
    /// tag; [`CommError::Disconnected`] when a peer is gone.
    fn exchange(
        &self,
        tag: ExchangeTag,
        data: &[f64],
    ) -> Result<Vec<(usize, Vec<f64>)>, CommError>;

    /// Collective barrier.
    ///
    /// # Errors
    ///
    /// [`CommError::Disconnected`] when a peer is gone.
    fn barrier(&self) -> Result<(), CommError>;
}

// ── Single-rank implementation ─────────────────────────────────────

/// Communicator for a run on a single rank. Every collective is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoloComm;

impl Communicator for SoloComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn agree(&self, _token: u64) -> Result<(), CommError> {
        Ok(())
    }

    fn exchange(
        &self,
        _tag: ExchangeTag,
        _data: &[f64],
    ) -> Result<Vec<(usize, Vec<f64>)>, CommError> {
        Ok(Vec::new())
    }

    fn barrier(&self) -> Result<(), CommError> {
        Ok(())
    }
}

// ── In-process channel mesh ────────────────────────────────────────

/// One frame of a collective, sent point to point across the mesh.
#[derive(Debug, Clone)]
enum Frame {
    Agree(u64),
    Exchange(ExchangeTag, Vec<f64>),
    Barrier,
}

const EXCHANGE_FRAME: u64 = u64::MAX - 1;
const BARRIER_FRAME: u64 = u64::MAX;

impl Frame {
    /// Token a peer frame contributes to an agreement check. Frames of
    /// the wrong collective produce reserved tokens and therefore fail
    /// the check, which is how sequence divergence is caught.
    fn agreement_token(&self) -> u64 {
        match self {
            Self::Agree(token) => *token,
            Self::Exchange(..) => EXCHANGE_FRAME,
            Self::Barrier => BARRIER_FRAME,
        }
    }
}

struct PeerLink {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
}

/// Communicator over an in-process full mesh of channels.
///
/// [`ChannelComm::mesh`] returns one communicator per rank; move each to
/// its own thread. Channels are unbounded, so each collective can send
/// to every peer before receiving without deadlock.
pub struct ChannelComm {
    rank: usize,
    size: usize,
    peers: IndexMap<usize, PeerLink>,
}

impl ChannelComm {
    /// Build communicators for `ranks` cooperating ranks.
    ///
    /// Peers are wired pairwise in both directions; each returned
    /// communicator's peer list iterates in ascending rank order.
    pub fn mesh(ranks: usize) -> Vec<ChannelComm> {
        let mut peer_maps: Vec<IndexMap<usize, PeerLink>> =
            (0..ranks).map(|_| IndexMap::new()).collect();

        for i in 0..ranks {
            for j in (i + 1)..ranks {
                let (tx_ij, rx_ij) = unbounded();
                let (tx_ji, rx_ji) = unbounded();
                peer_maps[i].insert(j, PeerLink { tx: tx_ij, rx: rx_ji });
                peer_maps[j].insert(i, PeerLink { tx: tx_ji, rx: rx_ij });
            }
        }

        // Peer maps must iterate in ascending rank order regardless of
        // wiring order.
        for map in &mut peer_maps {
            map.sort_keys();
        }

        peer_maps
            .into_iter()
            .enumerate()
            .map(|(rank, peers)| ChannelComm {
                rank,
                size: ranks,
                peers,
            })
            .collect()
    }

    fn broadcast(&self, frame: &Frame) -> Result<(), CommError> {
        for link in self.peers.values() {
            link.tx
                .send(frame.clone())
                .map_err(|_| CommError::Disconnected { rank: self.rank })?;
        }
        Ok(())
    }
}

impl Communicator for ChannelComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn agree(&self, token: u64) -> Result<(), CommError> {
        self.broadcast(&Frame::Agree(token))?;
        for link in self.peers.values() {
            let frame = link
                .rx
                .recv()
                .map_err(|_| CommError::Disconnected { rank: self.rank })?;
            let remote = frame.agreement_token();
            if remote != token {
                return Err(CommError::Desync {
                    rank: self.rank,
                    local: token,
                    remote,
                });
            }
        }
        Ok(())
    }

    fn exchange(
        &self,
        tag: ExchangeTag,
        data: &[f64],
    ) -> Result<Vec<(usize, Vec<f64>)>, CommError> {
        self.broadcast(&Frame::Exchange(tag, data.to_vec()))?;

        let mut gathered = Vec::with_capacity(self.peers.len());
        for (&peer, link) in &self.peers {
            let frame = link
                .rx
                .recv()
                .map_err(|_| CommError::Disconnected { rank: self.rank })?;
            match frame {
                Frame::Exchange(remote_tag, payload) if remote_tag == tag => {
                    gathered.push((peer, payload));
                }
                other => {
                    return Err(CommError::Desync {
                        rank: self.rank,
                        local: tag.token(),
                        remote: other.agreement_token(),
                    });
                }
            }
        }
        Ok(gathered)
    }

    fn barrier(&self) -> Result<(), CommError> {
        self.broadcast(&Frame::Barrier)?;
        for link in self.peers.values() {
            link.rx
                .recv()
                .map_err(|_| CommError::Disconnected { rank: self.rank })?;
        }
        Ok(())
    }
}
