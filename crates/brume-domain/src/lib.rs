//! Domain layout and rank communication for the Brume workspace.
//!
//! A run is partitioned into zones, each with one or more time instances
//! and a stack of multigrid levels; [`layout`] describes that structure
//! and validates it once at startup. [`comm`] is the seam to the ranks
//! cooperating on a distributed run: a trait with a trivial single-rank
//! implementation and an in-process channel mesh used to test collective
//! lockstep behavior.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod comm;
pub mod layout;

pub use comm::{ChannelComm, Communicator, ExchangeTag, SoloComm};
pub use layout::{DomainLayout, LayoutError, ZoneDesc};
