//! NUMA-aware CPU bitmaps
//!
//! This crate provides [`NumaBitmap`], a fixed-size bitmap that models the
//! logical CPUs of a hyper-threaded machine. Each bit records whether the CPU
//! at that offset is in use, and the set (or unset) offsets can be listed
//! either as a whole or grouped by NUMA node, which is what a tool needs to
//! pick free CPUs close to some memory before pinning a process to them.
//!
//! The bitmap does not query the operating system for the actual topology,
//! nor does it pin anything itself. It is a pure in-memory structure whose
//! node assignment follows one of two topology models, see
//! [`NodeMapping`] for details.
//!
//! # Usage
//!
//! ```
//! use numa_bitmap::{NodeMapping, NumaBitmap};
//! use std::num::NonZeroUsize;
//!
//! // 24 logical CPUs over 2 NUMA nodes
//! let two_nodes = NonZeroUsize::new(2).unwrap();
//! let mut bitmap = NumaBitmap::new(24, two_nodes);
//!
//! // Some CPUs are already busy
//! for busy in [0, 1, 12] {
//!     bitmap.set(busy)?;
//! }
//! assert_eq!(bitmap.to_string(), "[0, 1, 12]");
//!
//! // List free CPUs per node
//! let free = bitmap.zeros_by_node(NodeMapping::Hyperthread, two_nodes)?;
//! assert_eq!(free.node(0), Some(&[2, 3, 4, 5, 13, 14, 15, 16, 17][..]));
//!
//! // Reserve two free CPUs on node 1
//! let claimed = bitmap.claim_free_ht(1, 2, two_nodes)?;
//! assert_eq!(claimed, [6, 7]);
//! # Ok::<(), eyre::Report>(())
//! ```
//!
//! # Thread safety
//!
//! Operations are synchronous and never block. The bitmap has no internal
//! locking: setting bits requires `&mut NumaBitmap`, so concurrent mutation
//! and enumeration must be coordinated by the caller, e.g. with a `RwLock`.
//! A bitmap that is no longer modified can be shared freely by reference.
//!
//! # Logging
//!
//! Noteworthy events, such as an invalid size being replaced by the default,
//! are reported through the [`tracing`] crate. Install a subscriber to see
//! them.

pub mod bitmap;
pub mod errors;
pub mod node;
#[cfg(any(test, feature = "proptest"))]
pub mod strategies;

pub use self::{
    bitmap::{NumaBitmap, DEFAULT_NODE_COUNT, DEFAULT_SIZE, MAX_SIZE},
    errors::{ClaimError, OutOfRange, TopologyError},
    node::{NodeGroups, NodeMapping},
};
