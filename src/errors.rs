//! Error types
//!
//! Every fallible operation of this crate reports its failure synchronously
//! through one of the types below. None of them leave the bitmap in a modified
//! state: an operation that errors out has not touched the storage.

use std::fmt::Debug;
use thiserror::Error;

/// An offset was used that lies outside of the bitmap's logical size
///
/// Storage is allocated in whole bytes, so there may physically be a few more
/// bits than the size that was requested at construction time. These padding
/// bits are not part of the bitmap and are rejected just like any other
/// offset past the end.
#[derive(Copy, Clone, Debug, Eq, Error, Hash, PartialEq)]
#[error("offset {offset} is out of range for a bitmap of {size} bits")]
pub struct OutOfRange {
    /// Offset that was requested
    pub offset: usize,

    /// Logical size of the bitmap, i.e. the exclusive upper bound of
    /// valid offsets
    pub size: usize,
}

/// The requested node count does not match the hyper-threaded CPU layout
///
/// This is emitted by the hyperthread-offset model only, which assumes that
/// the bitmap size and node count describe two contiguous halves of physical
/// cores and sibling threads, each split evenly across nodes. When these
/// parameters are inconsistent, no grouping is returned at all.
#[derive(Copy, Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum TopologyError {
    /// An offset was mapped to a node index past the last node
    #[error("node index {node} is out of range for {node_count} node(s) (offset {offset}, normalized offset {normalized})")]
    NodeOutOfRange {
        /// Computed node index
        node: usize,

        /// Bitmap offset that was being mapped
        offset: usize,

        /// Offset after hyperthread siblings were folded onto their core
        normalized: usize,

        /// Number of nodes that the query was made with
        node_count: usize,
    },

    /// There are fewer physical cores than nodes to spread them across
    #[error("{node_count} node(s) cannot be laid out over {size} hyper-threaded CPU(s)")]
    TooManyNodes {
        /// Number of nodes that the query was made with
        node_count: usize,

        /// Logical size of the bitmap
        size: usize,
    },
}

/// Failed to claim free CPUs on a node
#[derive(Copy, Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum ClaimError {
    /// The topology model could not map the bitmap onto nodes
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// The requested node does not exist
    #[error("cannot claim CPUs on node {node}, there are only {node_count} node(s)")]
    NodeOutOfRange {
        /// Requested node
        node: usize,

        /// Number of nodes that the query was made with
        node_count: usize,
    },
}

/// A method was passed an invalid parameter
///
/// This generic error type is only used when there is only a single way a
/// function parameter can be invalid, and the fact that it is invalid does
/// not depend on the value of another parameter. Otherwise, a more descriptive
/// dedicated error type will be used.
#[derive(Copy, Clone, Debug, Default, Eq, Error, Hash, PartialEq)]
#[error("parameter {0:?} is not valid for this operation")]
pub struct ParameterError<Parameter: Debug>(pub Parameter);
//
impl<Parameter: Debug> From<Parameter> for ParameterError<Parameter> {
    fn from(value: Parameter) -> Self {
        Self(value)
    }
}
