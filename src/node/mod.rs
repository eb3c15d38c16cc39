//! NUMA-node-aware enumeration
//!
//! The offsets of a [`NumaBitmap`] can be grouped by NUMA node according to
//! one of two topology models, described by [`NodeMapping`]:
//!
//! - The [hyperthread-offset model](NodeMapping::Hyperthread) assumes that
//!   physical cores come first and their hyperthread siblings second, with
//!   each node owning a contiguous run of cores in both halves.
//! - The [interleaved model](NodeMapping::Interleaved) assumes that node
//!   assignment cycles with every CPU.
//!
//! These are alternative descriptions of different CPU families, and the
//! bitmap has no way to tell which one matches the machine it describes.
//! Picking the wrong one still produces a plausible-looking grouping, so the
//! choice must come from knowledge of the hardware.

mod hyperthread;
mod interleaved;

use self::{hyperthread::HyperthreadMapper, interleaved::InterleavedMapper};
use crate::{
    bitmap::NumaBitmap,
    errors::{ClaimError, TopologyError},
};
use derive_more::{AsRef, Deref, Into, IntoIterator};
#[cfg(any(test, feature = "proptest"))]
use proptest::prelude::*;
use std::{convert::Infallible, num::NonZeroUsize};
use strum::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

/// Assignment of bitmap offsets to NUMA nodes
pub(crate) trait NodeMapper {
    /// Error emitted when an offset cannot be mapped
    type Error;

    /// Number of nodes that offsets are mapped onto
    fn node_count(&self) -> usize;

    /// Node that `offset` belongs to, always below `node_count()`
    fn node_of(&self, offset: usize) -> Result<usize, Self::Error>;
}

/// Topology model used to assign CPU offsets to NUMA nodes
#[derive(
    Copy,
    Clone,
    Debug,
    Display,
    EnumCount,
    EnumIter,
    EnumString,
    Eq,
    Hash,
    IntoStaticStr,
    PartialEq,
)]
#[strum(serialize_all = "kebab-case")]
pub enum NodeMapping {
    /// Physical cores `[0, size/2)` are followed by their hyperthread siblings
    /// `[size/2, size)`, and each half is split into `node_count` contiguous
    /// runs of `size / (node_count * 2)` CPUs
    ///
    /// With 24 CPUs over 2 nodes, node 0 owns CPUs 0-5 and 12-17 while node 1
    /// owns CPUs 6-11 and 18-23.
    Hyperthread,

    /// CPU `offset` belongs to node `offset % node_count`
    Interleaved,
}
//
impl NodeMapping {
    /// Node that CPU `offset` of a `size`-bit bitmap belongs to
    ///
    /// # Errors
    ///
    /// [`TopologyError`] if this is the hyperthread-offset model and `size`
    /// and `node_count` do not describe a valid layout for `offset`.
    pub fn node_of(
        self,
        size: usize,
        node_count: NonZeroUsize,
        offset: usize,
    ) -> Result<usize, TopologyError> {
        match self {
            Self::Hyperthread => HyperthreadMapper::new(size, node_count)?.node_of(offset),
            Self::Interleaved => Ok(infallible(
                InterleavedMapper::new(node_count).node_of(offset),
            )),
        }
    }
}

#[cfg(any(test, feature = "proptest"))]
impl Arbitrary for NodeMapping {
    type Parameters = ();
    type Strategy = prop::sample::Select<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        use strum::IntoEnumIterator;
        prop::sample::select(Self::iter().collect::<Vec<_>>())
    }
}

/// Bitmap offsets grouped by NUMA node
///
/// This is indexed by node, each node holding its offsets in ascending order.
/// Nodes that no offset maps to still get an (empty) entry.
#[derive(AsRef, Clone, Debug, Default, Deref, Eq, Hash, Into, IntoIterator, PartialEq)]
#[into_iterator(owned, ref)]
pub struct NodeGroups(Vec<Vec<usize>>);
//
impl NodeGroups {
    /// Offsets belonging to node `node`, if that node exists
    pub fn node(&self, node: usize) -> Option<&[usize]> {
        self.0.get(node).map(Vec::as_slice)
    }

    /// Number of nodes
    pub fn num_nodes(&self) -> usize {
        self.0.len()
    }

    /// Total number of offsets across all nodes
    pub fn num_offsets(&self) -> usize {
        self.0.iter().map(Vec::len).sum()
    }
}

/// # NUMA-node-aware enumeration
impl NumaBitmap {
    /// Offsets of set bits grouped by node, using the hyperthread-offset model
    ///
    /// See [`NodeMapping::Hyperthread`] for the layout assumed by this model.
    ///
    /// # Errors
    ///
    /// [`TopologyError`] if any offset of the bitmap maps to a node past
    /// `node_count`, or if there are fewer physical cores than nodes. The
    /// mapping of every offset is checked, whatever the value of its bit, so
    /// the outcome only depends on the bitmap size and `node_count`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use numa_bitmap::NumaBitmap;
    /// # use std::num::NonZeroUsize;
    /// let mut bitmap = NumaBitmap::default();
    /// for offset in [0, 5, 6, 11, 12, 17, 18, 23] {
    ///     bitmap.set(offset)?;
    /// }
    /// let groups = bitmap.ones_by_node_ht(NonZeroUsize::new(2).unwrap())?;
    /// assert_eq!(groups.node(0), Some(&[0, 5, 12, 17][..]));
    /// assert_eq!(groups.node(1), Some(&[6, 11, 18, 23][..]));
    /// # Ok::<(), eyre::Report>(())
    /// ```
    pub fn ones_by_node_ht(&self, node_count: NonZeroUsize) -> Result<NodeGroups, TopologyError> {
        self.group_by_node_ht(node_count, true)
    }

    /// Offsets of unset bits grouped by node, using the hyperthread-offset
    /// model
    ///
    /// # Errors
    ///
    /// Same as [`ones_by_node_ht()`](Self::ones_by_node_ht).
    pub fn zeros_by_node_ht(&self, node_count: NonZeroUsize) -> Result<NodeGroups, TopologyError> {
        self.group_by_node_ht(node_count, false)
    }

    /// Offsets of set bits grouped by node, using the interleaved model
    ///
    /// See [`NodeMapping::Interleaved`] for the layout assumed by this model.
    pub fn ones_by_node_interleaved(&self, node_count: NonZeroUsize) -> NodeGroups {
        infallible(self.group_by_node(&InterleavedMapper::new(node_count), true))
    }

    /// Offsets of unset bits grouped by node, using the interleaved model
    pub fn zeros_by_node_interleaved(&self, node_count: NonZeroUsize) -> NodeGroups {
        infallible(self.group_by_node(&InterleavedMapper::new(node_count), false))
    }

    /// Offsets of set bits grouped by node, using the topology model `mapping`
    ///
    /// # Errors
    ///
    /// [`TopologyError`] if `mapping` is [`NodeMapping::Hyperthread`] and
    /// [`ones_by_node_ht()`](Self::ones_by_node_ht) would fail.
    pub fn ones_by_node(
        &self,
        mapping: NodeMapping,
        node_count: NonZeroUsize,
    ) -> Result<NodeGroups, TopologyError> {
        match mapping {
            NodeMapping::Hyperthread => self.ones_by_node_ht(node_count),
            NodeMapping::Interleaved => Ok(self.ones_by_node_interleaved(node_count)),
        }
    }

    /// Offsets of unset bits grouped by node, using the topology model
    /// `mapping`
    ///
    /// # Errors
    ///
    /// [`TopologyError`] if `mapping` is [`NodeMapping::Hyperthread`] and
    /// [`zeros_by_node_ht()`](Self::zeros_by_node_ht) would fail.
    pub fn zeros_by_node(
        &self,
        mapping: NodeMapping,
        node_count: NonZeroUsize,
    ) -> Result<NodeGroups, TopologyError> {
        match mapping {
            NodeMapping::Hyperthread => self.zeros_by_node_ht(node_count),
            NodeMapping::Interleaved => Ok(self.zeros_by_node_interleaved(node_count)),
        }
    }

    /// Mark up to `count` free CPUs of node `node` as in use, using the
    /// hyperthread-offset model
    ///
    /// Free CPUs are claimed in ascending offset order. The claimed offsets
    /// are returned, there may be fewer than `count` of them if the node does
    /// not have enough free CPUs.
    ///
    /// # Errors
    ///
    /// - [`ClaimError::Topology`] if the bitmap cannot be mapped onto
    ///   `node_count` nodes, see [`ones_by_node_ht()`](Self::ones_by_node_ht)
    /// - [`ClaimError::NodeOutOfRange`] if `node >= node_count`
    ///
    /// The bitmap is not modified when an error is returned.
    pub fn claim_free_ht(
        &mut self,
        node: usize,
        count: usize,
        node_count: NonZeroUsize,
    ) -> Result<Vec<usize>, ClaimError> {
        let free = self.zeros_by_node_ht(node_count)?;
        self.claim_from(free, node, count)
    }

    /// Mark up to `count` free CPUs of node `node` as in use, using the
    /// interleaved model
    ///
    /// # Errors
    ///
    /// [`ClaimError::NodeOutOfRange`] if `node >= node_count`. The bitmap is
    /// not modified in this case.
    pub fn claim_free_interleaved(
        &mut self,
        node: usize,
        count: usize,
        node_count: NonZeroUsize,
    ) -> Result<Vec<usize>, ClaimError> {
        let free = self.zeros_by_node_interleaved(node_count);
        self.claim_from(free, node, count)
    }

    /// Mark up to `count` free CPUs of node `node` as in use, using the
    /// topology model `mapping`
    ///
    /// # Errors
    ///
    /// See [`claim_free_ht()`](Self::claim_free_ht).
    pub fn claim_free(
        &mut self,
        mapping: NodeMapping,
        node: usize,
        count: usize,
        node_count: NonZeroUsize,
    ) -> Result<Vec<usize>, ClaimError> {
        match mapping {
            NodeMapping::Hyperthread => self.claim_free_ht(node, count, node_count),
            NodeMapping::Interleaved => self.claim_free_interleaved(node, count, node_count),
        }
    }

    /// Shared implementation of the hyperthread-offset model queries
    fn group_by_node_ht(
        &self,
        node_count: NonZeroUsize,
        value: bool,
    ) -> Result<NodeGroups, TopologyError> {
        HyperthreadMapper::new(self.size(), node_count)
            .and_then(|mapper| self.group_by_node(&mapper, value))
            .map_err(log_topology_error)
    }

    /// Offsets of bits equal to `value` grouped by node
    ///
    /// Stops at the first offset that cannot be mapped, in which case no
    /// grouping is returned.
    fn group_by_node<M: NodeMapper>(&self, mapper: &M, value: bool) -> Result<NodeGroups, M::Error> {
        let mut groups = vec![Vec::new(); mapper.node_count()];
        self.scan(|offset, bit| -> Result<(), M::Error> {
            let node = mapper.node_of(offset)?;
            if bit == value {
                groups[node].push(offset);
            }
            Ok(())
        })?;
        Ok(NodeGroups(groups))
    }

    /// Mark up to `count` offsets from `free`'s entry for `node` as in use
    fn claim_from(
        &mut self,
        free: NodeGroups,
        node: usize,
        count: usize,
    ) -> Result<Vec<usize>, ClaimError> {
        let node_count = free.num_nodes();
        let Some(mut claimed) = free.0.into_iter().nth(node) else {
            return Err(ClaimError::NodeOutOfRange { node, node_count });
        };
        claimed.truncate(count);
        self.set_validated(&claimed);
        tracing::trace!(node, requested = count, ?claimed, "claimed free CPUs");
        Ok(claimed)
    }
}

/// Report a topology error before propagating it
fn log_topology_error(error: TopologyError) -> TopologyError {
    tracing::debug!(%error, "bitmap does not match the hyperthread-offset layout");
    error
}

/// Unwrap the result of an operation that cannot fail
fn infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}
