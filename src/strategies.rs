//! Common strategies for property-based testing
//!
//! Every proptest [`Strategy`] which cannot be handled by an [`Arbitrary`] impl
//! or a function that is only used by a single module is centralized here.

use crate::bitmap::MAX_SIZE;
use proptest::{
    prelude::*,
    strategy::{Flatten, Map, TupleUnion, WA},
};
use std::{
    num::NonZeroUsize,
    ops::{RangeFrom, RangeInclusive},
};

/// Bitmap size with reasonable odds of being clamped at construction
///
/// Valid sizes are favored, but 0 and sizes past [`MAX_SIZE`] are also
/// generated since they get replaced by the default size.
pub fn any_size() -> AnySize {
    prop_oneof![
        4 => 1..=MAX_SIZE,
        1 => Just(0),
        1 => MAX_SIZE + 1..,
    ]
}

/// Strategy emitted by [`any_size()`]
pub type AnySize = TupleUnion<(
    WA<RangeInclusive<usize>>,
    WA<Just<usize>>,
    WA<RangeFrom<usize>>,
)>;

/// Bitmap size and node count that the hyperthread-offset model can map
///
/// The size is a nonzero multiple of twice the node count, so that both the
/// physical cores and their hyperthread siblings split evenly across nodes.
pub fn hyperthread_layout() -> HyperthreadLayout {
    (1..=MAX_SIZE / 2)
        .prop_flat_map(cores_per_half as fn(usize) -> _)
        .prop_map(layout as fn(_) -> _)
}

/// Strategy emitted by [`hyperthread_layout()`]
pub type HyperthreadLayout = Map<
    Flatten<Map<RangeInclusive<usize>, fn(usize) -> (Just<usize>, RangeInclusive<usize>)>>,
    fn((usize, usize)) -> (usize, NonZeroUsize),
>;

/// Pick a node count, then a number of cores per node
fn cores_per_half(node_count: usize) -> (Just<usize>, RangeInclusive<usize>) {
    (Just(node_count), 1..=MAX_SIZE / (2 * node_count))
}

/// Turn a node count and cores per node into a bitmap size
fn layout((node_count, cores_per_node): (usize, usize)) -> (usize, NonZeroUsize) {
    let node_count = NonZeroUsize::new(node_count).expect("node counts start at 1");
    (2 * node_count.get() * cores_per_node, node_count)
}
