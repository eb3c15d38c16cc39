//! Interleaved topology model
//!
//! Node assignment cycles with every logical CPU: offset `o` belongs to node
//! `o % node_count`. For example, 8 CPUs over 2 nodes are laid out as follows:
//!
//! ```text
//! node 0: 0, 2, 4, 6
//! node 1: 1, 3, 5, 7
//! ```

use super::NodeMapper;
use std::{convert::Infallible, num::NonZeroUsize};

/// Node assignment for the interleaved model
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct InterleavedMapper(NonZeroUsize);
//
impl InterleavedMapper {
    /// Prepare to map offsets onto `node_count` nodes
    pub(crate) fn new(node_count: NonZeroUsize) -> Self {
        Self(node_count)
    }
}
//
impl NodeMapper for InterleavedMapper {
    type Error = Infallible;

    fn node_count(&self) -> usize {
        self.0.get()
    }

    fn node_of(&self, offset: usize) -> Result<usize, Infallible> {
        Ok(offset % self.0)
    }
}
