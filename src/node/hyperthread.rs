//! Hyperthread-offset topology model
//!
//! Logical CPUs are laid out as two contiguous halves, physical cores
//! `[0, size/2)` followed by their hyperthread siblings `[size/2, size)`.
//! Within each half, cores are split into runs of `size / (node_count * 2)`
//! consecutive offsets, one run per node. For example, 24 CPUs over 2 nodes
//! are laid out as follows:
//!
//! ```text
//! node 0: 0-5, 12-17
//! node 1: 6-11, 18-23
//! ```

use super::NodeMapper;
use crate::errors::TopologyError;
use std::num::NonZeroUsize;

/// Node assignment for the hyperthread-offset model
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct HyperthreadMapper {
    /// Number of physical cores, i.e. offset of the first hyperthread sibling
    cores: usize,

    /// Number of consecutive cores belonging to each node
    step: usize,

    /// Number of nodes
    node_count: usize,
}
//
impl HyperthreadMapper {
    /// Prepare to map a bitmap of `size` bits onto `node_count` nodes
    ///
    /// # Errors
    ///
    /// [`TopologyError::TooManyNodes`] if there are fewer physical cores than
    /// nodes, which would leave some nodes without any core.
    pub(crate) fn new(size: usize, node_count: NonZeroUsize) -> Result<Self, TopologyError> {
        let node_count = node_count.get();
        let too_many_nodes = TopologyError::TooManyNodes { node_count, size };
        let step = node_count
            .checked_mul(2)
            .map(|halves| size / halves)
            .ok_or(too_many_nodes)?;
        if step == 0 {
            return Err(too_many_nodes);
        }
        Ok(Self {
            cores: size / 2,
            step,
            node_count,
        })
    }
}
//
impl NodeMapper for HyperthreadMapper {
    type Error = TopologyError;

    fn node_count(&self) -> usize {
        self.node_count
    }

    fn node_of(&self, offset: usize) -> Result<usize, TopologyError> {
        // Fold hyperthread siblings onto their physical core
        let normalized = if offset >= self.cores {
            offset - self.cores
        } else {
            offset
        };
        let node = normalized / self.step;
        if node < self.node_count {
            Ok(node)
        } else {
            Err(TopologyError::NodeOutOfRange {
                node,
                offset,
                normalized,
                node_count: self.node_count,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::hyperthread_layout;
    use proptest::prelude::*;
    #[allow(unused)]
    use similar_asserts::assert_eq;

    fn nodes(count: usize) -> NonZeroUsize {
        NonZeroUsize::new(count).unwrap()
    }

    #[test]
    fn two_nodes() {
        let mapper = HyperthreadMapper::new(24, nodes(2)).unwrap();
        assert_eq!(mapper.node_count(), 2);
        let mapped = (0..24)
            .map(|offset| mapper.node_of(offset).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(
            mapped,
            vec![
                0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, //
                0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1,
            ]
        );
    }

    #[test]
    fn too_many_nodes() {
        assert_eq!(
            HyperthreadMapper::new(24, nodes(13)),
            Err(TopologyError::TooManyNodes {
                node_count: 13,
                size: 24
            })
        );
        assert_eq!(
            HyperthreadMapper::new(1, nodes(1)),
            Err(TopologyError::TooManyNodes {
                node_count: 1,
                size: 1
            })
        );
        assert_eq!(
            HyperthreadMapper::new(24, nodes(usize::MAX)),
            Err(TopologyError::TooManyNodes {
                node_count: usize::MAX,
                size: 24
            })
        );
        assert!(HyperthreadMapper::new(24, nodes(12)).is_ok());
    }

    #[test]
    fn uneven_layout() {
        // 25 CPUs: 12 cores, step 6, and offset 24 folds onto core 12 which
        // lies past the last node
        let mapper = HyperthreadMapper::new(25, nodes(2)).unwrap();
        for offset in 0..24 {
            assert!(mapper.node_of(offset).is_ok());
        }
        assert_eq!(
            mapper.node_of(24),
            Err(TopologyError::NodeOutOfRange {
                node: 2,
                offset: 24,
                normalized: 12,
                node_count: 2,
            })
        );
    }

    proptest! {
        #[test]
        fn siblings_share_node((size, node_count) in hyperthread_layout()) {
            let mapper = HyperthreadMapper::new(size, node_count).unwrap();
            let cores = size / 2;
            for core in 0..cores {
                let node = mapper.node_of(core).unwrap();
                prop_assert!(node < node_count.get());
                prop_assert_eq!(mapper.node_of(core + cores), Ok(node));
            }
        }

        #[test]
        fn nodes_are_contiguous_runs((size, node_count) in hyperthread_layout()) {
            let mapper = HyperthreadMapper::new(size, node_count).unwrap();
            let step = size / (2 * node_count.get());
            for core in 0..size / 2 {
                prop_assert_eq!(mapper.node_of(core), Ok(core / step));
            }
        }
    }
}
