//! Test process for the CPU claiming workflow, which installs a global
//! tracing subscriber and thus must run alone.

// WARNING: DO NOT CREATE ANY OTHER #[test] FUNCTION IN THIS INTEGRATION TEST!
//
// If you need more tests, create more integration tests (but beware that they
// won't be able to share code.

use numa_bitmap::{ClaimError, NodeMapping, NumaBitmap, TopologyError, MAX_SIZE};
use proptest::{prelude::*, test_runner::TestRunner};
use std::{collections::BTreeSet, num::NonZeroUsize};
use tracing_error::{ErrorLayer, SpanTrace, SpanTraceStatus};
use tracing_subscriber::prelude::*;

/// Bail out of a test with a spantrace
macro_rules! fail {
    ($message_fmt:expr $(, $args:expr)*) => {{
        let trace = SpanTrace::capture();
        let message = format!($message_fmt $(, $args)*);
        let error = if trace.status() == SpanTraceStatus::CAPTURED {
            TestCaseError::fail(format!("{}\nSpantrace:\n{trace}", message))
        } else {
            TestCaseError::fail(message)
        };
        return Err(error)
    }}
}

// WARNING: DO NOT CREATE ANY OTHER #[test] FUNCTION IN THIS INTEGRATION TEST!

#[test]
fn claiming_test() {
    if let Err(e) = claiming_test_impl() {
        panic!("{e}");
    }
}
fn claiming_test_impl() -> Result<(), TestCaseError> {
    // Set up span traces and log output
    let subscriber = tracing_subscriber::Registry::default()
        .with(ErrorLayer::default())
        .with(tracing_subscriber::fmt::layer().with_test_writer());
    tracing::subscriber::set_global_default(subscriber).unwrap();

    // Claiming every free CPU, one node at a time, fills the bitmap
    TestRunner::default().run(
        &(any_layout(), any_mapping(), 1usize..=8),
        |((size, node_count), mapping, batch)| {
            test_fill_by_claiming(size, node_count, mapping, batch)
        },
    )?;

    // Claims that fail leave the bitmap alone
    TestRunner::default().run(
        &(1usize..=MAX_SIZE, 1usize..=64, any_mapping(), 0usize..80),
        |(size, node_count, mapping, node)| {
            let node_count = NonZeroUsize::new(node_count).unwrap();
            test_failed_claim(size, node_count, mapping, node)
        },
    )?;
    Ok(())
}

/// Claim CPUs by batches of `batch` on every node until none is left
#[tracing::instrument]
fn test_fill_by_claiming(
    size: usize,
    node_count: NonZeroUsize,
    mapping: NodeMapping,
    batch: usize,
) -> Result<(), TestCaseError> {
    let mut bitmap = NumaBitmap::new(size, node_count);
    let mut claimed = BTreeSet::new();
    for node in 0..node_count.get() {
        loop {
            let batch_claim = match bitmap.claim_free(mapping, node, batch, node_count) {
                Ok(offsets) => offsets,
                Err(e) => fail!("failed to claim on node {node}: {e}"),
            };
            prop_assert!(batch_claim.len() <= batch);
            for &offset in &batch_claim {
                prop_assert_eq!(mapping.node_of(size, node_count, offset), Ok(node));
                prop_assert!(claimed.insert(offset), "offset {} claimed twice", offset);
            }
            if batch_claim.len() < batch {
                break;
            }
        }
        match bitmap.zeros_by_node(mapping, node_count) {
            Ok(free) => prop_assert_eq!(free.node(node), Some(&[][..])),
            Err(e) => fail!("failed to list free CPUs: {e}"),
        }
    }
    prop_assert_eq!(bitmap.weight(), size);
    prop_assert_eq!(bitmap.ones_offsets(), claimed.into_iter().collect::<Vec<_>>());
    prop_assert!(bitmap.zeros_offsets().is_empty());
    Ok(())
}

/// Check that a claim either succeeds or leaves the bitmap untouched
#[tracing::instrument]
fn test_failed_claim(
    size: usize,
    node_count: NonZeroUsize,
    mapping: NodeMapping,
    node: usize,
) -> Result<(), TestCaseError> {
    let mut bitmap = NumaBitmap::new(size, node_count);
    let initial = bitmap.clone();
    match bitmap.claim_free(mapping, node, 1, node_count) {
        Ok(offsets) => {
            prop_assert!(node < node_count.get());
            prop_assert!(offsets.len() <= 1);
            prop_assert_eq!(bitmap.weight(), offsets.len());
        }
        Err(ClaimError::NodeOutOfRange {
            node: bad_node,
            node_count: count,
        }) => {
            prop_assert_eq!(bad_node, node);
            prop_assert_eq!(count, node_count.get());
            prop_assert!(node >= node_count.get());
            prop_assert_eq!(&bitmap, &initial);
        }
        Err(ClaimError::Topology(e)) => {
            prop_assert_eq!(mapping, NodeMapping::Hyperthread);
            match e {
                TopologyError::TooManyNodes { .. } => {
                    prop_assert!(2 * node_count.get() > size);
                }
                TopologyError::NodeOutOfRange { node, .. } => {
                    prop_assert!(node >= node_count.get());
                    prop_assert!(size % (2 * node_count.get()) != 0);
                }
            }
            prop_assert_eq!(&bitmap, &initial);
        }
    }
    Ok(())
}

/// Bitmap size and node count that both topology models can map
fn any_layout() -> impl Strategy<Value = (usize, NonZeroUsize)> {
    (1usize..=16).prop_flat_map(|node_count| {
        (1..=MAX_SIZE / (2 * node_count)).prop_map(move |cores_per_node| {
            (
                2 * node_count * cores_per_node,
                NonZeroUsize::new(node_count).unwrap(),
            )
        })
    })
}

/// Either topology model
fn any_mapping() -> impl Strategy<Value = NodeMapping> {
    prop_oneof![Just(NodeMapping::Hyperthread), Just(NodeMapping::Interleaved)]
}
