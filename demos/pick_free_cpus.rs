use eyre::WrapErr;
use numa_bitmap::{NodeMapping, NumaBitmap, DEFAULT_NODE_COUNT, DEFAULT_SIZE};
use std::num::NonZeroUsize;

/// Marks a few CPUs as busy, then lists and claims free CPUs per NUMA node.
///
/// Usage: `pick_free_cpus [hyperthread|interleaved] [cpus] [nodes]`
fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let mapping = match args.next() {
        Some(name) => name
            .parse::<NodeMapping>()
            .wrap_err_with(|| format!("unknown topology model {name:?}"))?,
        None => NodeMapping::Hyperthread,
    };
    let size = match args.next() {
        Some(size) => size.parse().wrap_err("invalid CPU count")?,
        None => DEFAULT_SIZE,
    };
    let node_count = match args.next() {
        Some(count) => count
            .parse::<NonZeroUsize>()
            .wrap_err("invalid node count")?,
        None => DEFAULT_NODE_COUNT,
    };

    let mut bitmap = NumaBitmap::new(size, node_count);
    if bitmap.size() != size {
        println!("*** Unsupported CPU count {size}, using {}", bitmap.size());
    }

    // Offsets past the end are rejected
    if let Err(e) = bitmap.set(bitmap.size()) {
        println!("*** {e}");
    }

    // The first CPU of every node is busy
    let free = bitmap.zeros_by_node(mapping, node_count)?;
    for &offset in free.iter().filter_map(|cpus| cpus.first()) {
        bitmap.set(offset)?;
    }
    println!("*** Busy CPUs: {bitmap}");

    let busy = bitmap.ones_by_node(mapping, node_count)?;
    let free = bitmap.zeros_by_node(mapping, node_count)?;
    for (node, (busy, free)) in busy.iter().zip(free.iter()).enumerate() {
        println!("*** Node {node} ({mapping}): busy {busy:?}, free {free:?}");
    }

    for node in 0..node_count.get() {
        let claimed = bitmap.claim_free(mapping, node, 2, node_count)?;
        println!("*** Claimed {claimed:?} on node {node}");
    }
    println!("*** Busy CPUs: {bitmap}");

    Ok(())
}
