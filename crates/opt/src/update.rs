//! Committing a decomposition graph in place of a node's MFFC.

use derive_more::{Display, Error};
use tracing::debug;

use relic_aig::{Aig, Edge, NodeId};

use crate::dec::DecGraph;

#[derive(Debug, Display, Error, PartialEq, Eq)]
#[display("update of node {node}: expected gain {expected}, network changed by {actual}")]
pub struct UpdateError {
    pub node: NodeId,
    pub expected: i32,
    pub actual: i32,
}

/// Materializes `graph` over its leaf bindings and replaces `root` with
/// the realized edge. The leaf nodes are pinned across the replacement so
/// the cascade cannot consume them; a leaf left without fanouts is swept
/// at the next pass boundary. Fails when the and-node count does not drop
/// by exactly `gain`.
pub fn update_network(
    aig: &mut Aig,
    root: NodeId,
    graph: &DecGraph,
    leaves: &[Edge],
    complement: bool,
    gain: i32,
    update_level: bool,
) -> Result<(), UpdateError> {
    let before = aig.and_count() as i32;
    for e in leaves {
        aig.bias_refs(e.node(), 1);
    }
    let mut edge = graph.materialize(aig, leaves);
    if complement {
        edge = !edge;
    }
    aig.replace(root, edge);
    for e in leaves {
        aig.bias_refs(e.node(), -1);
    }
    if update_level {
        aig.update_required();
    }
    let actual = before - aig.and_count() as i32;
    if actual != gain {
        return Err(UpdateError {
            node: root,
            expected: gain,
            actual,
        });
    }
    debug!(node = root, gain, "committed replacement");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dec::DecGraph;
    use relic_aig::check::{check_aig, output_signatures};

    #[test]
    fn commit_matches_reported_gain() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let d = aig.and(a, b);
        let n = aig.and(d, a); // n == d functionally
        aig.add_output(d);
        aig.add_output(n);
        let mut graph = DecGraph::with_leaves(1);
        let leaf = graph.leaf(0);
        graph.set_root(leaf);
        let before = output_signatures(&aig, 2);
        update_network(&mut aig, n.node(), &graph, &[d], false, 1, false).unwrap();
        assert_eq!(check_aig(&aig), Ok(()));
        assert_eq!(output_signatures(&aig, 2), before);
        assert_eq!(aig.and_count(), 1);
    }

    #[test]
    fn mismatched_gain_is_an_error() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let d = aig.and(a, b);
        let n = aig.and(d, a);
        aig.add_output(d);
        aig.add_output(n);
        let mut graph = DecGraph::with_leaves(1);
        let leaf = graph.leaf(0);
        graph.set_root(leaf);
        let err = update_network(&mut aig, n.node(), &graph, &[d], false, 2, false).unwrap_err();
        assert_eq!(err.expected, 2);
        assert_eq!(err.actual, 1);
    }

    #[test]
    fn pinned_leaves_survive_the_cascade() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let c = aig.add_input();
        let ab = aig.and(a, b);
        let top = aig.and(ab, c);
        aig.add_output(top);
        // Replace top by a constant with ab pinned as a cut leaf: the
        // cascade stops at ab, which stays behind unreferenced until the
        // next pass-boundary sweep.
        let graph = DecGraph::constant(false);
        update_network(&mut aig, top.node(), &graph, &[ab], false, 1, false).unwrap();
        assert_eq!(check_aig(&aig), Ok(()));
        assert!(!aig.is_removed(ab.node()));
        assert_eq!(aig.node(ab.node()).refs(), 0);
        assert_eq!(aig.cleanup_dangling(), 1);
        assert!(aig.is_removed(ab.node()));
    }
}
