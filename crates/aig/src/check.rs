//! Post-pass network verification.

use derive_more::{Display, Error};
use itertools::Itertools;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use rustc_hash::FxHashMap;

use crate::edge::{Edge, NodeId};
use crate::network::Aig;
use crate::node::NodeKind;

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum CheckError {
    #[display("node {node}: fanin {fanin} is not a live node")]
    DeadFanin { node: NodeId, fanin: NodeId },
    #[display("node {node}: fanin {fanin} does not precede it")]
    FaninOrder { node: NodeId, fanin: NodeId },
    #[display("nodes {first} and {second} share the fanin pair ({e0}, {e1})")]
    DuplicateStructure {
        first: NodeId,
        second: NodeId,
        e0: Edge,
        e1: Edge,
    },
    #[display("node {node}: fanout bookkeeping out of sync with {fanin}")]
    FanoutMismatch { node: NodeId, fanin: NodeId },
    #[display("node {node}: reference count {refs} != fanout count {fanouts}")]
    RefCount {
        node: NodeId,
        refs: u32,
        fanouts: usize,
    },
    #[display("node {node}: level {level}, fanins imply {expected}")]
    Level {
        node: NodeId,
        level: u32,
        expected: u32,
    },
    #[display("combinational cycle through node {node}")]
    Cycle { node: NodeId },
}

/// Checks the structural invariants: fanins live and preceding, strash a
/// function, fanout lists consistent with fanins, levels consistent, and
/// the and-graph acyclic.
pub fn check_aig(aig: &Aig) -> Result<(), CheckError> {
    let live = |id: NodeId| !aig.is_removed(id);

    let mut pairs: FxHashMap<(Edge, Edge), NodeId> = FxHashMap::default();
    let mut expected_fanouts: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();

    for id in 0..aig.slot_count() as NodeId {
        let node = aig.node(id);
        match node.kind() {
            NodeKind::And => {
                let (e0, e1) = (node.fanin0(), node.fanin1());
                for fanin in [e0.node(), e1.node()] {
                    if !live(fanin) {
                        return Err(CheckError::DeadFanin { node: id, fanin });
                    }
                    if fanin >= id {
                        return Err(CheckError::FaninOrder { node: id, fanin });
                    }
                    expected_fanouts.entry(fanin).or_default().push(id);
                }
                if let Some(&first) = pairs.get(&(e0, e1)) {
                    return Err(CheckError::DuplicateStructure {
                        first,
                        second: id,
                        e0,
                        e1,
                    });
                }
                pairs.insert((e0, e1), id);
                let expected = 1 + aig.level(e0.node()).max(aig.level(e1.node()));
                if node.level() != expected {
                    return Err(CheckError::Level {
                        node: id,
                        level: node.level(),
                        expected,
                    });
                }
            }
            NodeKind::Output | NodeKind::Latch => {
                let driver = node.fanin0();
                if !live(driver.node()) {
                    return Err(CheckError::DeadFanin {
                        node: id,
                        fanin: driver.node(),
                    });
                }
                expected_fanouts.entry(driver.node()).or_default().push(id);
            }
            _ => {}
        }
    }

    for id in 0..aig.slot_count() as NodeId {
        let node = aig.node(id);
        if node.kind() == NodeKind::Removed {
            continue;
        }
        let mut expected = expected_fanouts.remove(&id).unwrap_or_default();
        expected.sort_unstable();
        let actual = node.fanouts().iter().copied().sorted().collect_vec();
        if expected != actual {
            let fanin = id;
            let node = actual
                .iter()
                .chain(expected.iter())
                .copied()
                .next()
                .unwrap_or(id);
            return Err(CheckError::FanoutMismatch { node, fanin });
        }
        if node.refs() as usize != actual.len() {
            return Err(CheckError::RefCount {
                node: id,
                refs: node.refs(),
                fanouts: actual.len(),
            });
        }
    }

    // Acyclicity of the fanin relation (latch next-state edges excluded).
    let mut graph = DiGraph::<NodeId, ()>::new();
    let mut indices = FxHashMap::default();
    for id in 0..aig.slot_count() as NodeId {
        if live(id) {
            indices.insert(id, graph.add_node(id));
        }
    }
    for id in 0..aig.slot_count() as NodeId {
        let node = aig.node(id);
        match node.kind() {
            NodeKind::And => {
                graph.add_edge(indices[&node.fanin0().node()], indices[&id], ());
                graph.add_edge(indices[&node.fanin1().node()], indices[&id], ());
            }
            NodeKind::Output => {
                graph.add_edge(indices[&node.fanin0().node()], indices[&id], ());
            }
            _ => {}
        }
    }
    toposort(&graph, None).map_err(|cycle| CheckError::Cycle {
        node: graph[cycle.node_id()],
    })?;
    Ok(())
}

/// 64-bit random simulation signatures of the outputs. Two structurally
/// different networks realizing the same functions produce equal
/// signatures for the same seed, which backs the functional-equivalence
/// check between passes.
pub fn output_signatures(aig: &Aig, seed: u64) -> Vec<u64> {
    let mut state = seed | 1;
    let mut next = || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };
    let mut values: FxHashMap<NodeId, u64> = FxHashMap::default();
    values.insert(0, 0);
    for &input in aig.inputs() {
        values.insert(input, next());
    }
    for &latch in aig.latches() {
        values.insert(latch, next());
    }

    fn eval(aig: &Aig, id: NodeId, values: &mut FxHashMap<NodeId, u64>) -> u64 {
        if let Some(&v) = values.get(&id) {
            return v;
        }
        let node = aig.node(id);
        debug_assert!(node.is_and());
        let (e0, e1) = (node.fanin0(), node.fanin1());
        let v0 = eval(aig, e0.node(), values);
        let v1 = eval(aig, e1.node(), values);
        let v = (if e0.is_complement() { !v0 } else { v0 })
            & (if e1.is_complement() { !v1 } else { v1 });
        values.insert(id, v);
        v
    }

    aig.outputs()
        .iter()
        .map(|&po| {
            let driver = aig.node(po).fanin0();
            let v = eval(aig, driver.node(), &mut values);
            if driver.is_complement() { !v } else { v }
        })
        .collect()
}
