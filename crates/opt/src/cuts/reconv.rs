//! Reconvergence-driven cut computation.

use relic_aig::{Aig, NodeId};

/// Number of fanins of `id` not yet inside the cone; the cost of turning
/// this leaf into an internal node.
fn expansion_cost(aig: &Aig, id: NodeId) -> Option<usize> {
    let node = aig.node(id);
    if !node.is_and() {
        return None;
    }
    let cost = [node.fanin0().node(), node.fanin1().node()]
        .into_iter()
        .filter(|&f| !aig.is_trav_current(f))
        .count();
    Some(cost)
}

/// Grows a leaf set from the fanins of `root`, at each step expanding the
/// leaf that adds the fewest new nodes to the cone (zero-cost reconvergent
/// expansions always taken), until no expansion fits in `max_leaves`.
/// Ties break toward the lower node id. Leaves are returned in insertion
/// order; cone membership is left marked with the current traversal id
/// (root and leaves included).
pub fn reconv_cut(aig: &mut Aig, root: NodeId, max_leaves: usize) -> Vec<NodeId> {
    debug_assert!(aig.node(root).is_and());
    aig.increment_trav_id();
    aig.set_trav_current(root);
    let mut leaves: Vec<NodeId> = Vec::with_capacity(max_leaves);
    let (f0, f1) = (
        aig.node(root).fanin0().node(),
        aig.node(root).fanin1().node(),
    );
    for f in [f0, f1] {
        if !aig.is_trav_current(f) {
            aig.set_trav_current(f);
            leaves.push(f);
        }
    }

    loop {
        let mut best: Option<(usize, NodeId, usize)> = None;
        for (pos, &leaf) in leaves.iter().enumerate() {
            let Some(cost) = expansion_cost(aig, leaf) else {
                continue;
            };
            if cost > 0 && leaves.len() - 1 + cost > max_leaves {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_cost, best_leaf, _)) => {
                    cost < best_cost || (cost == best_cost && leaf < best_leaf)
                }
            };
            if better {
                best = Some((cost, leaf, pos));
            }
        }
        let Some((_, leaf, pos)) = best else {
            break;
        };
        leaves.swap_remove(pos);
        let node = aig.node(leaf);
        let fanins = [node.fanin0().node(), node.fanin1().node()];
        for f in fanins {
            if !aig.is_trav_current(f) {
                aig.set_trav_current(f);
                leaves.push(f);
            }
        }
        if leaves.len() >= max_leaves {
            break;
        }
    }
    leaves
}
