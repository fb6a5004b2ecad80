//! Factor cuts: boundaries at multi-fanout nodes and sources.

use rustc_hash::FxHashSet;

use relic_aig::{Aig, NodeId};

fn factor_rec(aig: &mut Aig, id: NodeId, leaves: &mut Vec<NodeId>) {
    if aig.mark_a(id) {
        return;
    }
    let node = aig.node(id);
    if node.is_ci() || node.refs() > 1 {
        leaves.push(id);
        aig.set_mark_a(id, true);
        return;
    }
    let (f0, f1) = (node.fanin0().node(), node.fanin1().node());
    factor_rec(aig, f0, leaves);
    factor_rec(aig, f1, leaves);
}

/// The unique cut of `root` whose leaves are factor nodes: sources or
/// nodes with multiple fanouts. Mark A is used during collection and
/// cleared before returning.
pub fn factor_cut(aig: &mut Aig, root: NodeId) -> Vec<NodeId> {
    debug_assert!(aig.node(root).is_and());
    let mut leaves = Vec::new();
    let (f0, f1) = (
        aig.node(root).fanin0().node(),
        aig.node(root).fanin1().node(),
    );
    factor_rec(aig, f0, &mut leaves);
    factor_rec(aig, f1, &mut leaves);
    for &leaf in &leaves {
        aig.set_mark_a(leaf, false);
    }
    leaves
}

/// Grows the factor cut of `root` by repeatedly replacing one leaf with
/// its own factor cut, choosing the feasible replacement sharing the most
/// leaves with the cut built so far. `None` when even the base factor cut
/// exceeds `max_leaves`.
pub fn factor_cut_large(aig: &mut Aig, root: NodeId, max_leaves: usize) -> Option<Vec<NodeId>> {
    let mut leaves = factor_cut(aig, root);
    if leaves.len() > max_leaves {
        return None;
    }
    if leaves.len() == max_leaves {
        return Some(leaves);
    }
    let mut in_cut: FxHashSet<NodeId> = leaves.iter().copied().collect();
    let mut factors: Vec<Option<Vec<NodeId>>> = leaves
        .iter()
        .map(|&l| {
            if aig.node(l).is_ci() {
                None
            } else {
                Some(factor_cut(aig, l))
            }
        })
        .collect();

    loop {
        let mut best: Option<(usize, usize)> = None; // (index, share)
        for (i, fact) in factors.iter().enumerate() {
            let Some(fact) = fact else { continue };
            let fresh = fact.iter().filter(|n| !in_cut.contains(n)).count();
            if fresh > max_leaves - leaves.len() + 1 {
                continue;
            }
            let share = fact.len() - fresh;
            if best.is_none_or(|(_, s)| s < share) {
                best = Some((i, share));
            }
        }
        let Some((index, _)) = best else {
            break;
        };
        let leaf = leaves.swap_remove(index);
        let next = factors.swap_remove(index).expect("expandable leaf");
        in_cut.remove(&leaf);
        for n in next {
            if !in_cut.insert(n) {
                continue;
            }
            leaves.push(n);
            factors.push(if aig.node(n).is_ci() {
                None
            } else {
                Some(factor_cut(aig, n))
            });
        }
        debug_assert!(leaves.len() <= max_leaves);
        if leaves.len() == max_leaves {
            break;
        }
    }
    Some(leaves)
}
