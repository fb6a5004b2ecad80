//! Maximum fanout-free cone machinery.
//!
//! The MFFC of a node is found by reference counting: pin the cut leaves,
//! dereference the cone depth-first (a node belongs to the MFFC exactly
//! when its fanout count drops to zero), then re-reference to restore every
//! count to what it was.

use crate::edge::NodeId;
use crate::network::Aig;

fn deref_rec(aig: &mut Aig, id: NodeId) -> usize {
    if !aig.node(id).is_and() {
        return 0;
    }
    aig.set_trav_current(id);
    let mut count = 1;
    let fanins = [aig.node(id).fanin0().node(), aig.node(id).fanin1().node()];
    for child in fanins {
        aig.bias_refs(child, -1);
        if aig.node(child).refs() == 0 {
            count += deref_rec(aig, child);
        }
    }
    count
}

fn ref_rec(aig: &mut Aig, id: NodeId) -> usize {
    if !aig.node(id).is_and() {
        return 0;
    }
    let mut count = 1;
    let fanins = [aig.node(id).fanin0().node(), aig.node(id).fanin1().node()];
    for child in fanins {
        if aig.node(child).refs() == 0 {
            count += ref_rec(aig, child);
        }
        aig.bias_refs(child, 1);
    }
    count
}

/// Sizes the MFFC of `root` relative to `leaves` and labels its members
/// with the current traversal id (callers increment it first). Fanout
/// counts are restored exactly.
pub fn mffc_label(aig: &mut Aig, root: NodeId, leaves: &[NodeId]) -> usize {
    for &leaf in leaves {
        aig.bias_refs(leaf, 1);
    }
    let size = deref_rec(aig, root);
    let restored = ref_rec(aig, root);
    debug_assert_eq!(size, restored);
    for &leaf in leaves {
        aig.bias_refs(leaf, -1);
    }
    size
}

fn collect_rec(aig: &Aig, id: NodeId, out: &mut Vec<NodeId>) {
    if !aig.is_trav_current(id) || !aig.node(id).is_and() {
        return;
    }
    if out.contains(&id) {
        return;
    }
    collect_rec(aig, aig.node(id).fanin0().node(), out);
    collect_rec(aig, aig.node(id).fanin1().node(), out);
    out.push(id);
}

/// Computes the MFFC of `root` relative to `leaves` and collects its
/// members fanin-first, root last.
pub fn mffc_collect(aig: &mut Aig, root: NodeId, leaves: &[NodeId], out: &mut Vec<NodeId>) -> usize {
    aig.increment_trav_id();
    let size = mffc_label(aig, root, leaves);
    out.clear();
    collect_rec(aig, root, out);
    debug_assert_eq!(out.len(), size);
    debug_assert_eq!(out.last().copied(), Some(root));
    size
}

/// MFFC size without labeling side effects beyond the traversal id.
pub fn mffc_size(aig: &mut Aig, root: NodeId, leaves: &[NodeId]) -> usize {
    aig.increment_trav_id();
    mffc_label(aig, root, leaves)
}
