//! k-feasible cut enumeration with truth tables.
//!
//! The cut set of an and-node is the trivial cut plus the pairwise merges
//! of its fanins' cut sets, filtered to at most `k` leaves, deduplicated,
//! pruned by dominance and capped per node. Cut lists are produced eagerly
//! into per-node vectors with an explicit work stack and memoized for the
//! duration of a pass; stale lists (mentioning since-deleted leaves) are
//! rejected by the consumer.

use either::Either;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use relic_aig::{Aig, NodeId};

use crate::dec::ELEMENTARY_TRUTHS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cut {
    /// Leaf ids, ascending.
    pub leaves: SmallVec<[NodeId; 4]>,
    /// Function of the root over the leaves, zero-padded to 4 variables.
    pub truth: u16,
    sign: u64,
}

impl Cut {
    fn trivial(node: NodeId) -> Self {
        Self {
            leaves: SmallVec::from_slice(&[node]),
            truth: ELEMENTARY_TRUTHS[0],
            sign: 1u64 << (node % 64),
        }
    }

    fn dominates(&self, other: &Cut) -> bool {
        self.sign & !other.sign == 0
            && self.leaves.len() <= other.leaves.len()
            && self.leaves.iter().all(|l| other.leaves.contains(l))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CutParams {
    pub k: usize,
    pub max_cuts: usize,
}

impl Default for CutParams {
    fn default() -> Self {
        Self { k: 4, max_cuts: 250 }
    }
}

#[derive(Debug, Default)]
pub struct CutEngine {
    params: CutParams,
    cuts: FxHashMap<NodeId, Vec<Cut>>,
}

impl CutEngine {
    pub fn new(params: CutParams) -> Self {
        Self {
            params,
            cuts: FxHashMap::default(),
        }
    }

    /// Drops all memoized cut lists (between passes).
    pub fn clear(&mut self) {
        self.cuts.clear();
    }

    pub fn node_cuts(&mut self, aig: &Aig, root: NodeId) -> &[Cut] {
        self.ensure(aig, root);
        &self.cuts[&root]
    }

    fn ensure(&mut self, aig: &Aig, root: NodeId) {
        let mut stack = vec![root];
        while let Some(&id) = stack.last() {
            if self.cuts.contains_key(&id) {
                stack.pop();
                continue;
            }
            let node = aig.node(id);
            if !node.is_and() {
                self.cuts.insert(id, vec![Cut::trivial(id)]);
                stack.pop();
                continue;
            }
            let (f0, f1) = (node.fanin0().node(), node.fanin1().node());
            let missing = [f0, f1]
                .into_iter()
                .filter(|f| !self.cuts.contains_key(f))
                .collect::<Vec<_>>();
            if !missing.is_empty() {
                stack.extend(missing);
                continue;
            }
            let merged = self.merge(aig, id);
            self.cuts.insert(id, merged);
            stack.pop();
        }
    }

    fn merge(&self, aig: &Aig, id: NodeId) -> Vec<Cut> {
        let node = aig.node(id);
        let (e0, e1) = (node.fanin0(), node.fanin1());
        let cuts0 = &self.cuts[&e0.node()];
        let cuts1 = &self.cuts[&e1.node()];
        let mut out = vec![Cut::trivial(id)];
        'outer: for c0 in cuts0 {
            for c1 in cuts1 {
                let Some(cut) = merge_pair(c0, c1, e0.is_complement(), e1.is_complement(), self.params.k)
                else {
                    continue;
                };
                if out.iter().any(|c| c.dominates(&cut)) {
                    continue;
                }
                out.retain(|c| !cut.dominates(c));
                out.push(cut);
                if out.len() >= self.params.max_cuts {
                    break 'outer;
                }
            }
        }
        out
    }
}

fn merge_pair(c0: &Cut, c1: &Cut, compl0: bool, compl1: bool, k: usize) -> Option<Cut> {
    let mut leaves: SmallVec<[NodeId; 4]> = SmallVec::new();
    let (mut i, mut j) = (0, 0);
    while i < c0.leaves.len() || j < c1.leaves.len() {
        let pick = match (c0.leaves.get(i), c1.leaves.get(j)) {
            (Some(&a), Some(&b)) => {
                if a == b {
                    i += 1;
                    j += 1;
                    a
                } else if a < b {
                    i += 1;
                    a
                } else {
                    j += 1;
                    b
                }
            }
            (Some(&a), None) => {
                i += 1;
                a
            }
            (None, Some(&b)) => {
                j += 1;
                b
            }
            (None, None) => unreachable!(),
        };
        if leaves.len() == k {
            return None;
        }
        leaves.push(pick);
    }
    let t0 = expand_truth(c0, &leaves);
    let t1 = expand_truth(c1, &leaves);
    let t0 = if compl0 { !t0 } else { t0 };
    let t1 = if compl1 { !t1 } else { t1 };
    let sign = leaves.iter().fold(0u64, |s, l| s | 1u64 << (l % 64));
    Some(Cut {
        leaves,
        truth: t0 & t1,
        sign,
    })
}

/// Re-expresses a cut's truth over a superset leaf ordering.
fn expand_truth(cut: &Cut, leaves: &[NodeId]) -> u16 {
    let positions: SmallVec<[u16; 4]> = cut
        .leaves
        .iter()
        .map(|l| leaves.iter().position(|x| x == l).expect("subset leaves") as u16)
        .collect();
    let mut out = 0u16;
    for m in 0..16u16 {
        let child_index = positions
            .iter()
            .enumerate()
            .fold(0u16, |acc, (j, &p)| acc | (((m >> p) & 1) << j));
        out |= ((cut.truth >> child_index) & 1) << m;
    }
    out
}

/// Iterates only cuts with exactly `width` leaves, keeping the engine's
/// ordering.
pub fn cuts_of_width(cuts: &[Cut], width: usize) -> impl Iterator<Item = &Cut> {
    if width == 0 {
        Either::Left(std::iter::empty())
    } else {
        Either::Right(cuts.iter().filter(move |c| c.leaves.len() == width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relic_aig::Aig;

    #[test]
    fn trivial_and_merged_cuts() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let x = aig.and(a, b);
        let mut engine = CutEngine::new(CutParams::default());
        let cuts = engine.node_cuts(&aig, x.node());
        // Trivial cut plus {a, b}.
        assert_eq!(cuts.len(), 2);
        assert_eq!(cuts[0].leaves.as_slice(), &[x.node()]);
        assert_eq!(cuts[1].leaves.as_slice(), &[a.node(), b.node()]);
        assert_eq!(cuts[1].truth, 0xAAAA & 0xCCCC);
    }

    #[test]
    fn truth_accounts_for_complements() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let x = aig.and(!a, b);
        let mut engine = CutEngine::new(CutParams::default());
        let cuts = engine.node_cuts(&aig, x.node());
        assert_eq!(cuts[1].truth, !0xAAAA & 0xCCCC);
    }

    #[test]
    fn four_input_cut_truth() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let c = aig.add_input();
        let d = aig.add_input();
        let ab = aig.and(a, b);
        let cd = aig.and(c, d);
        let top = aig.and(!ab, !cd);
        aig.add_output(!top);
        let mut engine = CutEngine::new(CutParams::default());
        let cuts = engine.node_cuts(&aig, top.node()).to_vec();
        let wanted = [a.node(), b.node(), c.node(), d.node()];
        let four = cuts
            .iter()
            .find(|cut| cut.leaves.as_slice() == &wanted[..])
            .expect("full 4-cut present");
        // top = !(a&b) & !(c&d); the or-of-ands appears complemented.
        let expected = !(0xAAAA & 0xCCCC) & !(0xF0F0 & 0xFF00);
        assert_eq!(four.truth, expected);
    }

    #[test]
    fn dominated_cuts_are_pruned() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let ab = aig.and(a, b);
        let top = aig.and(ab, b);
        let mut engine = CutEngine::new(CutParams::default());
        let cuts = engine.node_cuts(&aig, top.node());
        // {ab, b} is dominated by... nothing here, but no cut may contain
        // another cut's leaves as a subset.
        for (i, c1) in cuts.iter().enumerate() {
            for (j, c2) in cuts.iter().enumerate() {
                if i != j {
                    assert!(!c1.dominates(c2), "{c1:?} dominates {c2:?}");
                }
            }
        }
    }
}
