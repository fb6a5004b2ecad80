//! Cut rewriting against the precomputed NPN library.

use std::fmt::{self, Display, Formatter};
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::trace;

use relic_aig::{Aig, Edge, NodeId, refs};

use crate::cuts::{Cut, CutEngine, CutParams, cuts_of_width};
use crate::dec::DecGraph;
use crate::npn::{NpnCanon, RewriteLibrary};

#[derive(Debug, Default, Clone)]
pub struct RewriteStats {
    pub considered: usize,
    pub rewritten: usize,
    pub gained: usize,
    pub cuts_good: usize,
    pub cuts_bad: usize,
}

impl Display for RewriteStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rewriting statistics:")?;
        writeln!(f, "Nodes considered  = {:8}.", self.considered)?;
        writeln!(f, "Nodes rewritten   = {:8}.", self.rewritten)?;
        writeln!(f, "Cuts matched      = {:8}.", self.cuts_good)?;
        writeln!(f, "Cuts stale        = {:8}.", self.cuts_bad)?;
        write!(f, "Gain              = {:8}.", self.gained)
    }
}

/// How often a class was chosen and what it paid off, for the
/// very-verbose score report.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClassScore {
    pub uses: usize,
    pub gain: i64,
}

#[derive(Debug, Clone)]
pub struct RewriteOutcome {
    pub graph: DecGraph,
    /// Cut leaves permuted and phased into the candidate's input order.
    pub leaves: Vec<Edge>,
    /// Output complement from the NPN phase.
    pub complement: bool,
    pub gain: i32,
}

pub struct RewriteManager {
    library: Rc<RewriteLibrary>,
    canon: NpnCanon,
    cuts: CutEngine,
    scores: FxHashMap<u16, ClassScore>,
    pub stats: RewriteStats,
    pub last_gain: i32,
}

impl RewriteManager {
    pub fn new(library: Rc<RewriteLibrary>) -> Self {
        Self {
            library,
            canon: NpnCanon::new(),
            cuts: CutEngine::new(CutParams::default()),
            scores: FxHashMap::default(),
            stats: RewriteStats::default(),
            last_gain: -1,
        }
    }

    /// Per-class usage scores, improving classes only, best first.
    pub fn class_scores(&self) -> Vec<(u16, ClassScore)> {
        let mut scores: Vec<_> = self.scores.iter().map(|(&c, &s)| (c, s)).collect();
        scores.sort_by_key(|(_, s)| std::cmp::Reverse(s.gain));
        scores
    }

    pub fn clear_scores(&mut self) {
        self.scores.clear();
    }

    /// Drops memoized cut lists (at pass boundaries).
    pub fn reset_cuts(&mut self) {
        self.cuts.clear();
    }

    /// Evaluates all 4-feasible cuts of `node` against the library and
    /// keeps the best strictly-improving candidate. `use_zeros` only
    /// affects acceptance bookkeeping; the proposal itself is returned
    /// whenever some candidate fits the budgets. Never mutates the
    /// network.
    pub fn node_rewrite(
        &mut self,
        aig: &mut Aig,
        node: NodeId,
        required: u32,
        use_zeros: bool,
    ) -> Option<RewriteOutcome> {
        self.stats.considered += 1;
        self.last_gain = -1;
        let cuts: Vec<Cut> = self.cuts.node_cuts(aig, node).to_vec();
        let mut best: Option<RewriteOutcome> = None;
        let mut best_class = 0u16;

        for cut in cuts_of_width(&cuts, 4) {
            let npn = self.canon.canon(cut.truth);

            // Permute and phase the cut leaves into candidate input
            // order; a deleted leaf makes the whole cut stale.
            let mut leaves = Vec::with_capacity(4);
            let mut stale = false;
            for i in 0..4 {
                let leaf = cut.leaves[npn.perm[i] as usize];
                if aig.is_removed(leaf) {
                    stale = true;
                    break;
                }
                leaves.push(Edge::new(leaf, npn.phase & (1 << i) != 0));
            }
            if stale {
                self.stats.cuts_bad += 1;
                continue;
            }
            self.stats.cuts_good += 1;

            // Cuts whose fanins mostly feed nothing else trigger fragile
            // cascading deletions; skip them.
            let single_fanout = leaves
                .iter()
                .filter(|e| aig.node(e.node()).refs() == 1)
                .count();
            if single_fanout > 2 {
                continue;
            }

            let leaf_nodes: Vec<NodeId> = leaves.iter().map(|e| e.node()).collect();
            aig.increment_trav_id();
            let saved = refs::mffc_label(aig, node, &leaf_nodes);

            for entry in self.library.candidates(npn.canonical) {
                let Some(added) = entry.graph.eval(aig, &leaves, saved, required) else {
                    continue;
                };
                debug_assert!(added <= saved);
                let gain = saved as i32 - added as i32;
                if best.as_ref().is_none_or(|b| b.gain < gain) {
                    best = Some(RewriteOutcome {
                        graph: entry.graph.clone(),
                        leaves: leaves.clone(),
                        complement: npn.phase & 0x10 != 0,
                        gain,
                    });
                    best_class = npn.canonical;
                }
            }
        }

        let best = best?;
        self.last_gain = best.gain;
        if best.gain > 0 || use_zeros {
            self.stats.rewritten += 1;
        }
        if best.gain > 0 {
            self.stats.gained += best.gain as usize;
            let score = self.scores.entry(best_class).or_default();
            score.uses += 1;
            score.gain += best.gain as i64;
        }
        trace!(node, gain = best.gain, "rewrite candidate");
        Some(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relic_aig::{Aig, LEVEL_INFINITY};

    static LIBRARY: std::sync::LazyLock<RewriteLibrary> =
        std::sync::LazyLock::new(|| RewriteLibrary::bootstrap(1500));

    fn manager() -> RewriteManager {
        RewriteManager::new(Rc::new(LIBRARY.clone()))
    }

    /// Or-of-ands with all four inputs distinct: the library's best
    /// candidate has the same three nodes, so the gain is zero.
    #[test]
    fn or_of_ands_rewrites_at_zero_gain() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let c = aig.add_input();
        let d = aig.add_input();
        let ab = aig.and(a, b);
        let cd = aig.and(c, d);
        let top = aig.and(!ab, !cd);
        aig.add_output(!top);
        // Keep most cut leaves multi-fanout so the fragile-cut filter
        // does not reject the 4-cut.
        aig.add_output(a);
        aig.add_output(b);
        aig.add_output(c);
        let mut mgr = manager();
        let outcome = mgr
            .node_rewrite(&mut aig, top.node(), LEVEL_INFINITY, true)
            .expect("library covers the class");
        assert_eq!(outcome.gain, 0);
        assert_eq!(mgr.last_gain, 0);
    }

    /// A redundantly structured function: shared-input products collapse
    /// through a smaller candidate.
    #[test]
    fn shared_inputs_yield_positive_gain() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let c = aig.add_input();
        let d = aig.add_input();
        // f = (a & b) & (c | d) built wastefully as (a&b&c) | (a&b&d).
        let ab = aig.and(a, b);
        let abc = aig.and(ab, c);
        let abd = aig.and(ab, d);
        let top = aig.and(!abc, !abd);
        aig.add_output(!top);
        aig.add_output(a);
        aig.add_output(b);
        aig.add_output(c);
        let mut mgr = manager();
        let outcome = mgr
            .node_rewrite(&mut aig, top.node(), LEVEL_INFINITY, false)
            .expect("candidate found");
        assert!(outcome.gain >= 1, "gain {}", outcome.gain);
    }

    #[test]
    fn no_gain_without_four_cut() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let ab = aig.and(a, b);
        aig.add_output(ab);
        let mut mgr = manager();
        assert!(
            mgr.node_rewrite(&mut aig, ab.node(), LEVEL_INFINITY, true)
                .is_none()
        );
        assert_eq!(mgr.last_gain, -1);
    }
}
