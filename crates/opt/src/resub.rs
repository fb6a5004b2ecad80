//! Boolean resubstitution: re-express a node's MFFC over existing
//! divisors, guided by exhaustive bit-parallel simulation under a care
//! set.
//!
//! All checks run in the simulator's normalized space (row bit 0 clear,
//! complement recorded in the node phase); proposal builders reapply the
//! phases. Every Boolean test has the form
//! `((candidate ^ target) & care) == 0` over all words.

use std::fmt::{self, Display, Formatter};

use smallvec::SmallVec;

use relic_aig::{Aig, Edge, NodeId, refs};

use crate::dec::{DecEdge, DecGraph};
use crate::sim::{SimTable, truth_words};

pub const SINGLE_DIVS_MAX: usize = 150;
pub const DOUBLE_DIVS_MAX: usize = 500;

type Words = SmallVec<[u64; 4]>;

#[derive(Debug, Clone, Copy)]
pub struct ResubParams {
    /// Reconvergence-driven cut limit.
    pub cut_max: usize,
    /// Total single divisors considered per cone.
    pub divs_max: usize,
}

impl Default for ResubParams {
    fn default() -> Self {
        Self {
            cut_max: 8,
            divs_max: SINGLE_DIVS_MAX,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ResubStats {
    pub used_const: usize,
    pub used_equal: usize,
    pub used_single_or: usize,
    pub used_single_and: usize,
    pub used_triple_or: usize,
    pub used_triple_and: usize,
    pub used_or_and: usize,
    pub used_and_or: usize,
    pub used_quad: usize,
    pub total_divs: usize,
    pub total_leaves: usize,
    pub total_gain: usize,
}

impl ResubStats {
    pub fn used_total(&self) -> usize {
        self.used_const
            + self.used_equal
            + self.used_single_or
            + self.used_single_and
            + self.used_triple_or
            + self.used_triple_and
            + self.used_or_and
            + self.used_and_or
            + self.used_quad
    }
}

impl Display for ResubStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Used constants    = {:6}.", self.used_const)?;
        writeln!(f, "Used replacements = {:6}.", self.used_equal)?;
        writeln!(f, "Used single ORs   = {:6}.", self.used_single_or)?;
        writeln!(f, "Used single ANDs  = {:6}.", self.used_single_and)?;
        writeln!(f, "Used double ORs   = {:6}.", self.used_triple_or)?;
        writeln!(f, "Used double ANDs  = {:6}.", self.used_triple_and)?;
        writeln!(f, "Used OR-AND       = {:6}.", self.used_or_and)?;
        writeln!(f, "Used AND-OR       = {:6}.", self.used_and_or)?;
        writeln!(f, "Used OR-2ANDs     = {:6}.", self.used_quad)?;
        writeln!(f, "TOTAL             = {:6}.", self.used_total())?;
        writeln!(f, "Total leaves   = {:8}.", self.total_leaves)?;
        write!(f, "Total divisors = {:8}.", self.total_divs)
    }
}

#[derive(Debug)]
pub struct ResubManager {
    params: ResubParams,
    sim: SimTable,
    care: Vec<u64>,
    divs: Vec<NodeId>,
    mffc: Vec<NodeId>,
    n_divs: usize,
    divs1_up: Vec<Edge>,
    divs1_un: Vec<Edge>,
    divs1_b: Vec<NodeId>,
    divs2_up: Vec<(Edge, Edge)>,
    divs2_un: Vec<(Edge, Edge)>,
    pub stats: ResubStats,
    pub last_gain: i32,
}

impl ResubManager {
    pub fn new(params: ResubParams) -> Self {
        let words = truth_words(params.cut_max);
        Self {
            sim: SimTable::new(params.cut_max, params.divs_max),
            care: vec![u64::MAX; words],
            divs: Vec::new(),
            mffc: Vec::new(),
            n_divs: 0,
            divs1_up: Vec::new(),
            divs1_un: Vec::new(),
            divs1_b: Vec::new(),
            divs2_up: Vec::new(),
            divs2_un: Vec::new(),
            stats: ResubStats::default(),
            last_gain: -1,
            params,
        }
    }

    pub fn params(&self) -> ResubParams {
        self.params
    }

    /// Care-set words for the external oracle to fill; reset to all-ones
    /// before each node when no oracle runs.
    pub fn care_mut(&mut self) -> &mut [u64] {
        &mut self.care
    }

    pub fn reset_care(&mut self) {
        self.care.fill(u64::MAX);
    }

    /// Tries to re-express `root` over divisors of the given cut. On
    /// success returns the proposal and the edges its leaf pins bind to;
    /// `last_gain` holds the gain (or −1). Never mutates the network.
    pub fn eval(
        &mut self,
        aig: &mut Aig,
        root: NodeId,
        leaves: &[NodeId],
        steps: usize,
        required: u32,
    ) -> Option<(DecGraph, Vec<Edge>)> {
        debug_assert!(steps <= 3);
        self.last_gain = -1;
        let mffc_size = refs::mffc_collect(aig, root, leaves, &mut self.mffc);
        debug_assert!(mffc_size > 0);
        if !self.collect_divs(aig, root, leaves, required) {
            return None;
        }
        self.stats.total_divs += self.n_divs;
        self.stats.total_leaves += leaves.len();
        self.sim.simulate(aig, &self.divs, leaves.len());
        let result = self.search(aig, root, steps, required, mffc_size);
        self.sim.cleanup(aig, &self.divs);
        if let Some(gain) = result.as_ref().map(|_| self.last_gain) {
            self.stats.total_gain += gain as usize;
        }
        result
    }

    // ------------------------------------------------------------------
    // Divisor collection
    // ------------------------------------------------------------------

    fn collect_divs(
        &mut self,
        aig: &mut Aig,
        root: NodeId,
        leaves: &[NodeId],
        required: u32,
    ) -> bool {
        self.divs.clear();
        aig.increment_trav_id();
        for &leaf in leaves {
            self.divs.push(leaf);
            aig.set_trav_current(leaf);
        }
        for &m in &self.mffc {
            aig.set_mark_a(m, true);
        }
        collect_cone_rec(aig, root, &mut self.divs);
        for &m in &self.mffc {
            aig.set_mark_a(m, false);
        }

        let capacity = self.sim.internal_capacity();
        let base = self.divs.len() - leaves.len() + self.mffc.len();
        if base >= capacity {
            return false;
        }
        let limit = capacity - base;

        // Close over fanouts whose both fanins are already in the set.
        let mut added = 0;
        let mut i = 0;
        'outer: while i < self.divs.len() {
            let d = self.divs[i];
            i += 1;
            if aig.node(d).refs() > 100 {
                continue;
            }
            let fanouts: Vec<NodeId> = aig.node(d).fanouts().to_vec();
            for f in fanouts {
                let node = aig.node(f);
                if aig.is_trav_current(f) || !node.is_and() || node.level() > required {
                    continue;
                }
                let (f0, f1) = (node.fanin0().node(), node.fanin1().node());
                if !aig.is_trav_current(f0) || !aig.is_trav_current(f1) {
                    continue;
                }
                if f0 == root || f1 == root {
                    continue;
                }
                self.divs.push(f);
                aig.set_trav_current(f);
                added += 1;
                if added == limit {
                    break 'outer;
                }
            }
        }

        self.n_divs = self.divs.len();
        self.divs.extend(self.mffc.iter().copied());
        debug_assert_eq!(self.divs.last().copied(), Some(root));
        true
    }

    // ------------------------------------------------------------------
    // Search ladder
    // ------------------------------------------------------------------

    fn search(
        &mut self,
        aig: &Aig,
        root: NodeId,
        steps: usize,
        required: u32,
        mffc: usize,
    ) -> Option<(DecGraph, Vec<Edge>)> {
        let target = self.row_of(aig, root);

        // Constant under the care set.
        if self.zero_under_care(&target) {
            self.stats.used_const += 1;
            self.last_gain = mffc as i32;
            return Some((DecGraph::constant(aig.node(root).phase()), Vec::new()));
        }

        // A divisor equal to the target.
        for i in 0..self.n_divs {
            let d = self.divs[i];
            if self.rows_equal(&target, &self.row_of(aig, d)) {
                self.stats.used_equal += 1;
                self.last_gain = mffc as i32;
                return Some(quit0(aig, root, d));
            }
        }
        if steps == 0 || mffc == 1 {
            return None;
        }

        self.classify_singles(aig, &target, required);

        if let Some(found) = self.try_single(aig, root, &target) {
            self.last_gain = mffc as i32 - 1;
            return Some(found);
        }
        if steps == 1 || mffc == 2 {
            return None;
        }

        if let Some(found) = self.try_triple(aig, root, &target) {
            self.last_gain = mffc as i32 - 2;
            return Some(found);
        }

        self.classify_doubles(aig, &target, required);

        if let Some(found) = self.try_pair_combo(aig, root, &target) {
            self.last_gain = mffc as i32 - 2;
            return Some(found);
        }
        if steps == 2 || mffc == 3 {
            return None;
        }

        if let Some(found) = self.try_quad(aig, root, &target) {
            self.last_gain = mffc as i32 - 3;
            return Some(found);
        }
        None
    }

    fn row_of(&self, aig: &Aig, id: NodeId) -> Words {
        SmallVec::from_slice(self.sim.node_row(aig, id))
    }

    fn edge_row(&self, aig: &Aig, e: Edge) -> Words {
        self.row_of(aig, e.node())
    }

    fn zero_under_care(&self, row: &[u64]) -> bool {
        row.iter()
            .zip(&self.care)
            .all(|(&r, &c)| r & c == 0)
    }

    fn rows_equal(&self, a: &[u64], b: &[u64]) -> bool {
        a.iter()
            .zip(b)
            .zip(&self.care)
            .all(|((&a, &b), &c)| (a ^ b) & c == 0)
    }

    /// Splits the divisors into positive-unate, negative-unate and binate
    /// sets under care-set containment, including complemented entries.
    fn classify_singles(&mut self, aig: &Aig, target: &[u64], required: u32) {
        self.divs1_up.clear();
        self.divs1_un.clear();
        self.divs1_b.clear();
        for i in 0..self.n_divs {
            let d = self.divs[i];
            if aig.level(d) > required.saturating_sub(1) {
                continue;
            }
            let row = self.row_of(aig, d);
            let all = |f: &dyn Fn(u64, u64) -> u64| {
                row.iter()
                    .zip(target)
                    .zip(&self.care)
                    .all(|((&r, &t), &c)| f(r, t) & c == 0)
            };
            if all(&|r, t| r & !t) {
                self.divs1_up.push(Edge::regular(d));
            } else if all(&|r, t| !r & !t) {
                self.divs1_up.push(!Edge::regular(d));
            } else if all(&|r, t| !r & t) {
                self.divs1_un.push(Edge::regular(d));
            } else if all(&|r, t| r & t) {
                self.divs1_un.push(!Edge::regular(d));
            } else {
                self.divs1_b.push(d);
            }
        }
    }

    /// Two-input OR over positive-unate or AND over negative-unate
    /// divisors.
    fn try_single(&mut self, aig: &Aig, root: NodeId, target: &[u64]) -> Option<(DecGraph, Vec<Edge>)> {
        for i in 0..self.divs1_up.len() {
            let e0 = self.divs1_up[i];
            let r0 = self.edge_row(aig, e0);
            for k in i + 1..self.divs1_up.len() {
                let e1 = self.divs1_up[k];
                let r1 = self.edge_row(aig, e1);
                if self.expr_matches(target, |w| {
                    apply(r0[w], e0) | apply(r1[w], e1)
                }) {
                    self.stats.used_single_or += 1;
                    return Some(quit1(aig, root, e0, e1, true));
                }
            }
        }
        for i in 0..self.divs1_un.len() {
            let e0 = self.divs1_un[i];
            let r0 = self.edge_row(aig, e0);
            for k in i + 1..self.divs1_un.len() {
                let e1 = self.divs1_un[k];
                let r1 = self.edge_row(aig, e1);
                if self.expr_matches(target, |w| {
                    apply(r0[w], e0) & apply(r1[w], e1)
                }) {
                    self.stats.used_single_and += 1;
                    return Some(quit1(aig, root, e0, e1, false));
                }
            }
        }
        None
    }

    /// Three-input OR/AND over unate divisors. Only triples with a unique
    /// latest-arriving input are taken; that input feeds the top gate.
    fn try_triple(&mut self, aig: &Aig, root: NodeId, target: &[u64]) -> Option<(DecGraph, Vec<Edge>)> {
        for or_gate in [true, false] {
            let list = if or_gate { &self.divs1_up } else { &self.divs1_un };
            for i in 0..list.len() {
                let e0 = list[i];
                let r0 = self.edge_row(aig, e0);
                for k in i + 1..list.len() {
                    let e1 = list[k];
                    let r1 = self.edge_row(aig, e1);
                    for j in k + 1..list.len() {
                        let e2 = list[j];
                        let r2 = self.edge_row(aig, e2);
                        let matched = if or_gate {
                            self.expr_matches(target, |w| {
                                apply(r0[w], e0) | apply(r1[w], e1) | apply(r2[w], e2)
                            })
                        } else {
                            self.expr_matches(target, |w| {
                                apply(r0[w], e0) & apply(r1[w], e1) & apply(r2[w], e2)
                            })
                        };
                        if !matched {
                            continue;
                        }
                        let levels = [e0, e1, e2].map(|e| aig.level(e.node()));
                        let level_max = levels.into_iter().max().unwrap();
                        let at_max = levels.iter().filter(|&&l| l == level_max).count();
                        if at_max != 1 {
                            continue;
                        }
                        let (max, min0, min1) = if levels[0] == level_max {
                            (e0, e1, e2)
                        } else if levels[1] == level_max {
                            (e1, e0, e2)
                        } else {
                            (e2, e0, e1)
                        };
                        if or_gate {
                            self.stats.used_triple_or += 1;
                        } else {
                            self.stats.used_triple_and += 1;
                        }
                        return Some(quit21(aig, root, min0, min1, max, or_gate));
                    }
                }
            }
        }
        None
    }

    /// Derives the double-divisor pools: AND/OR combinations of binate
    /// pairs that are unate for the target, capped per polarity.
    fn classify_doubles(&mut self, aig: &Aig, target: &[u64], required: u32) {
        self.divs2_up.clear();
        self.divs2_un.clear();
        for i in 0..self.divs1_b.len() {
            let d0 = self.divs1_b[i];
            if aig.level(d0) > required.saturating_sub(2) {
                continue;
            }
            let r0 = self.row_of(aig, d0);
            for k in i + 1..self.divs1_b.len() {
                let d1 = self.divs1_b[k];
                if aig.level(d1) > required.saturating_sub(2) {
                    continue;
                }
                let r1 = self.row_of(aig, d1);
                let (e0, e1) = (Edge::regular(d0), Edge::regular(d1));
                if self.divs2_up.len() < DOUBLE_DIVS_MAX {
                    let checks: [((Edge, Edge), &dyn Fn(u64, u64) -> u64); 4] = [
                        ((e0, e1), &|a, b| a & b),
                        ((!e0, e1), &|a, b| !a & b),
                        ((e0, !e1), &|a, b| a & !b),
                        ((!e0, !e1), &|a, b| a | b),
                    ];
                    for (pair, f) in checks {
                        let ok = r0
                            .iter()
                            .zip(&r1)
                            .zip(target)
                            .zip(&self.care)
                            .all(|(((&a, &b), &t), &c)| f(a, b) & !t & c == 0);
                        if ok {
                            self.divs2_up.push(pair);
                        }
                    }
                }
                if self.divs2_un.len() < DOUBLE_DIVS_MAX {
                    let checks: [((Edge, Edge), &dyn Fn(u64, u64) -> u64); 4] = [
                        ((e0, e1), &|a, b| a & b),
                        ((!e0, e1), &|a, b| !a & b),
                        ((e0, !e1), &|a, b| a & !b),
                        ((!e0, !e1), &|a, b| a | b),
                    ];
                    for (pair, f) in checks {
                        let ok = r0
                            .iter()
                            .zip(&r1)
                            .zip(target)
                            .zip(&self.care)
                            .all(|(((&a, &b), &t), &c)| !f(a, b) & t & c == 0);
                        if ok {
                            self.divs2_un.push(pair);
                        }
                    }
                }
            }
        }
    }

    /// One single-unate divisor combined with one double divisor:
    /// OR-AND for the positive side, AND-OR for the negative side.
    fn try_pair_combo(
        &mut self,
        aig: &Aig,
        root: NodeId,
        target: &[u64],
    ) -> Option<(DecGraph, Vec<Edge>)> {
        for i in 0..self.divs1_up.len() {
            let e0 = self.divs1_up[i];
            let r0 = self.edge_row(aig, e0);
            for k in 0..self.divs2_up.len() {
                let (p0, p1) = self.divs2_up[k];
                let q0 = self.edge_row(aig, p0);
                let q1 = self.edge_row(aig, p1);
                if self.expr_matches(target, |w| {
                    apply(r0[w], e0) | pair_value(q0[w], q1[w], p0, p1)
                }) {
                    self.stats.used_or_and += 1;
                    return Some(quit2(aig, root, e0, p0, p1, true));
                }
            }
        }
        for i in 0..self.divs1_un.len() {
            let e0 = self.divs1_un[i];
            let r0 = self.edge_row(aig, e0);
            for k in 0..self.divs2_un.len() {
                let (p0, p1) = self.divs2_un[k];
                let q0 = self.edge_row(aig, p0);
                let q1 = self.edge_row(aig, p1);
                if self.expr_matches(target, |w| {
                    apply(r0[w], e0) & pair_value(q0[w], q1[w], p0, p1)
                }) {
                    self.stats.used_and_or += 1;
                    return Some(quit2(aig, root, e0, p0, p1, false));
                }
            }
        }
        None
    }

    /// OR of two double divisors, all sixteen polarity combinations
    /// (through the pair encodings). The AND-of-ORs mirror stays
    /// disabled, matching the engine this is modeled on.
    fn try_quad(&mut self, aig: &Aig, root: NodeId, target: &[u64]) -> Option<(DecGraph, Vec<Edge>)> {
        for i in 0..self.divs2_up.len() {
            let (a0, a1) = self.divs2_up[i];
            let ra0 = self.edge_row(aig, a0);
            let ra1 = self.edge_row(aig, a1);
            for k in i + 1..self.divs2_up.len() {
                let (b0, b1) = self.divs2_up[k];
                let rb0 = self.edge_row(aig, b0);
                let rb1 = self.edge_row(aig, b1);
                if self.expr_matches(target, |w| {
                    pair_value(ra0[w], ra1[w], a0, a1) | pair_value(rb0[w], rb1[w], b0, b1)
                }) {
                    self.stats.used_quad += 1;
                    return Some(quit3(aig, root, a0, a1, b0, b1));
                }
            }
        }
        None
    }

    fn expr_matches(&self, target: &[u64], f: impl Fn(usize) -> u64) -> bool {
        (0..target.len()).all(|w| (f(w) ^ target[w]) & self.care[w] == 0)
    }
}

fn collect_cone_rec(aig: &mut Aig, id: NodeId, out: &mut Vec<NodeId>) {
    if aig.is_trav_current(id) {
        return;
    }
    aig.set_trav_current(id);
    debug_assert!(aig.node(id).is_and());
    collect_cone_rec(aig, aig.node(id).fanin0().node(), out);
    collect_cone_rec(aig, aig.node(id).fanin1().node(), out);
    if !aig.mark_a(id) {
        out.push(id);
    }
}

fn apply(word: u64, e: Edge) -> u64 {
    if e.is_complement() { !word } else { word }
}

/// Value of a double divisor: both-complemented pairs encode the OR of
/// the regular rows, anything else the AND of the signed rows.
fn pair_value(w0: u64, w1: u64, e0: Edge, e1: Edge) -> u64 {
    if e0.is_complement() && e1.is_complement() {
        w0 | w1
    } else {
        apply(w0, e0) & apply(w1, e1)
    }
}

// ----------------------------------------------------------------------
// Proposal builders. Leaf pins bind to the regular divisor nodes; the
// normalization phases and list polarities move into the graph edges.
// ----------------------------------------------------------------------

fn literal(graph: &mut DecGraph, pin: usize, aig: &Aig, e: Edge) -> DecEdge {
    let leaf = graph.leaf(pin);
    if aig.node(e.node()).phase() ^ e.is_complement() {
        !leaf
    } else {
        leaf
    }
}

fn phase_literal(graph: &mut DecGraph, pin: usize, aig: &Aig, e: Edge) -> DecEdge {
    let leaf = graph.leaf(pin);
    if aig.node(e.node()).phase() { !leaf } else { leaf }
}

fn finish(mut graph: DecGraph, aig: &Aig, root: NodeId, bindings: Vec<Edge>) -> (DecGraph, Vec<Edge>) {
    if aig.node(root).phase() {
        graph.complement();
    }
    (graph, bindings)
}

fn quit0(aig: &Aig, root: NodeId, div: NodeId) -> (DecGraph, Vec<Edge>) {
    let mut graph = DecGraph::with_leaves(1);
    let e = literal(&mut graph, 0, aig, Edge::regular(div));
    graph.set_root(e);
    finish(graph, aig, root, vec![Edge::regular(div)])
}

fn quit1(aig: &Aig, root: NodeId, e0: Edge, e1: Edge, or_gate: bool) -> (DecGraph, Vec<Edge>) {
    debug_assert_ne!(e0.node(), e1.node());
    let mut graph = DecGraph::with_leaves(2);
    let n0 = literal(&mut graph, 0, aig, e0);
    let n1 = literal(&mut graph, 1, aig, e1);
    let top = if or_gate {
        graph.add_or(n0, n1)
    } else {
        graph.add_and(n0, n1)
    };
    graph.set_root(top);
    finish(graph, aig, root, vec![
        Edge::regular(e0.node()),
        Edge::regular(e1.node()),
    ])
}

fn quit21(
    aig: &Aig,
    root: NodeId,
    min0: Edge,
    min1: Edge,
    max: Edge,
    or_gate: bool,
) -> (DecGraph, Vec<Edge>) {
    let mut graph = DecGraph::with_leaves(3);
    let n0 = literal(&mut graph, 0, aig, min0);
    let n1 = literal(&mut graph, 1, aig, min1);
    let n2 = literal(&mut graph, 2, aig, max);
    let top = if or_gate {
        let inner = graph.add_or(n0, n1);
        graph.add_or(n2, inner)
    } else {
        let inner = graph.add_and(n0, n1);
        graph.add_and(n2, inner)
    };
    graph.set_root(top);
    finish(graph, aig, root, vec![
        Edge::regular(min0.node()),
        Edge::regular(min1.node()),
        Edge::regular(max.node()),
    ])
}

fn pair_subgraph(graph: &mut DecGraph, aig: &Aig, pin0: usize, pin1: usize, e0: Edge, e1: Edge) -> DecEdge {
    if e0.is_complement() && e1.is_complement() {
        let n0 = phase_literal(graph, pin0, aig, e0);
        let n1 = phase_literal(graph, pin1, aig, e1);
        graph.add_or(n0, n1)
    } else {
        let n0 = literal(graph, pin0, aig, e0);
        let n1 = literal(graph, pin1, aig, e1);
        graph.add_and(n0, n1)
    }
}

fn quit2(
    aig: &Aig,
    root: NodeId,
    single: Edge,
    p0: Edge,
    p1: Edge,
    or_gate: bool,
) -> (DecGraph, Vec<Edge>) {
    let mut graph = DecGraph::with_leaves(3);
    let n0 = literal(&mut graph, 0, aig, single);
    let inner = pair_subgraph(&mut graph, aig, 1, 2, p0, p1);
    let top = if or_gate {
        graph.add_or(n0, inner)
    } else {
        graph.add_and(n0, inner)
    };
    graph.set_root(top);
    finish(graph, aig, root, vec![
        Edge::regular(single.node()),
        Edge::regular(p0.node()),
        Edge::regular(p1.node()),
    ])
}

fn quit3(aig: &Aig, root: NodeId, a0: Edge, a1: Edge, b0: Edge, b1: Edge) -> (DecGraph, Vec<Edge>) {
    debug_assert_ne!(a0.node(), a1.node());
    debug_assert_ne!(b0.node(), b1.node());
    let mut graph = DecGraph::with_leaves(4);
    let left = pair_subgraph(&mut graph, aig, 0, 1, a0, a1);
    let right = pair_subgraph(&mut graph, aig, 2, 3, b0, b1);
    let top = graph.add_or(left, right);
    graph.set_root(top);
    finish(graph, aig, root, vec![
        Edge::regular(a0.node()),
        Edge::regular(a1.node()),
        Edge::regular(b0.node()),
        Edge::regular(b1.node()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cuts::reconv_cut;
    use relic_aig::{Aig, LEVEL_INFINITY};

    fn run(aig: &mut Aig, mgr: &mut ResubManager, root: NodeId, steps: usize) -> Option<(DecGraph, Vec<Edge>)> {
        let leaves = reconv_cut(aig, root, mgr.params().cut_max);
        mgr.reset_care();
        mgr.eval(aig, root, &leaves, steps, LEVEL_INFINITY)
    }

    #[test]
    fn zero_step_equal_divisor() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let d = aig.and(a, b);
        let n = aig.and(d, a); // n == d
        aig.add_output(d);
        aig.add_output(n);
        let mut mgr = ResubManager::new(ResubParams::default());
        let (graph, bindings) = run(&mut aig, &mut mgr, n.node(), 1).expect("equal divisor");
        assert_eq!(mgr.last_gain, 1);
        assert_eq!(mgr.stats.used_equal, 1);
        assert_eq!(bindings, vec![Edge::regular(d.node())]);
        // The proposal realizes d itself.
        let edge = graph.materialize(&mut aig, &bindings);
        assert_eq!(edge, d);
    }

    #[test]
    fn one_step_or_of_divisors() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let c = aig.add_input();
        let d1 = aig.and(a, b);
        let d2 = aig.and(a, c);
        aig.add_output(d1);
        aig.add_output(d2);
        // r = a & (b | c), structured through u = !b & !c.
        let u = aig.and(!b, !c);
        let r = aig.and(a, !u);
        aig.add_output(r);
        let mut mgr = ResubManager::new(ResubParams::default());
        let (graph, bindings) = run(&mut aig, &mut mgr, r.node(), 1).expect("or resub");
        assert_eq!(mgr.last_gain, 1);
        assert_eq!(mgr.stats.used_single_or, 1);
        // The proposal is d1 | d2, functionally equal to r.
        let before = relic_aig::check::output_signatures(&aig, 3);
        let edge = graph.materialize(&mut aig, &bindings);
        aig.replace(r.node(), edge);
        assert_eq!(relic_aig::check::output_signatures(&aig, 3), before);
    }

    #[test]
    fn one_step_and_of_divisors() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let c = aig.add_input();
        // The divisors read as a|b and a|c through their complements.
        let q1 = aig.and(!a, !b);
        let q2 = aig.and(!a, !c);
        aig.add_output(!q1);
        aig.add_output(!q2);
        // m = !(a | (b & c)) = !q1 & !q2 complemented, built independently.
        let u = aig.and(b, c);
        let m = aig.and(!a, !u);
        aig.add_output(!m);
        let mut mgr = ResubManager::new(ResubParams::default());
        let (graph, bindings) = run(&mut aig, &mut mgr, m.node(), 1).expect("and resub");
        assert_eq!(mgr.last_gain, 1);
        assert_eq!(mgr.stats.used_single_and, 1);
        let before = relic_aig::check::output_signatures(&aig, 19);
        let edge = graph.materialize(&mut aig, &bindings);
        aig.replace(m.node(), edge);
        assert_eq!(relic_aig::check::output_signatures(&aig, 19), before);
    }

    #[test]
    fn const_under_restricted_care() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let c = aig.add_input();
        let u = aig.and(a, b);
        let r = aig.and(u, c);
        aig.add_output(r);
        let mut mgr = ResubManager::new(ResubParams::default());
        let leaves = reconv_cut(&mut aig, r.node(), 8);
        // Only assignments where the root is 0 are observable.
        mgr.reset_care();
        for w in mgr.care_mut() {
            *w = !0x8080_8080_8080_8080u64;
        }
        let (graph, _) = mgr
            .eval(&mut aig, r.node(), &leaves, 1, LEVEL_INFINITY)
            .expect("const resub");
        assert!(graph.is_const());
        assert_eq!(mgr.stats.used_const, 1);
        assert_eq!(mgr.last_gain, 2);
    }

    #[test]
    fn triple_or_prefers_unique_latest_input() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let c = aig.add_input();
        let e = aig.add_input();
        let f = aig.add_input();
        let ef = aig.and(e, f);
        let d1 = aig.and(a, b);
        let d2 = aig.and(a, c);
        let d3 = aig.and(a, ef);
        aig.add_output(d1);
        aig.add_output(d2);
        aig.add_output(d3);
        aig.add_output(ef);
        // r = a & (b | c | ef) through two internal nodes.
        let u1 = aig.and(!b, !c);
        let u2 = aig.and(u1, !ef);
        let r = aig.and(a, !u2);
        aig.add_output(r);
        let mut mgr = ResubManager::new(ResubParams::default());
        let (graph, bindings) = run(&mut aig, &mut mgr, r.node(), 2).expect("triple resub");
        assert_eq!(mgr.stats.used_triple_or, 1);
        assert_eq!(mgr.last_gain, 1);
        // The latest-arriving divisor d3 feeds the top gate: it binds the
        // last leaf pin.
        assert_eq!(bindings.last().copied(), Some(Edge::regular(d3.node())));
        let before = relic_aig::check::output_signatures(&aig, 11);
        let edge = graph.materialize(&mut aig, &bindings);
        aig.replace(r.node(), edge);
        assert_eq!(relic_aig::check::output_signatures(&aig, 11), before);
    }

    #[test]
    fn or_and_with_double_divisor() {
        let mut aig = Aig::new();
        let e = aig.add_input();
        let a = aig.add_input();
        let b = aig.add_input();
        let u = aig.and(a, b);
        let v = aig.and(!e, !u);
        // z is functionally zero but structurally alive; it pads the MFFC.
        let z = aig.and(!a, u);
        let m = aig.and(v, !z);
        aig.add_output(m);
        let mut mgr = ResubManager::new(ResubParams::default());
        let (graph, bindings) = run(&mut aig, &mut mgr, m.node(), 2).expect("or-and resub");
        assert_eq!(mgr.stats.used_or_and, 1);
        assert_eq!(mgr.last_gain, 2);
        let before = relic_aig::check::output_signatures(&aig, 5);
        let edge = graph.materialize(&mut aig, &bindings);
        aig.replace(m.node(), edge);
        assert_eq!(relic_aig::check::output_signatures(&aig, 5), before);
    }

    #[test]
    fn quad_over_two_double_divisors() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let c = aig.add_input();
        let d = aig.add_input();
        let ab = aig.and(a, b);
        let cd = aig.and(c, d);
        let v = aig.and(!ab, !cd);
        let z = aig.and(!a, ab);
        let m = aig.and(v, !z);
        aig.add_output(m);
        let mut mgr = ResubManager::new(ResubParams::default());
        let (graph, bindings) = run(&mut aig, &mut mgr, m.node(), 3).expect("quad resub");
        assert_eq!(mgr.stats.used_quad, 1);
        assert_eq!(mgr.last_gain, 2);
        let before = relic_aig::check::output_signatures(&aig, 9);
        let edge = graph.materialize(&mut aig, &bindings);
        aig.replace(m.node(), edge);
        assert_eq!(relic_aig::check::output_signatures(&aig, 9), before);
    }

    #[test]
    fn restores_scratch_state() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let d = aig.and(a, b);
        let n = aig.and(d, a);
        aig.add_output(d);
        aig.add_output(n);
        let mut mgr = ResubManager::new(ResubParams::default());
        let _ = run(&mut aig, &mut mgr, n.node(), 1);
        for id in 0..aig.slot_count() as u32 {
            assert_eq!(aig.node(id).scratch(), relic_aig::SCRATCH_CLEAR);
            assert!(!aig.node(id).phase());
        }
    }
}
