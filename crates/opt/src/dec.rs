//! Decomposition graphs: the output proposal of every transform.
//!
//! A decomposition graph is a small DAG over leaf pins, 2-input ANDs and
//! XORs with complement bits on the edges, plus a root edge that may be
//! complemented. Leaf pins are bound to concrete AIG edges only at
//! evaluation or commit time, so library graphs stay immutable and shared.

use std::ops::Not;

use relic_aig::{Aig, Edge};

pub const ELEMENTARY_TRUTHS: [u16; 4] = [0xAAAA, 0xCCCC, 0xF0F0, 0xFF00];

/// Reference to a decomposition-graph node with a complement bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecEdge(u32);

impl DecEdge {
    fn new(index: usize, complement: bool) -> Self {
        Self(((index as u32) << 1) | complement as u32)
    }

    fn index(self) -> usize {
        (self.0 >> 1) as usize
    }

    fn is_complement(self) -> bool {
        self.0 & 1 != 0
    }
}

impl Not for DecEdge {
    type Output = DecEdge;

    fn not(self) -> DecEdge {
        DecEdge(self.0 ^ 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecNode {
    /// Input pin; bound to an AIG edge by the caller.
    Leaf(u32),
    And(DecEdge, DecEdge),
    Xor(DecEdge, DecEdge),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Root {
    Const(bool),
    Edge(DecEdge),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecGraph {
    nodes: Vec<DecNode>,
    leaves: u32,
    root: Root,
}

impl Default for DecGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DecGraph {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            leaves: 0,
            root: Root::Const(false),
        }
    }

    pub fn constant(value: bool) -> Self {
        Self {
            nodes: Vec::new(),
            leaves: 0,
            root: Root::Const(value),
        }
    }

    /// A graph with `n` leaf pins and no internal nodes yet.
    pub fn with_leaves(n: usize) -> Self {
        let mut graph = Self::new();
        for _ in 0..n {
            graph.add_leaf();
        }
        graph
    }

    pub fn add_leaf(&mut self) -> DecEdge {
        let pin = self.leaves;
        self.leaves += 1;
        self.nodes.push(DecNode::Leaf(pin));
        DecEdge::new(self.nodes.len() - 1, false)
    }

    pub fn leaf(&self, pin: usize) -> DecEdge {
        let index = self
            .nodes
            .iter()
            .position(|n| matches!(n, DecNode::Leaf(p) if *p as usize == pin))
            .expect("leaf pin out of range");
        DecEdge::new(index, false)
    }

    pub fn add_and(&mut self, a: DecEdge, b: DecEdge) -> DecEdge {
        self.nodes.push(DecNode::And(a, b));
        DecEdge::new(self.nodes.len() - 1, false)
    }

    pub fn add_or(&mut self, a: DecEdge, b: DecEdge) -> DecEdge {
        !self.add_and(!a, !b)
    }

    pub fn add_xor(&mut self, a: DecEdge, b: DecEdge) -> DecEdge {
        self.nodes.push(DecNode::Xor(a, b));
        DecEdge::new(self.nodes.len() - 1, false)
    }

    pub fn set_root(&mut self, root: DecEdge) {
        self.root = Root::Edge(root);
    }

    pub fn complement(&mut self) {
        self.root = match self.root {
            Root::Const(value) => Root::Const(!value),
            Root::Edge(e) => Root::Edge(!e),
        };
    }

    pub fn is_const(&self) -> bool {
        matches!(self.root, Root::Const(_))
    }

    pub fn const_value(&self) -> Option<bool> {
        match self.root {
            Root::Const(value) => Some(value),
            Root::Edge(_) => None,
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves as usize
    }

    /// Cost in AIG nodes if nothing is reused; XORs expand to three ANDs.
    pub fn and_cost(&self) -> usize {
        self.nodes
            .iter()
            .map(|n| match n {
                DecNode::Leaf(_) => 0,
                DecNode::And(..) => 1,
                DecNode::Xor(..) => 3,
            })
            .sum()
    }

    /// Depth in AIG levels if nothing is reused.
    pub fn depth(&self) -> u32 {
        let mut levels = vec![0u32; self.nodes.len()];
        let mut out = 0;
        for (i, node) in self.nodes.iter().enumerate() {
            levels[i] = match node {
                DecNode::Leaf(_) => 0,
                DecNode::And(a, b) => 1 + levels[a.index()].max(levels[b.index()]),
                DecNode::Xor(a, b) => 2 + levels[a.index()].max(levels[b.index()]),
            };
            out = out.max(levels[i]);
        }
        out
    }

    /// Truth table over the first four leaf pins.
    pub fn truth4(&self) -> u16 {
        fn resolve(values: &[u16], e: DecEdge) -> u16 {
            values[e.index()] ^ if e.is_complement() { 0xFFFF } else { 0 }
        }
        let mut values = vec![0u16; self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            let value = match node {
                DecNode::Leaf(pin) => ELEMENTARY_TRUTHS[*pin as usize],
                DecNode::And(a, b) => resolve(&values, *a) & resolve(&values, *b),
                DecNode::Xor(a, b) => resolve(&values, *a) ^ resolve(&values, *b),
            };
            values[i] = value;
        }
        match self.root {
            Root::Const(value) => {
                if value {
                    0xFFFF
                } else {
                    0
                }
            }
            Root::Edge(e) => values[e.index()] ^ if e.is_complement() { 0xFFFF } else { 0 },
        }
    }

    /// Rewires the leaf pins: pin `p` becomes `pin_map[p]`, with every use
    /// of it complemented when `compl[p]` is set, and the whole function
    /// complemented when `out_compl` is set. Used to move a structure into
    /// the canonical input space of its NPN class.
    pub fn remap_leaves(&mut self, pin_map: [u8; 4], compl: [bool; 4], out_compl: bool) {
        let mut flip = vec![false; self.nodes.len()];
        for (i, node) in self.nodes.iter_mut().enumerate() {
            if let DecNode::Leaf(pin) = node {
                flip[i] = compl[*pin as usize];
                *pin = pin_map[*pin as usize] as u32;
            }
        }
        let fix = |e: &mut DecEdge| {
            if flip[e.index()] {
                *e = !*e;
            }
        };
        for i in 0..self.nodes.len() {
            match &mut self.nodes[i] {
                DecNode::Leaf(_) => {}
                DecNode::And(a, b) | DecNode::Xor(a, b) => {
                    fix(a);
                    fix(b);
                }
            }
        }
        if let Root::Edge(mut e) = self.root {
            fix(&mut e);
            self.root = Root::Edge(e);
        }
        if out_compl {
            self.complement();
        }
    }

    /// Counts the and-nodes the graph would add to the network, reusing
    /// strash hits that are not part of the labeled MFFC (current
    /// traversal id). Rejects plans that exceed `node_budget` nodes or
    /// whose new nodes exceed `level_budget`.
    pub fn eval(
        &self,
        aig: &Aig,
        leaves: &[Edge],
        node_budget: usize,
        level_budget: u32,
    ) -> Option<usize> {
        if self.is_const() {
            return Some(0);
        }
        debug_assert_eq!(self.leaf_count(), leaves.len());
        let mut added = 0usize;
        // Existing realization (if any) and level per graph node.
        let mut realized: Vec<Option<Edge>> = vec![None; self.nodes.len()];
        let mut levels = vec![0u32; self.nodes.len()];
        let count_new = |added: &mut usize, level: u32| -> Option<()> {
            *added += 1;
            if *added > node_budget || level > level_budget {
                None
            } else {
                Some(())
            }
        };
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                DecNode::Leaf(pin) => {
                    let edge = leaves[*pin as usize];
                    realized[i] = Some(edge);
                    levels[i] = aig.level(edge.node());
                }
                DecNode::And(a, b) => {
                    let level = 1 + levels[a.index()].max(levels[b.index()]);
                    match self.probe(aig, &realized, *a, *b) {
                        Some(found) => {
                            realized[i] = Some(found);
                            levels[i] = aig.level(found.node());
                        }
                        None => {
                            count_new(&mut added, level)?;
                            levels[i] = level;
                        }
                    }
                }
                DecNode::Xor(a, b) => {
                    // Costed as the 3-AND expansion, probing each piece.
                    let base = levels[a.index()].max(levels[b.index()]);
                    let half0 = self.probe(aig, &realized, *a, !*b);
                    if half0.is_none() {
                        count_new(&mut added, base + 1)?;
                    }
                    let half1 = self.probe(aig, &realized, !*a, *b);
                    if half1.is_none() {
                        count_new(&mut added, base + 1)?;
                    }
                    match (half0, half1) {
                        (Some(h0), Some(h1)) => {
                            if let Some(found) = self.probe_edges(aig, Some(!h0), Some(!h1)) {
                                realized[i] = Some(!found);
                                levels[i] = aig.level(found.node());
                                continue;
                            }
                            count_new(&mut added, base + 2)?;
                            levels[i] = base + 2;
                        }
                        _ => {
                            count_new(&mut added, base + 2)?;
                            levels[i] = base + 2;
                        }
                    }
                }
            }
        }
        Some(added)
    }

    fn probe(&self, aig: &Aig, realized: &[Option<Edge>], a: DecEdge, b: DecEdge) -> Option<Edge> {
        self.probe_edges(
            aig,
            self.resolve(realized, a),
            self.resolve(realized, b),
        )
    }

    fn probe_edges(&self, aig: &Aig, a: Option<Edge>, b: Option<Edge>) -> Option<Edge> {
        let (a, b) = (a?, b?);
        let found = aig.lookup_and(a, b)?;
        // A hit inside the labeled MFFC is about to be deleted and cannot
        // be reused.
        if aig.node(found.node()).is_and() && aig.is_trav_current(found.node()) {
            return None;
        }
        Some(found)
    }

    fn resolve(&self, realized: &[Option<Edge>], e: DecEdge) -> Option<Edge> {
        realized[e.index()].map(|edge| edge.complement_if(e.is_complement()))
    }

    /// Builds the graph into the AIG through structural hashing and
    /// returns the realized root edge.
    pub fn materialize(&self, aig: &mut Aig, leaves: &[Edge]) -> Edge {
        match self.root {
            Root::Const(value) => aig.const0().complement_if(value),
            Root::Edge(root) => {
                debug_assert_eq!(self.leaf_count(), leaves.len());
                let mut built: Vec<Edge> = Vec::with_capacity(self.nodes.len());
                for node in &self.nodes {
                    let edge = match node {
                        DecNode::Leaf(pin) => leaves[*pin as usize],
                        DecNode::And(a, b) => {
                            let ea = built[a.index()].complement_if(a.is_complement());
                            let eb = built[b.index()].complement_if(b.is_complement());
                            aig.and(ea, eb)
                        }
                        DecNode::Xor(a, b) => {
                            let ea = built[a.index()].complement_if(a.is_complement());
                            let eb = built[b.index()].complement_if(b.is_complement());
                            aig.xor(ea, eb)
                        }
                    };
                    built.push(edge);
                }
                built[root.index()].complement_if(root.is_complement())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relic_aig::Aig;

    fn and2_graph() -> DecGraph {
        let mut g = DecGraph::with_leaves(2);
        let a = g.leaf(0);
        let b = g.leaf(1);
        let root = g.add_and(a, b);
        g.set_root(root);
        g
    }

    #[test]
    fn truth_of_simple_graphs() {
        assert_eq!(and2_graph().truth4(), 0xAAAA & 0xCCCC);

        let mut g = DecGraph::with_leaves(2);
        let a = g.leaf(0);
        let b = g.leaf(1);
        let root = g.add_xor(a, b);
        g.set_root(root);
        assert_eq!(g.truth4(), 0xAAAA ^ 0xCCCC);

        let mut g = and2_graph();
        g.complement();
        assert_eq!(g.truth4(), !(0xAAAA & 0xCCCC));
    }

    #[test]
    fn eval_counts_reuse() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let ab = aig.and(a, b);
        aig.add_output(ab);

        let g = and2_graph();
        aig.increment_trav_id();
        // The and already exists and is not labeled: zero cost.
        assert_eq!(g.eval(&aig, &[a, b], 10, u32::MAX), Some(0));
        // With the node labeled as MFFC it cannot be reused.
        aig.set_trav_current(ab.node());
        assert_eq!(g.eval(&aig, &[a, b], 10, u32::MAX), Some(1));
        // Budget of zero rejects the plan.
        assert_eq!(g.eval(&aig, &[a, b], 0, u32::MAX), None);
    }

    #[test]
    fn eval_respects_level_budget() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let c = aig.add_input();
        aig.increment_trav_id();
        let mut g = DecGraph::with_leaves(3);
        let (l0, l1, l2) = (g.leaf(0), g.leaf(1), g.leaf(2));
        let ab = g.add_and(l0, l1);
        let root = g.add_and(ab, l2);
        g.set_root(root);
        assert_eq!(g.eval(&aig, &[a, b, c], 10, 2), Some(2));
        assert_eq!(g.eval(&aig, &[a, b, c], 10, 1), None);
    }

    #[test]
    fn materialize_builds_function() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let mut g = DecGraph::with_leaves(2);
        let (l0, l1) = (g.leaf(0), g.leaf(1));
        let root = g.add_and(!l0, l1);
        g.set_root(!root);
        let edge = g.materialize(&mut aig, &[a, b]);
        // !(!a & b) over a strashed and-node.
        assert!(edge.is_complement());
        let n = aig.node(edge.node());
        assert_eq!(n.fanin0(), !a);
        assert_eq!(n.fanin1(), b);
    }

    #[test]
    fn const_graphs() {
        let mut aig = Aig::new();
        let g0 = DecGraph::constant(false);
        let g1 = DecGraph::constant(true);
        assert_eq!(g0.materialize(&mut aig, &[]), aig.const0());
        assert_eq!(g1.materialize(&mut aig, &[]), aig.const1());
        assert_eq!(g0.truth4(), 0);
        assert_eq!(g1.truth4(), 0xFFFF);
    }
}
