use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::edge::{Edge, NodeId};
use crate::node::{AigNode, LEVEL_INFINITY, NodeKind, SCRATCH_CLEAR};

/// Structurally hashed and-inverter graph.
///
/// Node 0 is the constant-0 node; the constant-1 function is the
/// complemented edge to it. And-node fanin pairs are kept ordered and
/// deduplicated through the strash table, so no two live and-nodes share
/// the same ordered `(fanin0, fanin1)` pair.
#[derive(Debug, Default)]
pub struct Aig {
    nodes: Vec<AigNode>,
    strash: FxHashMap<(Edge, Edge), NodeId>,
    inputs: Vec<NodeId>,
    outputs: Vec<NodeId>,
    latches: Vec<NodeId>,
    trav_id: u32,
    /// Fixed depth target while required levels are enabled.
    required_target: Option<u32>,
}

impl Aig {
    pub fn new() -> Self {
        let mut aig = Self::default();
        aig.nodes.push(AigNode::new(NodeKind::Const0));
        aig
    }

    pub fn const0(&self) -> Edge {
        Edge::regular(0)
    }

    pub fn const1(&self) -> Edge {
        !self.const0()
    }

    pub fn add_input(&mut self) -> Edge {
        let id = self.alloc(AigNode::new(NodeKind::Input));
        self.inputs.push(id);
        Edge::regular(id)
    }

    pub fn add_output(&mut self, driver: Edge) -> NodeId {
        let mut node = AigNode::new(NodeKind::Output);
        node.fanin0 = driver;
        node.persistent = true;
        let id = self.alloc(node);
        self.attach(driver.node(), id);
        self.outputs.push(id);
        id
    }

    /// Adds a latch with the given next-state driver and returns the edge
    /// reading the latch output. Latches are level-0 sources and are never
    /// touched by optimization.
    pub fn add_latch(&mut self, next: Edge) -> Edge {
        let mut node = AigNode::new(NodeKind::Latch);
        node.fanin0 = next;
        node.persistent = true;
        let id = self.alloc(node);
        self.attach(next.node(), id);
        self.latches.push(id);
        Edge::regular(id)
    }

    fn alloc(&mut self, node: AigNode) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &AigNode {
        &self.nodes[id as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut AigNode {
        &mut self.nodes[id as usize]
    }

    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    pub fn latches(&self) -> &[NodeId] {
        &self.latches
    }

    /// Number of node slots, including tombstones. Valid ids are below this.
    pub fn slot_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn and_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_and()).count()
    }

    pub fn iter_ands(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_and())
            .map(|(i, _)| i as NodeId)
    }

    pub fn is_removed(&self, id: NodeId) -> bool {
        self.nodes[id as usize].kind == NodeKind::Removed
    }

    pub fn level(&self, id: NodeId) -> u32 {
        self.nodes[id as usize].level
    }

    pub fn max_level(&self) -> u32 {
        self.nodes
            .iter()
            .filter(|n| n.is_and())
            .map(|n| n.level)
            .max()
            .unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Traversal ids and marks
    // ------------------------------------------------------------------

    /// Invalidates all previous visit marks in O(1). Counter rollover is
    /// handled by a bulk clear of the per-node marks.
    pub fn increment_trav_id(&mut self) -> u32 {
        if self.trav_id == u32::MAX {
            for node in &mut self.nodes {
                node.trav_id = 0;
            }
            self.trav_id = 0;
        }
        self.trav_id += 1;
        self.trav_id
    }

    pub fn trav_id(&self) -> u32 {
        self.trav_id
    }

    pub fn set_trav_current(&mut self, id: NodeId) {
        self.nodes[id as usize].trav_id = self.trav_id;
    }

    pub fn is_trav_current(&self, id: NodeId) -> bool {
        self.nodes[id as usize].trav_id == self.trav_id
    }

    pub fn mark_a(&self, id: NodeId) -> bool {
        self.nodes[id as usize].mark_a
    }

    pub fn set_mark_a(&mut self, id: NodeId, value: bool) {
        self.nodes[id as usize].mark_a = value;
    }

    pub fn mark_b(&self, id: NodeId) -> bool {
        self.nodes[id as usize].mark_b
    }

    pub fn set_mark_b(&mut self, id: NodeId, value: bool) {
        self.nodes[id as usize].mark_b = value;
    }

    pub fn mark_c(&self, id: NodeId) -> bool {
        self.nodes[id as usize].mark_c
    }

    pub fn set_mark_c(&mut self, id: NodeId, value: bool) {
        self.nodes[id as usize].mark_c = value;
    }

    pub fn clear_scratch(&mut self) {
        for node in &mut self.nodes {
            node.scratch = SCRATCH_CLEAR;
            node.phase = false;
        }
    }

    pub fn set_persistent(&mut self, id: NodeId, value: bool) {
        self.nodes[id as usize].persistent = value;
    }

    /// Temporarily biases the fanout count without touching the fanout
    /// list. Every caller must undo its bias before returning.
    pub fn bias_refs(&mut self, id: NodeId, delta: i32) {
        let refs = &mut self.nodes[id as usize].refs;
        *refs = refs.checked_add_signed(delta).expect("ref bias underflow");
    }

    // ------------------------------------------------------------------
    // Structural hashing
    // ------------------------------------------------------------------

    fn ordered(a: Edge, b: Edge) -> (Edge, Edge) {
        if a.raw() <= b.raw() { (a, b) } else { (b, a) }
    }

    /// Constant and trivial absorption: `a·0 = 0`, `a·1 = a`, `a·a = a`,
    /// `a·!a = 0`.
    fn absorb(&self, a: Edge, b: Edge) -> Option<Edge> {
        if a == b {
            return Some(a);
        }
        if a == !b {
            return Some(self.const0());
        }
        if a == self.const0() || b == self.const0() {
            return Some(self.const0());
        }
        if a == self.const1() {
            return Some(b);
        }
        if b == self.const1() {
            return Some(a);
        }
        None
    }

    /// Probes for an existing realization of `a & b` without creating one.
    pub fn lookup_and(&self, a: Edge, b: Edge) -> Option<Edge> {
        if let Some(short) = self.absorb(a, b) {
            return Some(short);
        }
        let key = Self::ordered(a, b);
        self.strash.get(&key).map(|&id| Edge::regular(id))
    }

    pub fn and(&mut self, a: Edge, b: Edge) -> Edge {
        if let Some(short) = self.absorb(a, b) {
            return short;
        }
        let (a, b) = Self::ordered(a, b);
        if let Some(&id) = self.strash.get(&(a, b)) {
            return Edge::regular(id);
        }
        let mut node = AigNode::new(NodeKind::And);
        node.fanin0 = a;
        node.fanin1 = b;
        node.level = 1 + self.nodes[a.index()].level.max(self.nodes[b.index()].level);
        let id = self.alloc(node);
        self.attach(a.node(), id);
        self.attach(b.node(), id);
        self.strash.insert((a, b), id);
        Edge::regular(id)
    }

    pub fn or(&mut self, a: Edge, b: Edge) -> Edge {
        !self.and(!a, !b)
    }

    pub fn xor(&mut self, a: Edge, b: Edge) -> Edge {
        let n0 = self.and(a, !b);
        let n1 = self.and(!a, b);
        !self.and(!n0, !n1)
    }

    pub fn mux(&mut self, sel: Edge, t: Edge, e: Edge) -> Edge {
        let n0 = self.and(sel, t);
        let n1 = self.and(!sel, e);
        !self.and(!n0, !n1)
    }

    fn attach(&mut self, fanin: NodeId, fanout: NodeId) {
        let node = &mut self.nodes[fanin as usize];
        node.fanouts.push(fanout);
        node.refs += 1;
    }

    fn detach(&mut self, fanin: NodeId, fanout: NodeId) {
        let node = &mut self.nodes[fanin as usize];
        let pos = node
            .fanouts
            .iter()
            .position(|&f| f == fanout)
            .expect("fanout list out of sync");
        node.fanouts.swap_remove(pos);
        node.refs -= 1;
    }

    // ------------------------------------------------------------------
    // Replacement and deletion
    // ------------------------------------------------------------------

    /// Rewires every fanout of `old` to `new` (absorbing trivial pairs and
    /// strash collisions by replacing the fanout itself), then deletes
    /// whatever became unreferenced. Functions of all remaining nodes are
    /// preserved, assuming `new` is functionally equivalent to `old`.
    pub fn replace(&mut self, old: NodeId, new: Edge) {
        debug_assert!(self.nodes[old as usize].is_and());
        let mut stack = vec![(old, new)];
        let mut retired = Vec::new();
        while let Some((old, new)) = stack.pop() {
            if new.node() == old {
                continue;
            }
            retired.push(old);
            let fanouts: Vec<NodeId> = self.nodes[old as usize].fanouts.to_vec();
            for f in fanouts {
                match self.nodes[f as usize].kind {
                    NodeKind::Output | NodeKind::Latch => {
                        let driver = self.nodes[f as usize].fanin0;
                        debug_assert_eq!(driver.node(), old);
                        let patched = new.complement_if(driver.is_complement());
                        self.detach(old, f);
                        self.attach(patched.node(), f);
                        self.nodes[f as usize].fanin0 = patched;
                    }
                    NodeKind::And => {
                        self.rewire_and(f, old, new, &mut stack);
                    }
                    NodeKind::Removed => {}
                    _ => unreachable!("source node in a fanout list"),
                }
            }
        }
        for id in retired {
            let node = &self.nodes[id as usize];
            if node.is_and() && node.refs == 0 && !node.persistent {
                self.delete_rec(id);
            }
        }
    }

    fn rewire_and(&mut self, f: NodeId, old: NodeId, new: Edge, stack: &mut Vec<(NodeId, Edge)>) {
        let e0 = self.nodes[f as usize].fanin0;
        let e1 = self.nodes[f as usize].fanin1;
        let patch = |e: Edge| {
            if e.node() == old {
                new.complement_if(e.is_complement())
            } else {
                e
            }
        };
        let p0 = patch(e0);
        let p1 = patch(e1);
        if let Some(short) = self.absorb(p0, p1) {
            // The fanout collapses to an existing function; replace it in
            // turn. Its stale fanins are detached when it is deleted.
            trace!(node = f, "fanout absorbed during replace");
            stack.push((f, short));
            return;
        }
        let key = Self::ordered(p0, p1);
        match self.strash.get(&key) {
            Some(&existing) if existing != f => {
                trace!(node = f, existing, "fanout collides during replace");
                stack.push((f, Edge::regular(existing)));
            }
            _ => {
                self.strash.remove(&Self::ordered(e0, e1));
                self.detach(e0.node(), f);
                self.detach(e1.node(), f);
                let node = &mut self.nodes[f as usize];
                node.fanin0 = key.0;
                node.fanin1 = key.1;
                self.attach(key.0.node(), f);
                self.attach(key.1.node(), f);
                self.strash.insert(key, f);
                self.update_level_up(f);
            }
        }
    }

    /// Deletes an unreferenced and-node and cascades to fanins whose count
    /// drops to zero.
    fn delete_rec(&mut self, id: NodeId) {
        debug_assert!(self.nodes[id as usize].is_and());
        debug_assert_eq!(self.nodes[id as usize].refs, 0);
        let e0 = self.nodes[id as usize].fanin0;
        let e1 = self.nodes[id as usize].fanin1;
        self.strash.remove(&Self::ordered(e0, e1));
        self.detach(e0.node(), id);
        self.detach(e1.node(), id);
        let node = &mut self.nodes[id as usize];
        node.kind = NodeKind::Removed;
        node.fanin0 = Edge::INVALID;
        node.fanin1 = Edge::INVALID;
        node.level = 0;
        for child in [e0.node(), e1.node()] {
            let n = &self.nodes[child as usize];
            if n.is_and() && n.refs == 0 && !n.persistent {
                self.delete_rec(child);
            }
        }
    }

    /// Sweeps and-nodes without fanouts, as left behind by replacements
    /// whose cut leaves were pinned. Returns the number of nodes removed.
    pub fn cleanup_dangling(&mut self) -> usize {
        let before = self.and_count();
        loop {
            let dead: Vec<NodeId> = self
                .nodes
                .iter()
                .enumerate()
                .filter(|(_, n)| n.is_and() && n.refs == 0 && !n.persistent)
                .map(|(i, _)| i as NodeId)
                .collect();
            if dead.is_empty() {
                break;
            }
            for id in dead {
                let node = &self.nodes[id as usize];
                if node.is_and() && node.refs == 0 {
                    self.delete_rec(id);
                }
            }
        }
        before - self.and_count()
    }

    // ------------------------------------------------------------------
    // Levels
    // ------------------------------------------------------------------

    fn update_level_up(&mut self, id: NodeId) {
        let node = &self.nodes[id as usize];
        if !node.is_and() {
            return;
        }
        let level = 1 + self.nodes[node.fanin0.index()]
            .level
            .max(self.nodes[node.fanin1.index()].level);
        if level == self.nodes[id as usize].level {
            return;
        }
        self.nodes[id as usize].level = level;
        let fanouts: Vec<NodeId> = self.nodes[id as usize].fanouts.to_vec();
        for f in fanouts {
            self.update_level_up(f);
        }
    }

    /// Full forward recomputation of levels.
    pub fn update_levels(&mut self) {
        let order = self.topo_order();
        for id in order {
            let node = &self.nodes[id as usize];
            if node.is_and() {
                let level = 1 + self.nodes[node.fanin0.index()]
                    .level
                    .max(self.nodes[node.fanin1.index()].level);
                self.nodes[id as usize].level = level;
            }
        }
    }

    // ------------------------------------------------------------------
    // Required (reverse) levels
    // ------------------------------------------------------------------

    pub fn start_required(&mut self) {
        self.required_target = Some(self.max_level());
        self.update_required();
    }

    pub fn clear_required(&mut self) {
        self.required_target = None;
        for node in &mut self.nodes {
            node.required = LEVEL_INFINITY;
        }
    }

    pub fn required(&self, id: NodeId) -> u32 {
        self.nodes[id as usize].required
    }

    pub fn required_enabled(&self) -> bool {
        self.required_target.is_some()
    }

    /// Reverse sweep from the outputs against the fixed depth target.
    pub fn update_required(&mut self) {
        let Some(target) = self.required_target else {
            return;
        };
        for node in &mut self.nodes {
            node.required = LEVEL_INFINITY;
        }
        for &co in self.outputs.iter().chain(self.latches.iter()) {
            let driver = self.nodes[co as usize].fanin0;
            if driver.is_valid() {
                let req = &mut self.nodes[driver.index()].required;
                *req = (*req).min(target);
            }
        }
        let mut order = self.topo_order();
        order.reverse();
        for id in order {
            let node = &self.nodes[id as usize];
            if !node.is_and() || node.required == LEVEL_INFINITY {
                continue;
            }
            let req = node.required.saturating_sub(1);
            let (f0, f1) = (node.fanin0.node(), node.fanin1.node());
            for child in [f0, f1] {
                let r = &mut self.nodes[child as usize].required;
                *r = (*r).min(req);
            }
        }
    }

    // ------------------------------------------------------------------
    // Ordering
    // ------------------------------------------------------------------

    /// Topological order of live and-nodes (fanins first), stable with
    /// respect to current ids.
    fn topo_order(&self) -> Vec<NodeId> {
        let mut pending: FxHashMap<NodeId, u32> = FxHashMap::default();
        let mut heap: BinaryHeap<Reverse<NodeId>> = BinaryHeap::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if !node.is_and() {
                continue;
            }
            let deps = [node.fanin0.node(), node.fanin1.node()]
                .into_iter()
                .filter(|&d| self.nodes[d as usize].is_and())
                .count() as u32;
            if deps == 0 {
                heap.push(Reverse(i as NodeId));
            } else {
                pending.insert(i as NodeId, deps);
            }
        }
        let mut order = Vec::with_capacity(pending.len() + heap.len());
        while let Some(Reverse(id)) = heap.pop() {
            order.push(id);
            for &f in self.nodes[id as usize].fanouts.iter() {
                if let Some(count) = pending.get_mut(&f) {
                    *count -= 1;
                    if *count == 0 {
                        pending.remove(&f);
                        heap.push(Reverse(f));
                    }
                }
            }
        }
        debug_assert!(pending.is_empty(), "cycle through and-nodes");
        order
    }

    /// Compacts tombstones away and renumbers nodes topologically, keeping
    /// the relative order of surviving old ids wherever the old order was
    /// already topological. Sources keep their leading positions.
    pub fn reassign_ids(&mut self) -> FxHashMap<NodeId, NodeId> {
        let mut order: Vec<NodeId> = Vec::with_capacity(self.nodes.len());
        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_ci() {
                order.push(i as NodeId);
            }
        }
        order.extend(self.topo_order());
        for (i, node) in self.nodes.iter().enumerate() {
            if node.kind == NodeKind::Output {
                order.push(i as NodeId);
            }
        }

        let mut remap: FxHashMap<NodeId, NodeId> = FxHashMap::default();
        for (new_id, &old_id) in order.iter().enumerate() {
            remap.insert(old_id, new_id as NodeId);
        }
        let map_edge = |e: Edge| {
            if e.is_valid() {
                Edge::new(remap[&e.node()], e.is_complement())
            } else {
                e
            }
        };

        let mut nodes = Vec::with_capacity(order.len());
        for &old_id in &order {
            let mut node = self.nodes[old_id as usize].clone();
            node.fanin0 = map_edge(node.fanin0);
            node.fanin1 = map_edge(node.fanin1);
            for f in node.fanouts.iter_mut() {
                *f = remap[f];
            }
            nodes.push(node);
        }
        self.nodes = nodes;
        self.strash = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_and())
            .map(|(i, n)| ((n.fanin0, n.fanin1), i as NodeId))
            .collect();
        for id in self.inputs.iter_mut().chain(self.outputs.iter_mut()).chain(self.latches.iter_mut()) {
            *id = remap[id];
        }
        remap
    }
}
