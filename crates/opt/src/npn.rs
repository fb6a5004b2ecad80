//! NPN canonicalization of 4-variable functions and the rewrite library.
//!
//! The canonical form of a truth table is the numeric minimum over the
//! 2 · 16 · 24 transforms (output negation, input negations, input
//! permutations); there are 222 classes. Each lookup also yields the
//! recipe for feeding a candidate structure: the candidate computes the
//! canonical function, its input `i` is bound to cut leaf `perm[i]`
//! complemented per phase bit `i`, and phase bit 4 complements the output.

use itertools::Itertools;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::dec::{DecGraph, ELEMENTARY_TRUTHS};

pub const NPN_CLASSES: usize = 222;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Npn {
    pub canonical: u16,
    pub perm: [u8; 4],
    /// Bits 0..3 complement the inputs, bit 4 the output.
    pub phase: u8,
}

#[derive(Debug)]
pub struct NpnCanon {
    perms: Vec<[u8; 4]>,
    cache: FxHashMap<u16, Npn>,
}

impl Default for NpnCanon {
    fn default() -> Self {
        Self::new()
    }
}

impl NpnCanon {
    pub fn new() -> Self {
        let perms = (0u8..4)
            .permutations(4)
            .map(|p| [p[0], p[1], p[2], p[3]])
            .collect_vec();
        Self {
            perms,
            cache: FxHashMap::default(),
        }
    }

    pub fn canon(&mut self, truth: u16) -> Npn {
        if let Some(&hit) = self.cache.get(&truth) {
            return hit;
        }
        let mut best = Npn {
            canonical: u16::MAX,
            perm: [0, 1, 2, 3],
            phase: 0,
        };
        for perm in &self.perms {
            for mask in 0u8..16 {
                for out in [0u8, 1] {
                    let candidate = scatter(truth, perm, mask, out != 0);
                    if candidate < best.canonical {
                        best = Npn {
                            canonical: candidate,
                            perm: *perm,
                            phase: mask | (out << 4),
                        };
                    }
                }
            }
        }
        self.cache.insert(truth, best);
        best
    }
}

/// Builds the function `c` with `c(x) = truth(l) ^ out` under
/// `x_i = l_{perm[i]} ^ mask_i`; the minterm map is a bijection.
fn scatter(truth: u16, perm: &[u8; 4], mask: u8, out: bool) -> u16 {
    let mut result = 0u16;
    for m in 0..16u16 {
        let mut x = 0u16;
        for (i, &p) in perm.iter().enumerate() {
            let bit = (m >> p) & 1;
            x |= (bit ^ ((mask >> i) & 1) as u16) << i;
        }
        let value = ((truth >> m) & 1) ^ out as u16;
        result |= value << x;
    }
    result
}

#[derive(Debug, Clone)]
pub struct LibEntry {
    pub graph: DecGraph,
    pub cost: usize,
    pub depth: u32,
}

/// Candidate structures per canonical class, smaller and shallower first.
#[derive(Debug, Default, Clone)]
pub struct RewriteLibrary {
    classes: FxHashMap<u16, Vec<LibEntry>>,
    entries: usize,
}

impl RewriteLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, graph: DecGraph) {
        let canonical = graph.truth4();
        let entry = LibEntry {
            cost: graph.and_cost(),
            depth: graph.depth(),
            graph,
        };
        let bucket = self.classes.entry(canonical).or_default();
        let pos = bucket
            .binary_search_by_key(&(entry.cost, entry.depth), |e| (e.cost, e.depth))
            .unwrap_or_else(|p| p);
        bucket.insert(pos, entry);
        self.entries += 1;
    }

    /// Inserts a structure of any truth by first moving it into the
    /// canonical input space of its class.
    pub fn insert_hosted(&mut self, mut graph: DecGraph, canon: &mut NpnCanon) {
        let truth = graph.truth4();
        let npn = canon.canon(truth);
        if npn.canonical != truth {
            let mut inv = [0u8; 4];
            for (i, &p) in npn.perm.iter().enumerate() {
                inv[p as usize] = i as u8;
            }
            let compl = std::array::from_fn(|j| npn.phase & (1 << inv[j]) != 0);
            graph.remap_leaves(inv, compl, npn.phase & 0x10 != 0);
            debug_assert_eq!(graph.truth4(), npn.canonical);
        }
        self.insert(graph);
    }

    pub fn candidates(&self, canonical: u16) -> &[LibEntry] {
        self.classes
            .get(&canonical)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Enumerates a small forest of AND/XOR structures over the four
    /// elementary variables and keeps those whose truth is canonical, the
    /// in-tree counterpart of an offline-precomputed forest. `size_cap`
    /// bounds the number of enumerated structures.
    pub fn bootstrap(size_cap: usize) -> Self {
        let mut canon = NpnCanon::new();
        let mut forest = Forest::new();
        let mut library = RewriteLibrary::new();

        // Constant and projection classes have no AND-shaped
        // representative; seed them directly. The constant class canonical
        // is 0, matching a fresh graph's constant-0 root.
        library.insert(DecGraph::with_leaves(4));
        let var = canon.canon(ELEMENTARY_TRUTHS[0]).canonical;
        let (v, compl) = (0..4)
            .find_map(|v| {
                if ELEMENTARY_TRUTHS[v] == var {
                    Some((v, false))
                } else if !ELEMENTARY_TRUTHS[v] == var {
                    Some((v, true))
                } else {
                    None
                }
            })
            .expect("projection class canonical is a literal");
        let mut var_graph = DecGraph::with_leaves(4);
        let leaf = var_graph.leaf(v);
        var_graph.set_root(if compl { !leaf } else { leaf });
        library.insert(var_graph);

        let mut i = 1;
        while i < forest.len() && forest.len() < size_cap {
            for k in 1..i {
                if forest.level(i) + forest.level(k) > 5 {
                    continue;
                }
                for (c0, c1) in [(false, false), (true, false), (false, true), (true, true)] {
                    forest.try_and(i, k, c0, c1, &mut canon, &mut library, size_cap);
                }
                forest.try_xor(i, k, &mut canon, &mut library, size_cap);
                if forest.len() >= size_cap {
                    break;
                }
            }
            i += 1;
        }
        debug!(
            structures = forest.len(),
            classes = library.class_count(),
            entries = library.entry_count(),
            "bootstrapped rewrite library"
        );
        library
    }
}

#[derive(Debug, Clone, Copy)]
enum Expr {
    Var(u8),
    And(usize, bool, usize, bool),
    Xor(usize, usize),
}

struct Forest {
    exprs: Vec<Expr>,
    truths: Vec<u16>,
    levels: Vec<u32>,
    /// (level, volume) pairs seen per truth, for dominance pruning.
    seen: FxHashMap<u16, Vec<(u32, usize)>>,
}

impl Forest {
    fn new() -> Self {
        let mut forest = Self {
            exprs: Vec::new(),
            truths: Vec::new(),
            levels: Vec::new(),
            seen: FxHashMap::default(),
        };
        forest.push(Expr::Var(0), 0x0000, 0, 0);
        for (v, &truth) in ELEMENTARY_TRUTHS.iter().enumerate() {
            forest.push(Expr::Var(v as u8), truth, 0, 0);
        }
        forest
    }

    fn len(&self) -> usize {
        self.exprs.len()
    }

    fn level(&self, i: usize) -> u32 {
        self.levels[i]
    }

    fn push(&mut self, expr: Expr, truth: u16, level: u32, volume: usize) {
        self.exprs.push(expr);
        self.truths.push(truth);
        self.levels.push(level);
        self.seen.entry(truth).or_default().push((level, volume));
    }

    fn dominated(&self, truth: u16, level: u32, volume: usize) -> bool {
        self.seen
            .get(&truth)
            .is_some_and(|old| old.iter().any(|&(l, v)| l <= level && v <= volume))
    }

    fn cone_volume(&self, a: usize, b: usize) -> usize {
        fn visit(forest: &Forest, i: usize, marked: &mut Vec<usize>) -> usize {
            if marked.contains(&i) {
                return 0;
            }
            marked.push(i);
            match forest.exprs[i] {
                Expr::Var(_) => 0,
                Expr::And(p0, _, p1, _) => 1 + visit(forest, p0, marked) + visit(forest, p1, marked),
                Expr::Xor(p0, p1) => 3 + visit(forest, p0, marked) + visit(forest, p1, marked),
            }
        }
        let mut marked = Vec::new();
        visit(self, a, &mut marked) + visit(self, b, &mut marked)
    }

    fn try_and(
        &mut self,
        a: usize,
        b: usize,
        c0: bool,
        c1: bool,
        canon: &mut NpnCanon,
        library: &mut RewriteLibrary,
        size_cap: usize,
    ) {
        let t0 = if c0 { !self.truths[a] } else { self.truths[a] };
        let t1 = if c1 { !self.truths[b] } else { self.truths[b] };
        let truth = t0 & t1;
        self.admit(Expr::And(a, c0, b, c1), truth, a, b, 1, canon, library, size_cap);
    }

    fn try_xor(
        &mut self,
        a: usize,
        b: usize,
        canon: &mut NpnCanon,
        library: &mut RewriteLibrary,
        size_cap: usize,
    ) {
        let truth = self.truths[a] ^ self.truths[b];
        self.admit(Expr::Xor(a, b), truth, a, b, 3, canon, library, size_cap);
    }

    #[allow(clippy::too_many_arguments)]
    fn admit(
        &mut self,
        expr: Expr,
        truth: u16,
        a: usize,
        b: usize,
        own_cost: usize,
        canon: &mut NpnCanon,
        library: &mut RewriteLibrary,
        size_cap: usize,
    ) {
        if self.len() >= size_cap {
            return;
        }
        if truth == 0 || truth == 0xFFFF {
            return;
        }
        let level = 1 + self.levels[a].max(self.levels[b]);
        let volume = own_cost + self.cone_volume(a, b);
        if self.dominated(truth, level, volume) {
            return;
        }
        let index = self.len();
        self.push(expr, truth, level, volume);
        let npn = canon.canon(truth);
        if npn.canonical == truth {
            library.insert(self.to_graph(index));
        } else if library.candidates(npn.canonical).is_empty() {
            // First sighting of this class; host the structure in the
            // canonical input space so the class is not left empty.
            library.insert_hosted(self.to_graph(index), canon);
        }
    }

    /// Expands a forest node into a standalone candidate graph over the
    /// four leaf pins.
    fn to_graph(&self, root: usize) -> DecGraph {
        let mut graph = DecGraph::with_leaves(4);
        let mut map: FxHashMap<usize, crate::dec::DecEdge> = FxHashMap::default();
        let edge = self.build(root, &mut graph, &mut map);
        graph.set_root(edge);
        debug_assert_eq!(graph.truth4(), self.truths[root]);
        graph
    }

    fn build(
        &self,
        i: usize,
        graph: &mut DecGraph,
        map: &mut FxHashMap<usize, crate::dec::DecEdge>,
    ) -> crate::dec::DecEdge {
        if let Some(&e) = map.get(&i) {
            return e;
        }
        let edge = match self.exprs[i] {
            Expr::Var(v) => graph.leaf(v as usize),
            Expr::And(p0, c0, p1, c1) => {
                let e0 = self.build(p0, graph, map);
                let e1 = self.build(p1, graph, map);
                let e0 = if c0 { !e0 } else { e0 };
                let e1 = if c1 { !e1 } else { e1 };
                graph.add_and(e0, e1)
            }
            Expr::Xor(p0, p1) => {
                let e0 = self.build(p0, graph, map);
                let e1 = self.build(p1, graph, map);
                graph.add_xor(e0, e1)
            }
        };
        map.insert(i, edge);
        edge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static LIBRARY: std::sync::LazyLock<RewriteLibrary> =
        std::sync::LazyLock::new(|| RewriteLibrary::bootstrap(1500));

    #[test]
    #[ignore = "exhaustive sweep over every four-variable function"]
    fn there_are_222_classes() {
        let mut canon = NpnCanon::new();
        let classes: rustc_hash::FxHashSet<u16> =
            (0..=u16::MAX).map(|t| canon.canon(t).canonical).collect();
        assert_eq!(classes.len(), NPN_CLASSES);
    }

    #[test]
    fn canon_is_idempotent_and_class_invariant() {
        let mut canon = NpnCanon::new();
        for &truth in &[0x8888u16, 0xF888, 0xE8E8, 0x6996, 0xCAFE, 0x1234] {
            let npn = canon.canon(truth);
            // The canonical form is itself canonical.
            assert_eq!(canon.canon(npn.canonical).canonical, npn.canonical);
            // The complement is in the same class.
            assert_eq!(canon.canon(!truth).canonical, npn.canonical);
        }
    }

    #[test]
    fn recipe_reconstructs_the_truth() {
        let mut canon = NpnCanon::new();
        for &truth in &[0x8888u16, 0xF888, 0xE8E8, 0x6996, 0xCAFE, 0x0001] {
            let npn = canon.canon(truth);
            // Evaluate canonical at inputs built per the recipe, for every
            // leaf assignment.
            let mut rebuilt = 0u16;
            for m in 0..16u16 {
                let mut x = 0u16;
                for i in 0..4 {
                    let bit = (m >> npn.perm[i]) & 1;
                    x |= (bit ^ ((npn.phase >> i) & 1) as u16) << i;
                }
                let mut value = (npn.canonical >> x) & 1;
                if npn.phase & 0x10 != 0 {
                    value ^= 1;
                }
                rebuilt |= value << m;
            }
            assert_eq!(rebuilt, truth);
        }
    }

    #[test]
    fn bootstrap_covers_basic_classes() {
        let mut canon = NpnCanon::new();
        let library = &*LIBRARY;
        // Projection class: a zero-node candidate.
        let var = canon.canon(0xAAAA);
        let best = &library.candidates(var.canonical)[0];
        assert_eq!(best.cost, 0);
        // Two-input and class: a one-node candidate.
        let and2 = canon.canon(0x8888);
        let best = &library.candidates(and2.canonical)[0];
        assert_eq!(best.cost, 1);
        // Or-of-ands class: a three-node candidate.
        let orand = canon.canon(0xF888);
        assert!(!library.candidates(orand.canonical).is_empty());
        assert_eq!(library.candidates(orand.canonical)[0].cost, 3);
    }

    #[test]
    fn library_candidates_sorted() {
        let library = &*LIBRARY;
        for canonical in [0x8888u16, 0xF888] {
            let mut canon = NpnCanon::new();
            let class = canon.canon(canonical).canonical;
            let costs: Vec<_> = library.candidates(class).iter().map(|e| e.cost).collect();
            let mut sorted = costs.clone();
            sorted.sort_unstable();
            assert_eq!(costs, sorted);
        }
    }
}
