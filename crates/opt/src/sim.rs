//! Bit-parallel simulation of a divisor sequence over the cut leaves.

use smallvec::SmallVec;

use relic_aig::{Aig, NodeId, SCRATCH_CLEAR};

/// Elementary truth word for variable `j` at word offset `w`: patterns for
/// the first six variables repeat inside a word, higher variables select
/// whole words.
pub fn elementary_word(j: usize, w: usize) -> u64 {
    const PATTERNS: [u64; 6] = [
        0xAAAA_AAAA_AAAA_AAAA,
        0xCCCC_CCCC_CCCC_CCCC,
        0xF0F0_F0F0_F0F0_F0F0,
        0xFF00_FF00_FF00_FF00,
        0xFFFF_0000_FFFF_0000,
        0xFFFF_FFFF_0000_0000,
    ];
    if j < 6 {
        PATTERNS[j]
    } else if (w >> (j - 6)) & 1 != 0 {
        u64::MAX
    } else {
        0
    }
}

pub fn truth_words(nvars: usize) -> usize {
    if nvars <= 6 { 1 } else { 1 << (nvars - 6) }
}

/// Simulation rows for up to `leaves_max` cut variables and
/// `divs_max - leaves_max` internal divisors. Rows `0..leaves_max` hold
/// the elementary functions; internal divisor `i` (counting from the end
/// of the leaves) uses row `leaves_max + i`. The row index of each
/// divisor is parked in its node's scratch slot for the duration of one
/// evaluation.
#[derive(Debug)]
pub struct SimTable {
    leaves_max: usize,
    rows: usize,
    words: usize,
    data: Vec<u64>,
}

impl SimTable {
    pub fn new(leaves_max: usize, divs_max: usize) -> Self {
        let words = truth_words(leaves_max);
        let rows = divs_max + 1;
        let mut data = vec![0u64; rows * words];
        for j in 0..leaves_max {
            for w in 0..words {
                data[j * words + w] = elementary_word(j, w);
            }
        }
        Self {
            leaves_max,
            rows,
            words,
            data,
        }
    }

    pub fn words(&self) -> usize {
        self.words
    }

    /// Internal rows available beyond the elementary block.
    pub fn internal_capacity(&self) -> usize {
        self.rows - self.leaves_max
    }

    pub fn row(&self, r: usize) -> &[u64] {
        &self.data[r * self.words..(r + 1) * self.words]
    }

    fn row_mut(&mut self, r: usize) -> &mut [u64] {
        &mut self.data[r * self.words..(r + 1) * self.words]
    }

    pub fn node_row(&self, aig: &Aig, id: NodeId) -> &[u64] {
        let r = aig.node(id).scratch();
        debug_assert_ne!(r, SCRATCH_CLEAR);
        self.row(r as usize)
    }

    /// Evaluates every divisor over the `2^k` leaf assignments, then
    /// normalizes each row so bit 0 is clear, recording the complement in
    /// the node's phase flag. Exact over the whole domain, no sampling.
    pub fn simulate(&mut self, aig: &mut Aig, divs: &[NodeId], n_leaves: usize) {
        debug_assert!(divs.len() - n_leaves <= self.internal_capacity());
        for (i, &d) in divs.iter().enumerate() {
            let row = if i < n_leaves {
                i
            } else {
                i - n_leaves + self.leaves_max
            };
            aig.node_mut(d).set_scratch(row as u32);
            if i < n_leaves {
                continue;
            }
            let node = aig.node(d);
            debug_assert!(node.is_and());
            let (e0, e1) = (node.fanin0(), node.fanin1());
            let r0: SmallVec<[u64; 4]> = SmallVec::from_slice(self.node_row(aig, e0.node()));
            let r1: SmallVec<[u64; 4]> = SmallVec::from_slice(self.node_row(aig, e1.node()));
            let out = self.row_mut(row);
            for w in 0..out.len() {
                let v0 = if e0.is_complement() { !r0[w] } else { r0[w] };
                let v1 = if e1.is_complement() { !r1[w] } else { r1[w] };
                out[w] = v0 & v1;
            }
        }
        for &d in divs {
            let row = aig.node(d).scratch() as usize;
            let phase = self.row(row)[0] & 1 != 0;
            aig.node_mut(d).set_phase(phase);
            if phase {
                for w in self.row_mut(row) {
                    *w = !*w;
                }
            }
        }
    }

    /// Clears the scratch rows and phases of a divisor set.
    pub fn cleanup(&self, aig: &mut Aig, divs: &[NodeId]) {
        for &d in divs {
            let node = aig.node_mut(d);
            node.set_scratch(SCRATCH_CLEAR);
            node.set_phase(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relic_aig::Aig;

    #[test]
    fn elementary_rows_round_trip() {
        let table = SimTable::new(8, 150);
        assert_eq!(table.words(), 4);
        for j in 0..8 {
            for w in 0..4 {
                assert_eq!(table.row(j)[w], elementary_word(j, w));
            }
        }
    }

    #[test]
    fn simulates_with_normalization() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let x = aig.and(!a, !b);
        aig.add_output(x);
        let mut table = SimTable::new(4, 16);
        let divs = vec![a.node(), b.node(), x.node()];
        table.simulate(&mut aig, &divs, 2);
        // x = !a & !b has bit 0 set, so it is stored complemented.
        assert!(aig.node(x.node()).phase());
        let stored = table.node_row(&aig, x.node())[0];
        let expected = !(!elementary_word(0, 0) & !elementary_word(1, 0));
        assert_eq!(stored, expected);
        // Leaves simulate to their elementary functions unchanged.
        assert!(!aig.node(a.node()).phase());
        assert_eq!(table.node_row(&aig, a.node())[0], elementary_word(0, 0));
        table.cleanup(&mut aig, &divs);
        assert_eq!(aig.node(x.node()).scratch(), SCRATCH_CLEAR);
    }

    #[test]
    fn word_counts() {
        assert_eq!(truth_words(4), 1);
        assert_eq!(truth_words(6), 1);
        assert_eq!(truth_words(8), 4);
        assert_eq!(truth_words(10), 16);
    }
}
