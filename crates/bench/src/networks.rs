//! Deterministic synthetic benchmark networks.

use relic_aig::{Aig, Edge};

/// Ripple-carry adder over two `bits`-wide operands plus carry-in.
pub fn ripple_adder(bits: usize) -> Aig {
    let mut aig = Aig::new();
    let xs: Vec<Edge> = (0..bits).map(|_| aig.add_input()).collect();
    let ys: Vec<Edge> = (0..bits).map(|_| aig.add_input()).collect();
    let mut carry = aig.add_input();
    for i in 0..bits {
        let p = aig.xor(xs[i], ys[i]);
        let sum = aig.xor(p, carry);
        let g = aig.and(xs[i], ys[i]);
        let pc = aig.and(p, carry);
        let cout = aig.or(g, pc);
        aig.add_output(sum);
        carry = cout;
    }
    aig.add_output(carry);
    aig
}

/// A `depth`-level multiplexer tree over `2^depth` data inputs.
pub fn mux_tree(depth: usize) -> Aig {
    let mut aig = Aig::new();
    let selects: Vec<Edge> = (0..depth).map(|_| aig.add_input()).collect();
    let mut layer: Vec<Edge> = (0..1usize << depth).map(|_| aig.add_input()).collect();
    for sel in &selects {
        layer = layer
            .chunks(2)
            .map(|pair| aig.mux(*sel, pair[1], pair[0]))
            .collect();
    }
    aig.add_output(layer[0]);
    aig
}

/// A seeded random strashed network: `steps` attempts to combine earlier
/// signals with random polarities. Signals left unused become outputs.
pub fn random_aig(seed: u64, inputs: usize, steps: usize) -> Aig {
    let mut aig = Aig::new();
    let mut state = seed | 1;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };
    let mut signals: Vec<Edge> = (0..inputs).map(|_| aig.add_input()).collect();
    for _ in 0..steps {
        let i = (next() % signals.len() as u64) as usize;
        let j = (next() % signals.len() as u64) as usize;
        let a = signals[i].complement_if(next() & 1 != 0);
        let b = signals[j].complement_if(next() & 1 != 0);
        let out = match next() % 3 {
            0 => aig.and(a, b),
            1 => aig.or(a, b),
            _ => aig.xor(a, b),
        };
        signals.push(out);
    }
    for &s in &signals {
        if s.node() != 0 && aig.node(s.node()).refs() == 0 {
            aig.add_output(s);
        }
    }
    aig
}
