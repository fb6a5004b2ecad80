//! Observability don't-care interface.
//!
//! Care-set computation is an external concern; the engine only consumes
//! a bitmask over the `2^k` leaf assignments. The null oracle declares
//! every assignment observable.

use relic_aig::{Aig, NodeId};

pub trait CareSetOracle {
    /// Fills `care` (one bit per leaf assignment, replicated across
    /// words) with the observable assignments of `root` seen through
    /// `leaves`.
    fn compute_care_set(&mut self, aig: &Aig, root: NodeId, leaves: &[NodeId], care: &mut [u64]);
}

/// No don't-cares: every assignment is observable.
#[derive(Debug, Default, Clone, Copy)]
pub struct FullCare;

impl CareSetOracle for FullCare {
    fn compute_care_set(&mut self, _aig: &Aig, _root: NodeId, _leaves: &[NodeId], care: &mut [u64]) {
        care.fill(u64::MAX);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relic_aig::Aig;

    #[test]
    fn full_care_fills_ones() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let x = aig.and(a, b);
        aig.add_output(x);
        let mut care = vec![0u64; 2];
        FullCare.compute_care_set(&aig, x.node(), &[a.node(), b.node()], &mut care);
        assert!(care.iter().all(|&w| w == u64::MAX));
    }
}
