use strum::EnumString;

use crate::orchestrate::Proposals;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum TransformKind {
    Rewrite,
    Resub,
    Refactor,
}

impl TransformKind {
    pub const ALL: [TransformKind; 3] = [
        TransformKind::Rewrite,
        TransformKind::Resub,
        TransformKind::Refactor,
    ];

    pub fn index(self) -> usize {
        match self {
            TransformKind::Rewrite => 0,
            TransformKind::Resub => 1,
            TransformKind::Refactor => 2,
        }
    }

    /// Decision-log value: 0 rewrite, 1 resub, 3 refactor.
    pub fn decision_value(self) -> i32 {
        match self {
            TransformKind::Rewrite => 0,
            TransformKind::Resub => 1,
            TransformKind::Refactor => 3,
        }
    }
}

/// The six transform priority orders.
pub const SIGMA_ORDERS: [[TransformKind; 3]; 6] = {
    use TransformKind::*;
    [
        [Rewrite, Resub, Refactor],
        [Rewrite, Refactor, Resub],
        [Resub, Rewrite, Refactor],
        [Resub, Refactor, Rewrite],
        [Refactor, Rewrite, Resub],
        [Refactor, Resub, Rewrite],
    ]
};

/// Per-pass transform selection policy.
#[derive(Debug, Clone)]
pub enum Policy {
    /// First qualifying transform in the σ order with the given index.
    Priority(usize),
    /// Maximum qualifying gain, ties broken in σ₀ order.
    LocalGreedy,
    /// A σ index per original node id; missing entries fall back to σ₀.
    PerNode(Vec<i8>),
    /// Uniform choice among the qualifying transforms.
    Random { seed: u64 },
}

/// Qualification rules: resubstitution must strictly improve; rewrite and
/// refactor may break even when their zero-gain flag is set. A transform
/// without a proposal never qualifies.
pub(crate) fn qualifies(
    kind: TransformKind,
    proposals: &Proposals,
    use_zeros_rwr: bool,
    use_zeros_ref: bool,
) -> bool {
    let gain = proposals.gains[kind.index()];
    if !proposals.has_proposal(kind) {
        return false;
    }
    match kind {
        TransformKind::Rewrite => gain > 0 || (gain == 0 && use_zeros_rwr),
        TransformKind::Resub => gain > 0,
        TransformKind::Refactor => gain > 0 || (gain == 0 && use_zeros_ref),
    }
}

/// xorshift64 with an explicit seed; the orchestrator owns one so random
/// runs are reproducible.
#[derive(Debug, Clone)]
pub(crate) struct Xorshift64(u64);

impl Xorshift64 {
    pub fn new(seed: u64) -> Self {
        Self(seed | 1)
    }

    pub fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn sigma_orders_are_permutations() {
        for order in SIGMA_ORDERS {
            for kind in TransformKind::ALL {
                assert_eq!(order.iter().filter(|&&k| k == kind).count(), 1);
            }
        }
    }

    #[test]
    fn parses_kind_names() {
        assert_eq!(
            TransformKind::from_str("rewrite").unwrap(),
            TransformKind::Rewrite
        );
        assert_eq!(
            TransformKind::from_str("Resub").unwrap(),
            TransformKind::Resub
        );
    }

    #[test]
    fn rng_is_deterministic() {
        let mut a = Xorshift64::new(42);
        let mut b = Xorshift64::new(42);
        for _ in 0..16 {
            assert_eq!(a.next(), b.next());
        }
    }
}
