use smallvec::SmallVec;

use crate::edge::Edge;
use crate::edge::NodeId;

pub const LEVEL_INFINITY: u32 = u32::MAX;
pub const SCRATCH_CLEAR: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Const0,
    Input,
    And,
    Output,
    Latch,
    /// Tombstone for a deleted slot; compacted away by `Aig::reassign_ids`.
    Removed,
}

#[derive(Debug, Clone)]
pub struct AigNode {
    pub(crate) kind: NodeKind,
    /// First fanin for and-nodes, driver for outputs and latches.
    pub(crate) fanin0: Edge,
    pub(crate) fanin1: Edge,
    pub(crate) level: u32,
    /// Reverse level limit; `LEVEL_INFINITY` while required levels are off.
    pub(crate) required: u32,
    /// Fanout count. Equals `fanouts.len()` except while an operation has
    /// the node pinned (MFFC sizing, cut-leaf pinning).
    pub(crate) refs: u32,
    pub(crate) fanouts: SmallVec<[NodeId; 4]>,
    pub(crate) trav_id: u32,
    pub(crate) mark_a: bool,
    pub(crate) mark_b: bool,
    pub(crate) mark_c: bool,
    /// Simulation normalization flag, owned by the resub simulator.
    pub(crate) phase: bool,
    /// Per-operation payload slot (simulation row, truth row). Cleared to
    /// `SCRATCH_CLEAR` by the operation that set it.
    pub(crate) scratch: u32,
    pub(crate) persistent: bool,
}

impl AigNode {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            fanin0: Edge::INVALID,
            fanin1: Edge::INVALID,
            level: 0,
            required: LEVEL_INFINITY,
            refs: 0,
            fanouts: SmallVec::new(),
            trav_id: 0,
            mark_a: false,
            mark_b: false,
            mark_c: false,
            phase: false,
            scratch: SCRATCH_CLEAR,
            persistent: false,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_and(&self) -> bool {
        self.kind == NodeKind::And
    }

    /// Combinational sources: constant, inputs and latch outputs.
    pub fn is_ci(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Const0 | NodeKind::Input | NodeKind::Latch
        )
    }

    pub fn is_co(&self) -> bool {
        matches!(self.kind, NodeKind::Output | NodeKind::Latch)
    }

    pub fn fanin0(&self) -> Edge {
        self.fanin0
    }

    pub fn fanin1(&self) -> Edge {
        self.fanin1
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn refs(&self) -> u32 {
        self.refs
    }

    pub fn fanouts(&self) -> &[NodeId] {
        &self.fanouts
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn phase(&self) -> bool {
        self.phase
    }

    pub fn scratch(&self) -> u32 {
        self.scratch
    }

    pub fn set_scratch(&mut self, value: u32) {
        self.scratch = value;
    }

    pub fn set_phase(&mut self, phase: bool) {
        self.phase = phase;
    }
}
