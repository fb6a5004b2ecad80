//! Per-node orchestration of the three local transforms.
//!
//! One pass walks the and-nodes in id order (ids are topological at pass
//! start; nodes created mid-pass get larger ids and are not revisited),
//! evaluates rewrite, resubstitution and refactoring on each, picks at
//! most one winner under the active policy and commits it. Invariants are
//! re-verified after the pass.

mod policy;

use std::fmt::{self, Display, Formatter};
use std::rc::Rc;
use std::time::Instant;

use derive_more::{Display as DisplayMore, Error};
use tracing::{debug, info};

use relic_aig::check::{self, CheckError};
use relic_aig::{Aig, Edge, LEVEL_INFINITY, NodeId};

use crate::cuts::reconv_cut;
use crate::dec::DecGraph;
use crate::dontcare::CareSetOracle;
use crate::npn::RewriteLibrary;
use crate::refactor::{Factoring, RefactorManager, RefactorParams, SopFactoring};
use crate::resub::{ResubManager, ResubParams};
use crate::rewrite::{RewriteManager, RewriteOutcome};
use crate::update::{UpdateError, update_network};

pub use policy::{Policy, SIGMA_ORDERS, TransformKind};
use policy::{Xorshift64, qualifies};

/// Gain-vector value for nodes skipped as persistent or high-fanout.
pub const GAIN_SKIPPED: i32 = -99;
pub const DECISION_SKIPPED: i32 = -99;
pub const DECISION_NONE: i32 = -1;
/// Nodes the pass never looked at (sources, outputs, tombstones).
pub const GAIN_UNVISITED: i32 = i32::MIN;

pub const FANOUT_SKIP_LIMIT: u32 = 1000;

#[derive(Debug, Clone, Copy)]
pub struct OrchestrationParams {
    pub enable_rewrite: bool,
    pub enable_resub: bool,
    pub enable_refactor: bool,
    pub use_zeros_rwr: bool,
    pub use_zeros_ref: bool,
    /// Reconvergence-driven cut size for resubstitution.
    pub cut_max: usize,
    /// Resubstitution depth (0..=3).
    pub steps_max: usize,
    /// Observability don't-care depth; 0 disables the oracle.
    pub odc_levels: usize,
    pub update_level: bool,
    /// Factor-cut leaf limit for refactoring.
    pub node_size_max: usize,
    pub cone_size_max: usize,
    pub use_dcs: bool,
    pub verbose: bool,
}

impl Default for OrchestrationParams {
    fn default() -> Self {
        Self {
            enable_rewrite: true,
            enable_resub: true,
            enable_refactor: true,
            use_zeros_rwr: false,
            use_zeros_ref: false,
            cut_max: 8,
            steps_max: 1,
            odc_levels: 0,
            update_level: true,
            node_size_max: 10,
            cone_size_max: 16,
            use_dcs: false,
            verbose: false,
        }
    }
}

#[derive(Debug, DisplayMore, Error)]
pub enum PassError {
    #[display("network check failed after pass: {_0}")]
    Check(CheckError),
    #[display("unrecoverable update failure: {_0}")]
    Update(UpdateError),
}

impl PassError {
    /// 0 for an invariant violation, −1 for an update failure; a clean
    /// pass exits 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            PassError::Check(_) => 0,
            PassError::Update(_) => -1,
        }
    }
}

pub fn exit_code(result: &Result<PassOutcome, PassError>) -> i32 {
    match result {
        Ok(_) => 1,
        Err(e) => e.exit_code(),
    }
}

/// Everything one pass recorded, indexed by pre-pass node ids.
#[derive(Debug, Clone)]
pub struct PassOutcome {
    pub decisions: Vec<i32>,
    pub gain_rewrite: Vec<i32>,
    pub gain_resub: Vec<i32>,
    pub gain_refactor: Vec<i32>,
    pub applied: [usize; 3],
    pub no_ops: usize,
    pub skipped: usize,
    pub nodes_before: usize,
    pub nodes_after: usize,
    pub t_rewrite: u64,
    pub t_resub: u64,
    pub t_refactor: u64,
    pub t_update: u64,
    pub t_total: u64,
}

impl PassOutcome {
    fn new(n: usize) -> Self {
        Self {
            decisions: vec![DECISION_NONE; n],
            gain_rewrite: vec![GAIN_UNVISITED; n],
            gain_resub: vec![GAIN_UNVISITED; n],
            gain_refactor: vec![GAIN_UNVISITED; n],
            applied: [0; 3],
            no_ops: 0,
            skipped: 0,
            nodes_before: 0,
            nodes_after: 0,
            t_rewrite: 0,
            t_resub: 0,
            t_refactor: 0,
            t_update: 0,
            t_total: 0,
        }
    }

    pub fn gain(&self) -> i64 {
        self.nodes_before as i64 - self.nodes_after as i64
    }

    pub fn gains_of(&self, kind: TransformKind) -> &[i32] {
        match kind {
            TransformKind::Rewrite => &self.gain_rewrite,
            TransformKind::Resub => &self.gain_resub,
            TransformKind::Refactor => &self.gain_refactor,
        }
    }
}

impl Display for PassOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Nodes with rewrite:  {}", self.applied[0])?;
        writeln!(f, "Nodes with resub:    {}", self.applied[1])?;
        writeln!(f, "Nodes with refactor: {}", self.applied[2])?;
        writeln!(f, "Nodes without updates: {}", self.no_ops)?;
        writeln!(f, "Nodes skipped:       {}", self.skipped)?;
        write!(
            f,
            "Nodes {} -> {} (gain {}) in {} ms",
            self.nodes_before,
            self.nodes_after,
            self.gain(),
            self.t_total
        )
    }
}

/// The three per-node proposals and their gains (rwr, res, ref order).
#[derive(Debug, Default)]
pub(crate) struct Proposals {
    pub rewrite: Option<RewriteOutcome>,
    pub resub: Option<(DecGraph, Vec<Edge>)>,
    pub refactor: Option<(DecGraph, Vec<Edge>)>,
    pub gains: [i32; 3],
}

impl Proposals {
    pub fn has_proposal(&self, kind: TransformKind) -> bool {
        match kind {
            TransformKind::Rewrite => self.rewrite.is_some(),
            TransformKind::Resub => self.resub.is_some(),
            TransformKind::Refactor => self.refactor.is_some(),
        }
    }
}

/// Survey of one node for the embedding export.
#[derive(Debug, Clone, Copy)]
pub struct SurveyEntry {
    pub id: NodeId,
    pub fanin_c0: bool,
    pub fanin_c1: bool,
    /// Gains in (rwr, res, ref) order; `GAIN_SKIPPED` rows mean the node
    /// was not evaluated.
    pub gains: [i32; 3],
    pub skipped: bool,
}

pub struct Orchestrator {
    pub params: OrchestrationParams,
    rewrite: RewriteManager,
    resub: ResubManager,
    refactor: RefactorManager,
    factoring: Box<dyn Factoring>,
    oracle: Option<Box<dyn CareSetOracle>>,
}

impl Orchestrator {
    pub fn new(params: OrchestrationParams, library: Rc<RewriteLibrary>) -> Self {
        Self {
            rewrite: RewriteManager::new(library),
            resub: ResubManager::new(ResubParams {
                cut_max: params.cut_max,
                ..ResubParams::default()
            }),
            refactor: RefactorManager::new(RefactorParams {
                node_size_max: params.node_size_max,
                cone_size_max: params.cone_size_max,
                use_zeros: params.use_zeros_ref,
                use_dcs: params.use_dcs,
            }),
            factoring: Box::new(SopFactoring),
            oracle: None,
            params,
        }
    }

    pub fn with_factoring(mut self, factoring: Box<dyn Factoring>) -> Self {
        self.factoring = factoring;
        self
    }

    pub fn with_oracle(mut self, oracle: Box<dyn CareSetOracle>) -> Self {
        self.oracle = oracle.into();
        self
    }

    pub fn rewrite_stats(&self) -> &crate::rewrite::RewriteStats {
        &self.rewrite.stats
    }

    pub fn rewrite_scores(&self) -> Vec<(u16, crate::rewrite::ClassScore)> {
        self.rewrite.class_scores()
    }

    pub fn resub_stats(&self) -> &crate::resub::ResubStats {
        &self.resub.stats
    }

    pub fn refactor_stats(&self) -> &crate::refactor::RefactorStats {
        &self.refactor.stats
    }

    fn required_of(&self, aig: &Aig, id: NodeId) -> u32 {
        if self.params.update_level {
            aig.required(id)
        } else {
            LEVEL_INFINITY
        }
    }

    fn evaluate_node(&mut self, aig: &mut Aig, id: NodeId, outcome: &mut PassOutcome) -> Proposals {
        let required = self.required_of(aig, id);
        let mut proposals = Proposals::default();
        proposals.gains = [-1; 3];

        if self.params.enable_rewrite {
            let clk = Instant::now();
            proposals.rewrite = self
                .rewrite
                .node_rewrite(aig, id, required, self.params.use_zeros_rwr);
            proposals.gains[0] = self.rewrite.last_gain;
            outcome.t_rewrite += clk.elapsed().as_millis() as u64;
        }

        if self.params.enable_resub {
            let clk = Instant::now();
            let leaves = reconv_cut(aig, id, self.params.cut_max);
            if self.params.odc_levels > 0
                && let Some(oracle) = self.oracle.as_mut()
            {
                oracle.compute_care_set(aig, id, &leaves, self.resub.care_mut());
            } else {
                self.resub.reset_care();
            }
            proposals.resub = self
                .resub
                .eval(aig, id, &leaves, self.params.steps_max, required);
            proposals.gains[1] = self.resub.last_gain;
            outcome.t_resub += clk.elapsed().as_millis() as u64;
        }

        if self.params.enable_refactor {
            let clk = Instant::now();
            proposals.refactor = self
                .refactor
                .node_refactor(aig, id, required, &*self.factoring);
            proposals.gains[2] = self.refactor.last_gain;
            outcome.t_refactor += clk.elapsed().as_millis() as u64;
        }

        proposals
    }

    fn select(
        &self,
        node: NodeId,
        policy: &Policy,
        rng: &mut Xorshift64,
        proposals: &Proposals,
    ) -> Option<TransformKind> {
        let qualifies = |kind: TransformKind| {
            qualifies(
                kind,
                proposals,
                self.params.use_zeros_rwr,
                self.params.use_zeros_ref,
            )
        };
        match policy {
            Policy::Priority(sigma) => SIGMA_ORDERS[*sigma].into_iter().find(|&k| qualifies(k)),
            Policy::PerNode(mask) => {
                let sigma = mask
                    .get(node as usize)
                    .copied()
                    .filter(|&s| (0..6).contains(&s))
                    .unwrap_or(0) as usize;
                SIGMA_ORDERS[sigma].into_iter().find(|&k| qualifies(k))
            }
            Policy::LocalGreedy => {
                let mut best: Option<TransformKind> = None;
                for kind in SIGMA_ORDERS[0] {
                    if !qualifies(kind) {
                        continue;
                    }
                    if best.is_none_or(|b| proposals.gains[b.index()] < proposals.gains[kind.index()])
                    {
                        best = Some(kind);
                    }
                }
                best
            }
            Policy::Random { .. } => {
                let valid: Vec<TransformKind> =
                    SIGMA_ORDERS[0].into_iter().filter(|&k| qualifies(k)).collect();
                if valid.is_empty() {
                    None
                } else {
                    Some(valid[(rng.next() % valid.len() as u64) as usize])
                }
            }
        }
    }

    fn apply(
        &mut self,
        aig: &mut Aig,
        id: NodeId,
        kind: TransformKind,
        proposals: &mut Proposals,
    ) -> Result<(), UpdateError> {
        let gain = proposals.gains[kind.index()];
        match kind {
            TransformKind::Rewrite => {
                let outcome = proposals.rewrite.take().expect("selected proposal");
                update_network(
                    aig,
                    id,
                    &outcome.graph,
                    &outcome.leaves,
                    outcome.complement,
                    gain,
                    self.params.update_level,
                )
            }
            TransformKind::Resub => {
                let (graph, bindings) = proposals.resub.take().expect("selected proposal");
                update_network(aig, id, &graph, &bindings, false, gain, self.params.update_level)
            }
            TransformKind::Refactor => {
                let (graph, bindings) = proposals.refactor.take().expect("selected proposal");
                update_network(aig, id, &graph, &bindings, false, gain, self.params.update_level)
            }
        }
    }

    /// Runs one optimization pass under the given policy.
    pub fn run_pass(&mut self, aig: &mut Aig, policy: &Policy) -> Result<PassOutcome, PassError> {
        let clk_start = Instant::now();
        self.refactor.params.use_zeros = self.params.use_zeros_ref;
        let mut rng = Xorshift64::new(match policy {
            Policy::Random { seed } => *seed,
            _ => 0,
        });

        aig.cleanup_dangling();
        aig.update_levels();
        if self.params.update_level {
            aig.start_required();
        } else {
            aig.clear_required();
        }
        self.rewrite.reset_cuts();

        let n = aig.slot_count();
        let mut outcome = PassOutcome::new(n);
        outcome.nodes_before = aig.and_count();

        for id in 0..n as NodeId {
            if !aig.node(id).is_and() {
                continue;
            }
            if aig.node(id).is_persistent() || aig.node(id).refs() > FANOUT_SKIP_LIMIT {
                outcome.decisions[id as usize] = DECISION_SKIPPED;
                outcome.gain_rewrite[id as usize] = GAIN_SKIPPED;
                outcome.gain_resub[id as usize] = GAIN_SKIPPED;
                outcome.gain_refactor[id as usize] = GAIN_SKIPPED;
                outcome.skipped += 1;
                continue;
            }
            let mut proposals = self.evaluate_node(aig, id, &mut outcome);
            outcome.gain_rewrite[id as usize] = proposals.gains[0];
            outcome.gain_resub[id as usize] = proposals.gains[1];
            outcome.gain_refactor[id as usize] = proposals.gains[2];

            match self.select(id, policy, &mut rng, &proposals) {
                Some(kind) => {
                    let clk = Instant::now();
                    self.apply(aig, id, kind, &mut proposals)
                        .map_err(PassError::Update)?;
                    outcome.t_update += clk.elapsed().as_millis() as u64;
                    outcome.decisions[id as usize] = kind.decision_value();
                    outcome.applied[kind.index()] += 1;
                    debug!(node = id, ?kind, gain = proposals.gains[kind.index()], "applied");
                }
                None => outcome.no_ops += 1,
            }
        }

        aig.clear_scratch();
        aig.reassign_ids();
        aig.update_levels();
        if self.params.update_level {
            aig.clear_required();
        }
        check::check_aig(aig).map_err(PassError::Check)?;

        outcome.nodes_after = aig.and_count();
        outcome.t_total = clk_start.elapsed().as_millis() as u64;
        if self.params.verbose {
            info!(%outcome, "pass finished");
        }
        Ok(outcome)
    }

    /// Evaluation-only sweep for the embedding export: gains per node, no
    /// network mutation.
    pub fn survey_pass(&mut self, aig: &mut Aig) -> Vec<SurveyEntry> {
        aig.cleanup_dangling();
        aig.update_levels();
        if self.params.update_level {
            aig.start_required();
        } else {
            aig.clear_required();
        }
        self.rewrite.reset_cuts();
        let mut entries = Vec::new();
        let mut scratch_outcome = PassOutcome::new(0);
        for id in 0..aig.slot_count() as NodeId {
            if !aig.node(id).is_and() {
                continue;
            }
            let node = aig.node(id);
            let (fanin_c0, fanin_c1) = (
                node.fanin0().is_complement(),
                node.fanin1().is_complement(),
            );
            if node.is_persistent() || node.refs() > FANOUT_SKIP_LIMIT {
                entries.push(SurveyEntry {
                    id,
                    fanin_c0,
                    fanin_c1,
                    gains: [GAIN_SKIPPED; 3],
                    skipped: true,
                });
                continue;
            }
            let proposals = self.evaluate_node(aig, id, &mut scratch_outcome);
            entries.push(SurveyEntry {
                id,
                fanin_c0,
                fanin_c1,
                gains: proposals.gains,
                skipped: false,
            });
        }
        aig.clear_scratch();
        entries
    }
}

// ----------------------------------------------------------------------
// One entry point per orchestration mode.
// ----------------------------------------------------------------------

pub fn orchestrate_priority(
    aig: &mut Aig,
    params: OrchestrationParams,
    library: Rc<RewriteLibrary>,
    sigma: usize,
) -> Result<PassOutcome, PassError> {
    Orchestrator::new(params, library).run_pass(aig, &Policy::Priority(sigma))
}

pub fn orchestrate_local(
    aig: &mut Aig,
    params: OrchestrationParams,
    library: Rc<RewriteLibrary>,
) -> Result<PassOutcome, PassError> {
    Orchestrator::new(params, library).run_pass(aig, &Policy::LocalGreedy)
}

pub fn orchestrate_masked(
    aig: &mut Aig,
    params: OrchestrationParams,
    library: Rc<RewriteLibrary>,
    mask: Vec<i8>,
) -> Result<PassOutcome, PassError> {
    Orchestrator::new(params, library).run_pass(aig, &Policy::PerNode(mask))
}

pub fn orchestrate_random(
    aig: &mut Aig,
    params: OrchestrationParams,
    library: Rc<RewriteLibrary>,
    seed: u64,
) -> Result<PassOutcome, PassError> {
    Orchestrator::new(params, library).run_pass(aig, &Policy::Random { seed })
}
