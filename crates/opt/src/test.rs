#![cfg(test)]

use std::rc::Rc;

use relic_aig::check::{check_aig, output_signatures};
use relic_aig::{Aig, Edge};

use crate::dec::DecGraph;
use crate::npn::{NpnCanon, RewriteLibrary};
use crate::orchestrate::{
    OrchestrationParams, Orchestrator, Policy, exit_code, orchestrate_masked, orchestrate_priority,
    orchestrate_random,
};

static LIBRARY: std::sync::LazyLock<RewriteLibrary> = std::sync::LazyLock::new(|| {
    let mut lib = RewriteLibrary::bootstrap(1500);
    // Load one extra candidate the way a precomputed forest would be fed
    // in: !((l0 & l1) & (l2 | l3)), the shape the fixture's cone reduces
    // to.
    let mut canon = NpnCanon::new();
    let mut g = DecGraph::with_leaves(4);
    let (l0, l1, l2, l3) = (g.leaf(0), g.leaf(1), g.leaf(2), g.leaf(3));
    let inner = g.add_and(l0, l1);
    let ored = g.add_or(l2, l3);
    let root = g.add_and(inner, ored);
    g.set_root(!root);
    lib.insert_hosted(g, &mut canon);
    lib
});

fn library() -> Rc<RewriteLibrary> {
    Rc::new(LIBRARY.clone())
}

/// A network with one resubstitution opportunity (`r`), one rewrite /
/// refactor opportunity (`top`), and incompressible remainder.
fn fixture() -> (Aig, Edge, Edge) {
    let mut aig = Aig::new();
    let a = aig.add_input();
    let b = aig.add_input();
    let c = aig.add_input();
    let d = aig.add_input();
    let e = aig.add_input();
    let d1 = aig.and(a, b);
    let d2 = aig.and(a, c);
    aig.add_output(d1);
    aig.add_output(d2);
    aig.add_output(b);
    // r = a & (b | c) expressed through an extra node; d1 | d2 is the
    // cheaper form over existing divisors.
    let u = aig.and(!b, !c);
    let r = aig.and(a, !u);
    aig.add_output(r);
    // top = !(d1 & (d | e)) expressed as two products of a shared term.
    let abc = aig.and(d1, d);
    let abd = aig.and(d1, e);
    let top = aig.and(!abc, !abd);
    aig.add_output(!top);
    (aig, r, top)
}

#[test_log::test]
fn priority_pass_reduces_and_preserves_functions() {
    let (mut aig, r, top) = fixture();
    let before_count = aig.and_count();
    let before_sigs = output_signatures(&aig, 17);
    let params = OrchestrationParams {
        steps_max: 3,
        ..OrchestrationParams::default()
    };
    let result = orchestrate_priority(&mut aig, params, library(), 0);
    assert_eq!(exit_code(&result), 1);
    let outcome = result.unwrap();
    assert_eq!(outcome.decisions[r.node() as usize], 1);
    assert_eq!(outcome.decisions[top.node() as usize], 0);
    assert_eq!(outcome.gain(), 2);
    assert!(aig.and_count() <= before_count);
    assert_eq!(output_signatures(&aig, 17), before_sigs);
    assert_eq!(check_aig(&aig), Ok(()));
}

#[test]
fn gains_are_recorded_per_transform() {
    let (mut aig, r, top) = fixture();
    let params = OrchestrationParams {
        steps_max: 3,
        ..OrchestrationParams::default()
    };
    let outcome = orchestrate_priority(&mut aig, params, library(), 0).unwrap();
    assert_eq!(outcome.gain_resub[r.node() as usize], 1);
    assert_eq!(outcome.gain_rewrite[top.node() as usize], 1);
    // r has no 4-feasible cut, so rewrite reports no gain there.
    assert_eq!(outcome.gain_rewrite[r.node() as usize], -1);
}

/// Id-invariant shape of the and-graph: ids are re-assigned after a pass,
/// order-preserving, so relabel and-nodes by their rank in id order.
fn shape(aig: &Aig) -> Vec<(u32, bool, u32, bool)> {
    let ranks: std::collections::HashMap<u32, u32> = aig
        .iter_ands()
        .enumerate()
        .map(|(rank, id)| (id, rank as u32))
        .collect();
    let label = |e: Edge| ranks.get(&e.node()).map(|r| r + 1_000_000).unwrap_or(e.node());
    aig.iter_ands()
        .map(|id| {
            let n = aig.node(id);
            (
                label(n.fanin0()),
                n.fanin0().is_complement(),
                label(n.fanin1()),
                n.fanin1().is_complement(),
            )
        })
        .collect()
}

#[test]
fn disabled_transforms_leave_the_network_unchanged() {
    let (mut aig, _, _) = fixture();
    let shape_before = shape(&aig);
    let sigs_before = output_signatures(&aig, 23);
    let params = OrchestrationParams {
        enable_rewrite: false,
        enable_resub: false,
        enable_refactor: false,
        ..OrchestrationParams::default()
    };
    let outcome = orchestrate_priority(&mut aig, params, library(), 0).unwrap();
    assert_eq!(outcome.gain(), 0);
    assert_eq!(outcome.applied, [0, 0, 0]);
    assert_eq!(shape(&aig), shape_before);
    assert_eq!(output_signatures(&aig, 23), sigs_before);
}

#[test]
fn masked_policy_applies_and_logs_resub() {
    let (mut aig, r, _) = fixture();
    let mask = vec![3i8; aig.slot_count()];
    let params = OrchestrationParams {
        steps_max: 3,
        ..OrchestrationParams::default()
    };
    let outcome = orchestrate_masked(&mut aig, params, library(), mask).unwrap();
    assert_eq!(outcome.decisions[r.node() as usize], 1);
    assert!(outcome.applied[1] >= 1);
    assert_eq!(check_aig(&aig), Ok(()));
}

#[test]
fn random_runs_are_reproducible() {
    let params = OrchestrationParams {
        steps_max: 3,
        ..OrchestrationParams::default()
    };
    let (mut aig1, _, _) = fixture();
    let out1 = orchestrate_random(&mut aig1, params, library(), 99).unwrap();
    let (mut aig2, _, _) = fixture();
    let out2 = orchestrate_random(&mut aig2, params, library(), 99).unwrap();
    assert_eq!(out1.decisions, out2.decisions);
    assert_eq!(aig1.and_count(), aig2.and_count());
}

#[test]
fn node_count_never_grows_without_zeros() {
    for sigma in 0..6 {
        let (mut aig, _, _) = fixture();
        let before = aig.and_count();
        let params = OrchestrationParams {
            steps_max: 3,
            ..OrchestrationParams::default()
        };
        let outcome = orchestrate_priority(&mut aig, params, library(), sigma).unwrap();
        assert!(outcome.nodes_after <= before, "sigma {sigma}");
        assert_eq!(check_aig(&aig), Ok(()));
    }
}

#[test]
fn persistent_and_latch_nodes_are_untouched() {
    let mut aig = Aig::new();
    let a = aig.add_input();
    let b = aig.add_input();
    let next = aig.and(a, b);
    let q = aig.add_latch(next);
    let d1 = aig.and(q, a);
    let d2 = aig.and(q, b);
    aig.add_output(d1);
    aig.add_output(d2);
    // u is redundant (q & (a | b) over d1 | d2) but marked persistent.
    let u = aig.and(!a, !b);
    let r = aig.and(q, !u);
    aig.add_output(r);
    aig.set_persistent(r.node(), true);
    let params = OrchestrationParams {
        steps_max: 3,
        ..OrchestrationParams::default()
    };
    let outcome = Orchestrator::new(params, library())
        .run_pass(&mut aig, &Policy::Priority(0))
        .unwrap();
    assert_eq!(outcome.decisions[r.node() as usize], -99);
    assert_eq!(outcome.gain_resub[r.node() as usize], -99);
    assert_eq!(aig.latches().len(), 1);
    assert_eq!(check_aig(&aig), Ok(()));
}

#[test]
fn second_pass_is_stable() {
    let (mut aig, _, _) = fixture();
    let params = OrchestrationParams {
        steps_max: 3,
        ..OrchestrationParams::default()
    };
    let mut orch = Orchestrator::new(params, library());
    let first = orch.run_pass(&mut aig, &Policy::LocalGreedy).unwrap();
    let sigs = output_signatures(&aig, 31);
    let second = orch.run_pass(&mut aig, &Policy::LocalGreedy).unwrap();
    assert!(second.nodes_after <= first.nodes_after);
    assert_eq!(output_signatures(&aig, 31), sigs);
    assert_eq!(check_aig(&aig), Ok(()));
}

#[test]
fn survey_reports_gains_without_mutating() {
    let (mut aig, r, top) = fixture();
    let before: Vec<(Edge, Edge)> = aig
        .iter_ands()
        .map(|id| (aig.node(id).fanin0(), aig.node(id).fanin1()))
        .collect();
    let params = OrchestrationParams {
        steps_max: 3,
        ..OrchestrationParams::default()
    };
    let mut orch = Orchestrator::new(params, library());
    let entries = orch.survey_pass(&mut aig);
    let after: Vec<(Edge, Edge)> = aig
        .iter_ands()
        .map(|id| (aig.node(id).fanin0(), aig.node(id).fanin1()))
        .collect();
    assert_eq!(before, after);
    let of = |id: Edge| entries.iter().find(|e| e.id == id.node()).unwrap();
    assert_eq!(of(r).gains[1], 1);
    assert_eq!(of(top).gains[0], 1);
}
