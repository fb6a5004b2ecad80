//! Driver for the orchestrated optimizer: builds a synthetic benchmark,
//! runs one orchestration mode over it and writes the decision log,
//! per-transform gain logs, embedding exports and a run summary.
//!
//! Usage: relic-bench [benchmark] [mode] [arg] [passes]
//!   benchmark: adder | mux | random        (default adder)
//!   mode:      priority | local | masked | random | survey
//!   arg:       sigma index for priority (0..5), seed for random,
//!              mask file for masked
//!   passes:    pass count (default 2)

use std::env::args;
use std::fs::{self, File};
use std::io::BufWriter;
use std::rc::Rc;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use strum::EnumString;
use tracing::info;

use relic_aig::Aig;
use relic_opt::export;
use relic_opt::npn::RewriteLibrary;
use relic_opt::orchestrate::{OrchestrationParams, Orchestrator, PassOutcome, Policy};

use crate::report::RunSummary;

mod networks;
mod report;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
enum Mode {
    Priority,
    Local,
    Masked,
    Random,
    Survey,
}

fn build_benchmark(name: &str) -> Result<Aig> {
    Ok(match name {
        "adder" => networks::ripple_adder(16),
        "mux" => networks::mux_tree(5),
        "random" => networks::random_aig(0xBEEF, 12, 400),
        other => bail!("unknown benchmark {other}"),
    })
}

fn read_mask(path: &str, len: usize) -> Result<Vec<i8>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading mask {path}"))?;
    let mut mask = vec![0i8; len];
    for (i, line) in text.lines().enumerate().take(len) {
        mask[i] = line.trim().parse().with_context(|| format!("mask line {i}"))?;
    }
    Ok(mask)
}

fn main() -> Result<()> {
    let benchmark = args().nth(1).unwrap_or_else(|| "adder".to_string());
    let mode_name = args().nth(2).unwrap_or_else(|| "priority".to_string());
    let mode = Mode::from_str(&mode_name).with_context(|| format!("unknown mode {mode_name}"))?;
    let mode_arg = args().nth(3);
    let passes: usize = args()
        .nth(4)
        .map(|p| p.parse())
        .transpose()
        .context("pass count")?
        .unwrap_or(2);
    if passes == 0 {
        bail!("need at least one pass");
    }

    let mut aig = build_benchmark(&benchmark)?;
    let library = Rc::new(RewriteLibrary::bootstrap(5000));
    let params = OrchestrationParams {
        steps_max: 3,
        verbose: true,
        ..OrchestrationParams::default()
    };
    let mut orchestrator = Orchestrator::new(params, library);

    info!(%benchmark, ?mode, nodes = aig.and_count(), "starting");

    if mode == Mode::Survey {
        let entries = orchestrator.survey_pass(&mut aig);
        export::write_edge_list(&mut BufWriter::new(File::create("gnn_edges.txt")?), &aig)?;
        export::write_features(&mut BufWriter::new(File::create("gnn_features.txt")?), &entries)?;
        println!("surveyed {} nodes", entries.len());
        return Ok(());
    }

    let policy = match mode {
        Mode::Priority => {
            let sigma: usize = mode_arg.as_deref().unwrap_or("0").parse().context("sigma")?;
            if sigma > 5 {
                bail!("sigma must be 0..=5");
            }
            Policy::Priority(sigma)
        }
        Mode::Local => Policy::LocalGreedy,
        Mode::Masked => {
            let path = mode_arg.as_deref().context("masked mode needs a mask file")?;
            Policy::PerNode(read_mask(path, aig.slot_count())?)
        }
        Mode::Random => {
            // -1 asks for a time-based seed.
            let raw: i64 = mode_arg.as_deref().unwrap_or("1").parse().context("seed")?;
            let seed = if raw == -1 {
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(1)
            } else {
                raw as u64
            };
            Policy::Random { seed }
        }
        Mode::Survey => unreachable!(),
    };

    let mut outcomes: Vec<PassOutcome> = Vec::new();
    for pass in 0..passes {
        let outcome = match orchestrator.run_pass(&mut aig, &policy) {
            Ok(outcome) => outcome,
            Err(err) => {
                eprintln!("pass {pass} failed: {err}");
                std::process::exit(if err.exit_code() < 0 { 255 } else { 2 });
            }
        };
        println!("=== pass {pass}:");
        println!("{outcome}");
        outcomes.push(outcome);
    }

    println!("{}", orchestrator.resub_stats());
    println!("{}", orchestrator.rewrite_stats());
    println!("{}", orchestrator.refactor_stats());
    for (class, score) in orchestrator.rewrite_scores().into_iter().take(10) {
        println!("class {class:#06x}: used {:4}, gain {:6}", score.uses, score.gain);
    }

    let last = outcomes.last().expect("at least one pass");
    export::write_decision_log(&mut BufWriter::new(File::create("decisions.log")?), last)?;
    export::write_gain_csv(
        &mut BufWriter::new(File::create("rewrite_id_gain.csv")?),
        &last.gain_rewrite,
    )?;
    export::write_gain_csv(
        &mut BufWriter::new(File::create("resub_id_gain.csv")?),
        &last.gain_resub,
    )?;
    export::write_gain_csv(
        &mut BufWriter::new(File::create("refactor_id_gain.csv")?),
        &last.gain_refactor,
    )?;

    let summary = RunSummary::new(&benchmark, &mode_name, &outcomes);
    summary.write_json("summary.json")?;
    summary.append_csv("runs.csv")?;
    println!(
        "{}: {} -> {} nodes over {} passes",
        benchmark, summary.nodes_begin, summary.nodes_end, summary.passes
    );
    Ok(())
}
