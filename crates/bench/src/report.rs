//! Run summaries: one JSON blob per run plus an accumulating CSV table.

use std::fs::{File, OpenOptions};
use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use relic_opt::orchestrate::PassOutcome;

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub benchmark: String,
    pub mode: String,
    pub passes: usize,
    pub nodes_begin: usize,
    pub nodes_end: usize,
    pub rewrites: usize,
    pub resubs: usize,
    pub refactors: usize,
    pub no_ops: usize,
    pub skipped: usize,
    pub t_rewrite_ms: u64,
    pub t_resub_ms: u64,
    pub t_refactor_ms: u64,
    pub t_update_ms: u64,
    pub t_total_ms: u64,
}

impl RunSummary {
    pub fn new(benchmark: &str, mode: &str, outcomes: &[PassOutcome]) -> Self {
        let sum = |f: fn(&PassOutcome) -> usize| outcomes.iter().map(f).sum();
        let sum_ms = |f: fn(&PassOutcome) -> u64| outcomes.iter().map(f).sum();
        Self {
            benchmark: benchmark.to_string(),
            mode: mode.to_string(),
            passes: outcomes.len(),
            nodes_begin: outcomes.first().map(|o| o.nodes_before).unwrap_or(0),
            nodes_end: outcomes.last().map(|o| o.nodes_after).unwrap_or(0),
            rewrites: sum(|o| o.applied[0]),
            resubs: sum(|o| o.applied[1]),
            refactors: sum(|o| o.applied[2]),
            no_ops: sum(|o| o.no_ops),
            skipped: sum(|o| o.skipped),
            t_rewrite_ms: sum_ms(|o| o.t_rewrite),
            t_resub_ms: sum_ms(|o| o.t_resub),
            t_refactor_ms: sum_ms(|o| o.t_refactor),
            t_update_ms: sum_ms(|o| o.t_update),
            t_total_ms: sum_ms(|o| o.t_total),
        }
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        serde_json::to_writer_pretty(File::create(path)?, self)?;
        Ok(())
    }

    /// Appends one row to the accumulating run table, writing headers
    /// only when the file is fresh.
    pub fn append_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let fresh = !path.as_ref().exists();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(fresh)
            .from_writer(file);
        writer.serialize(self)?;
        writer.flush()?;
        Ok(())
    }
}
