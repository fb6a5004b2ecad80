//! Plain-text exports: decision logs, per-transform gain logs and the
//! graph-embedding files.

use std::io::{self, Write};

use relic_aig::Aig;

use crate::orchestrate::{GAIN_UNVISITED, PassOutcome, SurveyEntry};

/// One line per pre-pass node id: −99 skipped, −1 no transform, 0
/// rewrite, 1 resub, 3 refactor.
pub fn write_decision_log<W: Write>(w: &mut W, outcome: &PassOutcome) -> io::Result<()> {
    for &value in &outcome.decisions {
        writeln!(w, "{value}")?;
    }
    Ok(())
}

/// `id, gain` per evaluated node.
pub fn write_gain_csv<W: Write>(w: &mut W, gains: &[i32]) -> io::Result<()> {
    for (id, &gain) in gains.iter().enumerate() {
        if gain != GAIN_UNVISITED {
            writeln!(w, "{id}, {gain}")?;
        }
    }
    Ok(())
}

/// `node_id fanin_id` per fanin edge of every and-node.
pub fn write_edge_list<W: Write>(w: &mut W, aig: &Aig) -> io::Result<()> {
    for id in aig.iter_ands() {
        let node = aig.node(id);
        writeln!(w, "{} {}", id, node.fanin0().node())?;
        writeln!(w, "{} {}", id, node.fanin1().node())?;
    }
    Ok(())
}

/// Per-node feature rows:
/// `faninC0, faninC1, rwr_ok, rwr_gain, res_ok, res_gain, ref_ok, ref_gain`.
/// Skipped nodes carry −1 in the six trailing columns; `_ok` marks a
/// non-negative gain.
pub fn write_features<W: Write>(w: &mut W, entries: &[SurveyEntry]) -> io::Result<()> {
    for entry in entries {
        let c0 = entry.fanin_c0 as i32;
        let c1 = entry.fanin_c1 as i32;
        if entry.skipped {
            writeln!(w, "{c0}, {c1}, -1, -1, -1, -1, -1, -1")?;
            continue;
        }
        let ok = |g: i32| (g >= 0) as i32;
        let [rwr, res, rf] = entry.gains;
        writeln!(
            w,
            "{c0}, {c1}, {}, {rwr}, {}, {res}, {}, {rf}",
            ok(rwr),
            ok(res),
            ok(rf)
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrate::GAIN_SKIPPED;

    #[test]
    fn feature_rows_for_skipped_nodes() {
        let entries = [
            SurveyEntry {
                id: 4,
                fanin_c0: true,
                fanin_c1: false,
                gains: [GAIN_SKIPPED; 3],
                skipped: true,
            },
            SurveyEntry {
                id: 5,
                fanin_c0: false,
                fanin_c1: false,
                gains: [2, -1, 0],
                skipped: false,
            },
        ];
        let mut buf = Vec::new();
        write_features(&mut buf, &entries).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "1, 0, -1, -1, -1, -1, -1, -1\n0, 0, 1, 2, 0, -1, 1, 0\n"
        );
    }

    #[test]
    fn edge_list_lists_both_fanins() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let x = aig.and(a, !b);
        aig.add_output(x);
        let mut buf = Vec::new();
        write_edge_list(&mut buf, &aig).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, format!("{0} {1}\n{0} {2}\n", x.node(), a.node(), b.node()));
    }
}
