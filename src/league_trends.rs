use crate::match_table::{MatchTable, OverUnder};

/// Causal league-wide over/under rates for one match row: the fraction of
/// strictly earlier matches that finished Over, and Under. Both are 0.0
/// when no history exists yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeagueTrend {
    pub over_percentage: f64,
    pub under_percentage: f64,
}

/// Running outcome counters, threaded through the fold as a value so the
/// computation stays pure and replayable.
#[derive(Debug, Clone, Copy, Default)]
struct TrendCounts {
    over: u64,
    under: u64,
}

impl TrendCounts {
    fn emit(&self) -> LeagueTrend {
        let total = self.over + self.under;
        if total == 0 {
            return LeagueTrend {
                over_percentage: 0.0,
                under_percentage: 0.0,
            };
        }
        LeagueTrend {
            over_percentage: self.over as f64 / total as f64,
            under_percentage: self.under as f64 / total as f64,
        }
    }

    fn absorb(&mut self, label: OverUnder) {
        match label {
            OverUnder::Over => self.over += 1,
            OverUnder::Under => self.under += 1,
        }
    }
}

/// One trend row per match, aligned with the table's row order.
///
/// Each row's percentages are emitted before its own result is absorbed, so
/// a match never sees its own outcome or anything after it.
pub fn compute_running_percentages(table: &MatchTable) -> Vec<LeagueTrend> {
    let mut counts = TrendCounts::default();
    let mut out = Vec::with_capacity(table.len());
    for row in table.rows() {
        out.push(counts.emit());
        counts.absorb(row.over_under());
    }
    out
}
