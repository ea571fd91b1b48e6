use chrono::NaiveDateTime;

use crate::error::FeatureError;

/// Full-time over/under 2.5 goals label. Derived from the final score and
/// therefore unknown before kickoff; it only ever feeds lag history and
/// training labels, never the row's own feature set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverUnder {
    Over,
    Under,
}

impl OverUnder {
    pub fn from_total_goals(total: u32) -> Self {
        if total > 2 {
            OverUnder::Over
        } else {
            OverUnder::Under
        }
    }

    pub fn as_char(self) -> char {
        match self {
            OverUnder::Over => 'O',
            OverUnder::Under => 'U',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'O' => Some(OverUnder::Over),
            'U' => Some(OverUnder::Under),
            _ => None,
        }
    }

    /// Label encoding used by the training matrix (Over = 1).
    pub fn encoded(self) -> u8 {
        match self {
            OverUnder::Over => 1,
            OverUnder::Under => 0,
        }
    }
}

/// Market-average odds attached to a fixture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketOdds {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
    pub over_25: f64,
    pub under_25: f64,
}

impl MarketOdds {
    pub fn all_finite(&self) -> bool {
        [self.home, self.draw, self.away, self.over_25, self.under_25]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// One fixture row of the historical match table.
#[derive(Debug, Clone)]
pub struct MatchRecord {
    /// Stable sequence id, strictly increasing with kickoff time.
    pub index: u64,
    pub kickoff: NaiveDateTime,
    pub home_team: String,
    pub away_team: String,
    pub home_goals: u32,
    pub away_goals: u32,
    pub home_ht_goals: u32,
    pub away_ht_goals: u32,
    pub home_shots: u32,
    pub away_shots: u32,
    pub home_shots_on_target: u32,
    pub away_shots_on_target: u32,
    pub odds: MarketOdds,
}

impl MatchRecord {
    pub fn total_goals(&self) -> u32 {
        self.home_goals + self.away_goals
    }

    pub fn over_under(&self) -> OverUnder {
        OverUnder::from_total_goals(self.total_goals())
    }
}

/// A validated, chronologically ordered match table.
///
/// Construction is the single validation point: once a `MatchTable` exists,
/// indices are strictly increasing, kickoffs never go backwards, and every
/// odds field is finite. Downstream feature computations rely on this and
/// take the table by reference without re-checking.
#[derive(Debug, Clone, Default)]
pub struct MatchTable {
    rows: Vec<MatchRecord>,
}

impl MatchTable {
    pub fn from_rows(rows: Vec<MatchRecord>) -> Result<Self, FeatureError> {
        for pair in rows.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.index <= prev.index {
                return Err(FeatureError::data(format!(
                    "match index {} does not increase after {}",
                    next.index, prev.index
                )));
            }
            if next.kickoff < prev.kickoff {
                return Err(FeatureError::data(format!(
                    "kickoff order inconsistent with index: match {} ({}) kicks off before match {} ({})",
                    next.index, next.kickoff, prev.index, prev.kickoff
                )));
            }
        }
        for row in &rows {
            if !row.odds.all_finite() {
                return Err(FeatureError::data(format!(
                    "non-finite odds on match {} ({} vs {})",
                    row.index, row.home_team, row.away_team
                )));
            }
        }
        Ok(MatchTable { rows })
    }

    /// Sorts raw loader output by (kickoff, home, away), assigns sequence
    /// indices, then validates. Loaders use this so postponed fixtures that
    /// appear out of file order still produce a monotonic index.
    pub fn from_unordered_rows(mut rows: Vec<MatchRecord>) -> Result<Self, FeatureError> {
        rows.sort_by(|a, b| {
            a.kickoff
                .cmp(&b.kickoff)
                .then_with(|| a.home_team.cmp(&b.home_team))
                .then_with(|| a.away_team.cmp(&b.away_team))
        });
        for (i, row) in rows.iter_mut().enumerate() {
            row.index = i as u64;
        }
        Self::from_rows(rows)
    }

    pub fn rows(&self) -> &[MatchRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn latest_kickoff(&self) -> Option<NaiveDateTime> {
        self.rows.last().map(|r| r.kickoff)
    }

    /// The leading `n` rows as a new table. Ordering invariants are
    /// preserved by construction, so no re-validation happens.
    pub fn head(&self, n: usize) -> MatchTable {
        MatchTable {
            rows: self.rows[..n.min(self.rows.len())].to_vec(),
        }
    }
}
