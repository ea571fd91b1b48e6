use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::error::FeatureError;
use crate::match_table::MatchTable;

/// Store/export column names for the eight lag series, home role first.
/// Ordering here is the canonical series order used by the training matrix.
pub const LAG_SERIES: [&str; 8] = [
    "hs_lags",
    "fthg_lags",
    "hthg_lags",
    "hst_lags",
    "as_lags",
    "ftag_lags",
    "htag_lags",
    "ast_lags",
];

/// Trailing-window metric values for one team in one role, oldest first.
/// Each vector holds at most the configured window size and is empty on the
/// team's first appearance in that role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleLags {
    pub shots: Vec<u32>,
    pub goals: Vec<u32>,
    pub ht_goals: Vec<u32>,
    pub shots_on_target: Vec<u32>,
}

impl RoleLags {
    /// Series in [`LAG_SERIES`] order for this role.
    pub fn series(&self) -> [&[u32]; 4] {
        [
            &self.shots,
            &self.goals,
            &self.ht_goals,
            &self.shots_on_target,
        ]
    }
}

/// Lag windows for one fixture, keyed like the match row it derives from.
#[derive(Debug, Clone)]
pub struct LagRow {
    pub index: u64,
    pub kickoff: NaiveDateTime,
    pub home_team: String,
    pub away_team: String,
    pub home: RoleLags,
    pub away: RoleLags,
}

/// One lag row per match, plus the window size they were built with.
#[derive(Debug, Clone)]
pub struct LagTable {
    pub window: usize,
    rows: Vec<LagRow>,
}

impl LagTable {
    /// Rebuilds a table from persisted rows, e.g. a feature-store load.
    /// Sequences longer than the stated window cannot have come from a
    /// consistent store and are rejected.
    pub fn from_rows(window: usize, rows: Vec<LagRow>) -> Result<Self, FeatureError> {
        if window == 0 {
            return Err(FeatureError::config("lag window must be at least 1"));
        }
        for row in &rows {
            let over_long = row
                .home
                .series()
                .into_iter()
                .chain(row.away.series())
                .any(|s| s.len() > window);
            if over_long {
                return Err(FeatureError::data(format!(
                    "lag row {} carries a sequence longer than window {window}",
                    row.index
                )));
            }
        }
        Ok(LagTable { window, rows })
    }

    pub fn rows(&self) -> &[LagRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Append-only metric history for one team in one role. Queried for a
/// window snapshot before the current match is appended, which is what
/// keeps a row's lags strictly earlier than the row itself.
#[derive(Debug, Clone, Default)]
struct RoleHistory {
    shots: Vec<u32>,
    goals: Vec<u32>,
    ht_goals: Vec<u32>,
    shots_on_target: Vec<u32>,
}

impl RoleHistory {
    fn snapshot(&self, window: usize) -> RoleLags {
        RoleLags {
            shots: tail(&self.shots, window),
            goals: tail(&self.goals, window),
            ht_goals: tail(&self.ht_goals, window),
            shots_on_target: tail(&self.shots_on_target, window),
        }
    }

    fn append(&mut self, shots: u32, goals: u32, ht_goals: u32, shots_on_target: u32) {
        self.shots.push(shots);
        self.goals.push(goals);
        self.ht_goals.push(ht_goals);
        self.shots_on_target.push(shots_on_target);
    }
}

fn tail(values: &[u32], window: usize) -> Vec<u32> {
    values[values.len().saturating_sub(window)..].to_vec()
}

/// Builds the per-team rolling lag table for every match in the table.
///
/// Home-role lags come only from a team's prior home matches and away-role
/// lags only from its prior away matches; the two histories never mix.
pub fn compute_lag_table(table: &MatchTable, window: usize) -> Result<LagTable, FeatureError> {
    if window == 0 {
        return Err(FeatureError::config("lag window must be at least 1"));
    }

    let mut home_history: HashMap<String, RoleHistory> = HashMap::new();
    let mut away_history: HashMap<String, RoleHistory> = HashMap::new();
    let mut rows = Vec::with_capacity(table.len());

    for m in table.rows() {
        let home = home_history.entry(m.home_team.clone()).or_default();
        let home_lags = home.snapshot(window);
        home.append(
            m.home_shots,
            m.home_goals,
            m.home_ht_goals,
            m.home_shots_on_target,
        );

        let away = away_history.entry(m.away_team.clone()).or_default();
        let away_lags = away.snapshot(window);
        away.append(
            m.away_shots,
            m.away_goals,
            m.away_ht_goals,
            m.away_shots_on_target,
        );

        rows.push(LagRow {
            index: m.index,
            kickoff: m.kickoff,
            home_team: m.home_team.clone(),
            away_team: m.away_team.clone(),
            home: home_lags,
            away: away_lags,
        });
    }

    Ok(LagTable { window, rows })
}
