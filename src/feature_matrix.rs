use chrono::NaiveDateTime;

use crate::error::FeatureError;
use crate::lag_features::{LagTable, LAG_SERIES};
use crate::league_trends::LeagueTrend;
use crate::match_table::MatchTable;

/// Odds and trend columns that precede the expanded lag columns.
const BASE_COLUMNS: [&str; 7] = [
    "avgh",
    "avgd",
    "avga",
    "avg_gt_2_5",
    "avg_lt_2_5",
    "league_over_percentage",
    "league_under_percentage",
];

/// One flattened training row. `features` is aligned with
/// [`TrainingMatrix::column_names`]; lag slots without history are `None`
/// and left to the consumer to pad or drop.
#[derive(Debug, Clone)]
pub struct MatrixRow {
    pub index: u64,
    pub kickoff: NaiveDateTime,
    pub home_team: String,
    pub away_team: String,
    pub features: Vec<Option<f64>>,
    /// Over = 1, Under = 0.
    pub label: u8,
}

/// Fixed-width feature matrix for a downstream classifier.
#[derive(Debug, Clone)]
pub struct TrainingMatrix {
    pub column_names: Vec<String>,
    pub rows: Vec<MatrixRow>,
}

impl TrainingMatrix {
    pub fn width(&self) -> usize {
        self.column_names.len()
    }
}

/// Expands variable-length lag sequences into `window` columns per series
/// (`<series>_1` oldest .. `<series>_W` newest) and joins odds, trend, and
/// label columns. The three inputs must all derive from the same table.
pub fn build_training_matrix(
    table: &MatchTable,
    trends: &[LeagueTrend],
    lags: &LagTable,
) -> Result<TrainingMatrix, FeatureError> {
    if trends.len() != table.len() || lags.len() != table.len() {
        return Err(FeatureError::data(format!(
            "feature tables disagree on row count: {} matches, {} trend rows, {} lag rows",
            table.len(),
            trends.len(),
            lags.len()
        )));
    }

    let window = lags.window;
    let mut column_names: Vec<String> = BASE_COLUMNS.iter().map(|c| c.to_string()).collect();
    for series in LAG_SERIES {
        for i in 1..=window {
            column_names.push(format!("{series}_{i}"));
        }
    }

    let mut rows = Vec::with_capacity(table.len());
    for ((m, trend), lag_row) in table.rows().iter().zip(trends).zip(lags.rows()) {
        if lag_row.index != m.index {
            return Err(FeatureError::data(format!(
                "lag row {} does not line up with match {}",
                lag_row.index, m.index
            )));
        }

        let mut features: Vec<Option<f64>> = Vec::with_capacity(column_names.len());
        features.extend([
            Some(m.odds.home),
            Some(m.odds.draw),
            Some(m.odds.away),
            Some(m.odds.over_25),
            Some(m.odds.under_25),
            Some(trend.over_percentage),
            Some(trend.under_percentage),
        ]);
        for series in lag_row.home.series().into_iter().chain(lag_row.away.series()) {
            for i in 0..window {
                features.push(series.get(i).map(|v| f64::from(*v)));
            }
        }

        rows.push(MatrixRow {
            index: m.index,
            kickoff: m.kickoff,
            home_team: m.home_team.clone(),
            away_team: m.away_team.clone(),
            features,
            label: m.over_under().encoded(),
        });
    }

    Ok(TrainingMatrix { column_names, rows })
}
