use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::csv_load;
use crate::feature_store;
use crate::lag_features::compute_lag_table;
use crate::league_trends::compute_running_percentages;
use crate::match_table::MatchTable;
use crate::parquet_load;

pub const DEFAULT_LAG_WINDOW: usize = 5;

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub league: String,
    pub window: usize,
    pub db_path: PathBuf,
}

/// Where one batch's match table comes from.
#[derive(Debug, Clone)]
pub enum MatchSource {
    Csv(PathBuf),
    Parquet(PathBuf),
}

impl MatchSource {
    pub fn path(&self) -> &Path {
        match self {
            MatchSource::Csv(p) | MatchSource::Parquet(p) => p,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub league: String,
    pub db_path: PathBuf,
    pub rows_in_source: usize,
    pub rows_skipped: usize,
    pub matches_inserted: usize,
    pub lag_rows_inserted: usize,
    pub latest_kickoff: Option<NaiveDateTime>,
}

/// One full batch: load the source file, engineer trend and lag tables over
/// the complete history, and append whatever the store has not seen yet.
/// Engineering always runs over the whole table; causal values for rows the
/// store already holds are reproduced bit-for-bit and the conflict rule
/// drops them.
pub fn run_batch(config: &IngestConfig, source: &MatchSource) -> Result<IngestSummary> {
    let (table, rows_skipped) = load_source(source)?;

    let mut conn = feature_store::open_db(&config.db_path)?;
    let summary = ingest_table(&mut conn, config, &table, rows_skipped)?;
    Ok(summary)
}

pub fn load_source(source: &MatchSource) -> Result<(MatchTable, usize)> {
    match source {
        MatchSource::Csv(path) => {
            let table = csv_load::load_matches_csv(path)
                .with_context(|| format!("load {}", path.display()))?;
            Ok((table, 0))
        }
        MatchSource::Parquet(path) => {
            let load = parquet_load::load_matches_parquet(path)
                .with_context(|| format!("load {}", path.display()))?;
            Ok((load.table, load.rows_skipped))
        }
    }
}

pub fn ingest_table(
    conn: &mut Connection,
    config: &IngestConfig,
    table: &MatchTable,
    rows_skipped: usize,
) -> Result<IngestSummary> {
    let run_id = feature_store::begin_ingest_run(conn, &config.league, config.window, table.len())?;

    let trends = compute_running_percentages(table);
    let lags = compute_lag_table(table, config.window)
        .with_context(|| format!("engineer lag features for {}", config.league))?;

    let matches_inserted =
        feature_store::insert_match_rows(conn, &config.league, table.rows(), &trends)?;
    let lag_rows_inserted = feature_store::insert_lag_rows(conn, &config.league, &lags)?;

    let errors = if rows_skipped > 0 {
        vec![format!("{rows_skipped} source rows skipped")]
    } else {
        Vec::new()
    };
    feature_store::finish_ingest_run(conn, run_id, matches_inserted, lag_rows_inserted, &errors)?;

    Ok(IngestSummary {
        league: config.league.clone(),
        db_path: config.db_path.clone(),
        rows_in_source: table.len(),
        rows_skipped,
        matches_inserted,
        lag_rows_inserted,
        latest_kickoff: table.latest_kickoff(),
    })
}
