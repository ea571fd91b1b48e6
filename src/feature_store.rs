use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDateTime, Utc};
use rusqlite::{Connection, params};

use crate::lag_features::{LagRow, LagTable, RoleLags};
use crate::league_trends::LeagueTrend;
use crate::match_table::{MarketOdds, MatchRecord, OverUnder};

const DATA_DIR: &str = "goalline";
const DB_FILE: &str = "feature_store.sqlite";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// A match row as persisted: the raw record plus its causal trend columns.
#[derive(Debug, Clone)]
pub struct StoredMatchRow {
    pub record: MatchRecord,
    pub trend: LeagueTrend,
}

pub fn default_db_path() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(DB_FILE))
}

fn app_data_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_DATA_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(DATA_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(
        PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(DATA_DIR),
    )
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS matches (
            league TEXT NOT NULL,
            idx INTEGER NOT NULL,
            datetime TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            fthg INTEGER NOT NULL,
            ftag INTEGER NOT NULL,
            hthg INTEGER NOT NULL,
            htag INTEGER NOT NULL,
            homeshots INTEGER NOT NULL,
            awayshots INTEGER NOT NULL,
            hst INTEGER NOT NULL,
            ast INTEGER NOT NULL,
            avgh REAL NOT NULL,
            avgd REAL NOT NULL,
            avga REAL NOT NULL,
            avg_gt_2_5 REAL NOT NULL,
            avg_lt_2_5 REAL NOT NULL,
            ftour TEXT NOT NULL,
            league_over_percentage REAL NOT NULL,
            league_under_percentage REAL NOT NULL,
            inserted_at TEXT NOT NULL,
            PRIMARY KEY (league, idx)
        );
        CREATE INDEX IF NOT EXISTS idx_matches_datetime ON matches(datetime);
        CREATE INDEX IF NOT EXISTS idx_matches_teams ON matches(home_team, away_team);

        CREATE TABLE IF NOT EXISTS lag_rows (
            league TEXT NOT NULL,
            lag_window INTEGER NOT NULL,
            idx INTEGER NOT NULL,
            datetime TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            hs_lags TEXT NOT NULL,
            fthg_lags TEXT NOT NULL,
            hthg_lags TEXT NOT NULL,
            hst_lags TEXT NOT NULL,
            as_lags TEXT NOT NULL,
            ftag_lags TEXT NOT NULL,
            htag_lags TEXT NOT NULL,
            ast_lags TEXT NOT NULL,
            inserted_at TEXT NOT NULL,
            PRIMARY KEY (league, lag_window, idx)
        );

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            league TEXT NOT NULL,
            lag_window INTEGER NOT NULL,
            rows_in_source INTEGER NOT NULL,
            matches_inserted INTEGER NOT NULL,
            lag_rows_inserted INTEGER NOT NULL,
            errors_json TEXT NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Inserts match rows with their trend columns. Existing (league, idx)
/// rows are left untouched, which is what makes re-running a batch on a
/// grown source file safe. Returns how many rows were actually inserted.
pub fn insert_match_rows(
    conn: &mut Connection,
    league: &str,
    rows: &[MatchRecord],
    trends: &[LeagueTrend],
) -> Result<usize> {
    if rows.len() != trends.len() {
        return Err(anyhow!(
            "match rows ({}) and trend rows ({}) disagree",
            rows.len(),
            trends.len()
        ));
    }

    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction().context("begin match insert")?;
    let mut inserted = 0usize;
    for (m, trend) in rows.iter().zip(trends) {
        inserted += tx
            .execute(
                r#"
                INSERT INTO matches (
                    league, idx, datetime, home_team, away_team,
                    fthg, ftag, hthg, htag,
                    homeshots, awayshots, hst, ast,
                    avgh, avgd, avga, avg_gt_2_5, avg_lt_2_5,
                    ftour, league_over_percentage, league_under_percentage,
                    inserted_at
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5,
                    ?6, ?7, ?8, ?9,
                    ?10, ?11, ?12, ?13,
                    ?14, ?15, ?16, ?17, ?18,
                    ?19, ?20, ?21, ?22
                )
                ON CONFLICT(league, idx) DO NOTHING
                "#,
                params![
                    league,
                    m.index as i64,
                    m.kickoff.format(DATETIME_FMT).to_string(),
                    m.home_team,
                    m.away_team,
                    m.home_goals as i64,
                    m.away_goals as i64,
                    m.home_ht_goals as i64,
                    m.away_ht_goals as i64,
                    m.home_shots as i64,
                    m.away_shots as i64,
                    m.home_shots_on_target as i64,
                    m.away_shots_on_target as i64,
                    m.odds.home,
                    m.odds.draw,
                    m.odds.away,
                    m.odds.over_25,
                    m.odds.under_25,
                    m.over_under().as_char().to_string(),
                    trend.over_percentage,
                    trend.under_percentage,
                    now,
                ],
            )
            .context("insert match row")?;
    }
    tx.commit().context("commit match insert")?;
    Ok(inserted)
}

/// Inserts lag rows for one window size; same append-only conflict rule as
/// [`insert_match_rows`]. Lag sequences are stored as JSON arrays.
pub fn insert_lag_rows(conn: &mut Connection, league: &str, lags: &LagTable) -> Result<usize> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction().context("begin lag insert")?;
    let mut inserted = 0usize;
    for row in lags.rows() {
        inserted += tx
            .execute(
                r#"
                INSERT INTO lag_rows (
                    league, lag_window, idx, datetime, home_team, away_team,
                    hs_lags, fthg_lags, hthg_lags, hst_lags,
                    as_lags, ftag_lags, htag_lags, ast_lags,
                    inserted_at
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6,
                    ?7, ?8, ?9, ?10,
                    ?11, ?12, ?13, ?14,
                    ?15
                )
                ON CONFLICT(league, lag_window, idx) DO NOTHING
                "#,
                params![
                    league,
                    lags.window as i64,
                    row.index as i64,
                    row.kickoff.format(DATETIME_FMT).to_string(),
                    row.home_team,
                    row.away_team,
                    encode_lags(&row.home.shots)?,
                    encode_lags(&row.home.goals)?,
                    encode_lags(&row.home.ht_goals)?,
                    encode_lags(&row.home.shots_on_target)?,
                    encode_lags(&row.away.shots)?,
                    encode_lags(&row.away.goals)?,
                    encode_lags(&row.away.ht_goals)?,
                    encode_lags(&row.away.shots_on_target)?,
                    now,
                ],
            )
            .context("insert lag row")?;
    }
    tx.commit().context("commit lag insert")?;
    Ok(inserted)
}

pub fn load_match_rows(conn: &Connection, league: &str) -> Result<Vec<StoredMatchRow>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                idx, datetime, home_team, away_team,
                fthg, ftag, hthg, htag,
                homeshots, awayshots, hst, ast,
                avgh, avgd, avga, avg_gt_2_5, avg_lt_2_5,
                league_over_percentage, league_under_percentage
            FROM matches
            WHERE league = ?1
            ORDER BY idx ASC
            "#,
        )
        .context("prepare match load query")?;

    let rows = stmt
        .query_map(params![league], |row| {
            let datetime: String = row.get(1)?;
            Ok((
                MatchRecord {
                    index: row.get::<_, i64>(0)? as u64,
                    kickoff: NaiveDateTime::default(), // replaced below
                    home_team: row.get(2)?,
                    away_team: row.get(3)?,
                    home_goals: row.get::<_, i64>(4)? as u32,
                    away_goals: row.get::<_, i64>(5)? as u32,
                    home_ht_goals: row.get::<_, i64>(6)? as u32,
                    away_ht_goals: row.get::<_, i64>(7)? as u32,
                    home_shots: row.get::<_, i64>(8)? as u32,
                    away_shots: row.get::<_, i64>(9)? as u32,
                    home_shots_on_target: row.get::<_, i64>(10)? as u32,
                    away_shots_on_target: row.get::<_, i64>(11)? as u32,
                    odds: MarketOdds {
                        home: row.get(12)?,
                        draw: row.get(13)?,
                        away: row.get(14)?,
                        over_25: row.get(15)?,
                        under_25: row.get(16)?,
                    },
                },
                datetime,
                LeagueTrend {
                    over_percentage: row.get(17)?,
                    under_percentage: row.get(18)?,
                },
            ))
        })
        .context("query match rows")?;

    let mut out = Vec::new();
    for row in rows {
        let (mut record, datetime, trend) = row.context("decode match row")?;
        record.kickoff = parse_stored_datetime(&datetime)?;
        out.push(StoredMatchRow { record, trend });
    }
    Ok(out)
}

pub fn load_lag_rows(conn: &Connection, league: &str, window: usize) -> Result<Vec<LagRow>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                idx, datetime, home_team, away_team,
                hs_lags, fthg_lags, hthg_lags, hst_lags,
                as_lags, ftag_lags, htag_lags, ast_lags
            FROM lag_rows
            WHERE league = ?1 AND lag_window = ?2
            ORDER BY idx ASC
            "#,
        )
        .context("prepare lag load query")?;

    let rows = stmt
        .query_map(params![league, window as i64], |row| {
            Ok((
                row.get::<_, i64>(0)? as u64,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                [
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, String>(8)?,
                    row.get::<_, String>(9)?,
                    row.get::<_, String>(10)?,
                    row.get::<_, String>(11)?,
                ],
            ))
        })
        .context("query lag rows")?;

    let mut out = Vec::new();
    for row in rows {
        let (index, datetime, home_team, away_team, series) = row.context("decode lag row")?;
        out.push(LagRow {
            index,
            kickoff: parse_stored_datetime(&datetime)?,
            home_team,
            away_team,
            home: RoleLags {
                shots: decode_lags(&series[0])?,
                goals: decode_lags(&series[1])?,
                ht_goals: decode_lags(&series[2])?,
                shots_on_target: decode_lags(&series[3])?,
            },
            away: RoleLags {
                shots: decode_lags(&series[4])?,
                goals: decode_lags(&series[5])?,
                ht_goals: decode_lags(&series[6])?,
                shots_on_target: decode_lags(&series[7])?,
            },
        });
    }
    Ok(out)
}

pub fn load_labels(conn: &Connection, league: &str) -> Result<Vec<OverUnder>> {
    let mut stmt = conn
        .prepare("SELECT ftour FROM matches WHERE league = ?1 ORDER BY idx ASC")
        .context("prepare label query")?;
    let rows = stmt
        .query_map(params![league], |row| row.get::<_, String>(0))
        .context("query labels")?;

    let mut out = Vec::new();
    for row in rows {
        let raw = row.context("decode label row")?;
        let label = raw
            .chars()
            .next()
            .and_then(OverUnder::from_char)
            .ok_or_else(|| anyhow!("unrecognized stored label {raw:?}"))?;
        out.push(label);
    }
    Ok(out)
}

pub fn begin_ingest_run(
    conn: &Connection,
    league: &str,
    window: usize,
    rows_in_source: usize,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO ingest_runs(started_at, finished_at, league, lag_window, rows_in_source, matches_inserted, lag_rows_inserted, errors_json)
         VALUES (?1, NULL, ?2, ?3, ?4, 0, 0, '[]')",
        params![
            Utc::now().to_rfc3339(),
            league,
            window as i64,
            rows_in_source as i64
        ],
    )
    .context("insert ingest run")?;
    Ok(conn.last_insert_rowid())
}

pub fn finish_ingest_run(
    conn: &Connection,
    run_id: i64,
    matches_inserted: usize,
    lag_rows_inserted: usize,
    errors: &[String],
) -> Result<()> {
    let errors_json = serde_json::to_string(errors).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "UPDATE ingest_runs
         SET finished_at = ?1, matches_inserted = ?2, lag_rows_inserted = ?3, errors_json = ?4
         WHERE run_id = ?5",
        params![
            Utc::now().to_rfc3339(),
            matches_inserted as i64,
            lag_rows_inserted as i64,
            errors_json,
            run_id
        ],
    )
    .context("update ingest run")?;
    Ok(())
}

fn encode_lags(values: &[u32]) -> Result<String> {
    serde_json::to_string(values).context("serialize lag sequence")
}

fn decode_lags(raw: &str) -> Result<Vec<u32>> {
    serde_json::from_str(raw).with_context(|| format!("decode lag sequence {raw:?}"))
}

fn parse_stored_datetime(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, DATETIME_FMT)
        .with_context(|| format!("parse stored datetime {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lag_features::compute_lag_table;
    use crate::league_trends::compute_running_percentages;
    use crate::match_table::test_support::record;
    use crate::match_table::MatchTable;

    fn open_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn sample_table() -> MatchTable {
        let mut r0 = record(0, 1, "A", "B");
        r0.home_goals = 3;
        let r1 = record(1, 2, "B", "C");
        let r2 = record(2, 3, "C", "A");
        MatchTable::from_rows(vec![r0, r1, r2]).unwrap()
    }

    #[test]
    fn match_rows_round_trip_with_trends() {
        let mut conn = open_test_db();
        let table = sample_table();
        let trends = compute_running_percentages(&table);

        let inserted = insert_match_rows(&mut conn, "E0", table.rows(), &trends).unwrap();
        assert_eq!(inserted, 3);

        let loaded = load_match_rows(&conn, "E0").unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].record.home_team, "A");
        assert_eq!(loaded[0].record.kickoff, table.rows()[0].kickoff);
        assert_eq!(loaded[1].trend.over_percentage, 1.0);
        assert_eq!(loaded[2].trend.over_percentage, 0.5);

        // Other leagues stay invisible.
        assert!(load_match_rows(&conn, "D1").unwrap().is_empty());
    }

    #[test]
    fn reingest_inserts_nothing_and_keeps_first_write() {
        let mut conn = open_test_db();
        let table = sample_table();
        let trends = compute_running_percentages(&table);

        insert_match_rows(&mut conn, "E0", table.rows(), &trends).unwrap();

        // Re-run with a mutated copy: conflicts are ignored, originals win.
        let mut altered = table.rows().to_vec();
        altered[0].home_goals = 9;
        let inserted = insert_match_rows(&mut conn, "E0", &altered, &trends).unwrap();
        assert_eq!(inserted, 0);

        let loaded = load_match_rows(&conn, "E0").unwrap();
        assert_eq!(loaded[0].record.home_goals, 3);
    }

    #[test]
    fn lag_rows_round_trip_as_json() {
        let mut conn = open_test_db();
        let table = sample_table();
        let lags = compute_lag_table(&table, 4).unwrap();

        let inserted = insert_lag_rows(&mut conn, "E0", &lags).unwrap();
        assert_eq!(inserted, 3);

        let loaded = load_lag_rows(&conn, "E0", 4).unwrap();
        assert_eq!(loaded.len(), 3);
        for (a, b) in loaded.iter().zip(lags.rows()) {
            assert_eq!(a.home, b.home);
            assert_eq!(a.away, b.away);
        }

        // A different window keys a different table slice.
        assert!(load_lag_rows(&conn, "E0", 2).unwrap().is_empty());
    }

    #[test]
    fn labels_load_in_index_order() {
        let mut conn = open_test_db();
        let table = sample_table();
        let trends = compute_running_percentages(&table);
        insert_match_rows(&mut conn, "E0", table.rows(), &trends).unwrap();

        let labels = load_labels(&conn, "E0").unwrap();
        assert_eq!(labels[0], OverUnder::Over);
        assert_eq!(labels[1], OverUnder::Under);
    }

    #[test]
    fn ingest_runs_are_recorded() {
        let conn = open_test_db();
        let run_id = begin_ingest_run(&conn, "E0", 5, 380).unwrap();
        finish_ingest_run(&conn, run_id, 120, 120, &["late file".to_string()]).unwrap();

        let (finished, errors): (Option<String>, String) = conn
            .query_row(
                "SELECT finished_at, errors_json FROM ingest_runs WHERE run_id = ?1",
                params![run_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert!(finished.is_some());
        assert!(errors.contains("late file"));
    }
}
