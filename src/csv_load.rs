use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

use crate::error::FeatureError;
use crate::match_table::{MarketOdds, MatchRecord, MatchTable};

/// Columns that must be present verbatim in the header row.
const REQUIRED_COLUMNS: [&str; 11] = [
    "Date", "HomeTeam", "AwayTeam", "FTHG", "FTAG", "HTHG", "HTAG", "HS", "AS", "HST", "AST",
];

/// Market-average odds columns with their single-bookmaker fallbacks.
const ODDS_COLUMNS: [(&str, &str); 5] = [
    ("AvgH", "B365H"),
    ("AvgD", "B365D"),
    ("AvgA", "B365A"),
    ("Avg>2.5", "B365>2.5"),
    ("Avg<2.5", "B365<2.5"),
];

/// Raw row as published by football-data.co.uk. Sheets carry many more
/// columns than we read; everything is optional here and validated after
/// decoding so missing data can be reported by column name.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRow {
    #[serde(rename = "Date")]
    date: Option<String>,
    #[serde(rename = "Time")]
    time: Option<String>,
    #[serde(rename = "HomeTeam")]
    home_team: Option<String>,
    #[serde(rename = "AwayTeam")]
    away_team: Option<String>,
    #[serde(rename = "FTHG")]
    full_time_home_goals: Option<u32>,
    #[serde(rename = "FTAG")]
    full_time_away_goals: Option<u32>,
    #[serde(rename = "HTHG")]
    half_time_home_goals: Option<u32>,
    #[serde(rename = "HTAG")]
    half_time_away_goals: Option<u32>,
    #[serde(rename = "HS")]
    home_shots: Option<u32>,
    #[serde(rename = "AS")]
    away_shots: Option<u32>,
    #[serde(rename = "HST")]
    home_shots_on_target: Option<u32>,
    #[serde(rename = "AST")]
    away_shots_on_target: Option<u32>,
    #[serde(rename = "AvgH")]
    avg_home: Option<f64>,
    #[serde(rename = "AvgD")]
    avg_draw: Option<f64>,
    #[serde(rename = "AvgA")]
    avg_away: Option<f64>,
    #[serde(rename = "Avg>2.5")]
    avg_over: Option<f64>,
    #[serde(rename = "Avg<2.5")]
    avg_under: Option<f64>,
    #[serde(rename = "B365H")]
    b365_home: Option<f64>,
    #[serde(rename = "B365D")]
    b365_draw: Option<f64>,
    #[serde(rename = "B365A")]
    b365_away: Option<f64>,
    #[serde(rename = "B365>2.5")]
    b365_over: Option<f64>,
    #[serde(rename = "B365<2.5")]
    b365_under: Option<f64>,
}

impl RawRow {
    fn is_blank(&self) -> bool {
        self.home_team.as_deref().unwrap_or("").trim().is_empty()
            && self.date.as_deref().unwrap_or("").trim().is_empty()
    }
}

/// Loads a league's season sheet into a validated match table.
///
/// Rows are sorted by kickoff (ties broken by team names) before sequence
/// indices are assigned, so the resulting index is always monotonic with
/// datetime even when the file interleaves postponed fixtures.
pub fn load_matches_csv(path: &Path) -> Result<MatchTable, FeatureError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| FeatureError::data(format!("open csv {}: {e}", path.display())))?;

    check_headers(&mut reader, path)?;

    let mut rows: Vec<MatchRecord> = Vec::new();
    for (i, result) in reader.deserialize::<RawRow>().enumerate() {
        let line = i + 2; // header occupies line 1
        let raw: RawRow = result
            .map_err(|e| FeatureError::data(format!("{} line {line}: {e}", path.display())))?;
        if raw.is_blank() {
            continue;
        }
        rows.push(decode_row(raw, line, path)?);
    }

    MatchTable::from_unordered_rows(rows)
}

fn check_headers(reader: &mut csv::Reader<std::fs::File>, path: &Path) -> Result<(), FeatureError> {
    let headers = reader
        .headers()
        .map_err(|e| FeatureError::data(format!("read csv headers {}: {e}", path.display())))?;
    let present: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
    let has = |name: &str| present.iter().any(|h| h == name);

    let mut missing: Vec<&str> = Vec::new();
    for col in REQUIRED_COLUMNS {
        if !has(col) {
            missing.push(col);
        }
    }
    for (avg, fallback) in ODDS_COLUMNS {
        if !has(avg) && !has(fallback) {
            missing.push(avg);
        }
    }
    if !missing.is_empty() {
        return Err(FeatureError::data(format!(
            "{} is missing required columns: {}",
            path.display(),
            missing.join(", ")
        )));
    }
    Ok(())
}

fn decode_row(raw: RawRow, line: usize, path: &Path) -> Result<MatchRecord, FeatureError> {
    let missing_cell = |col: &str| {
        FeatureError::data(format!("{} line {line}: empty {col} cell", path.display()))
    };

    let home_team = raw
        .home_team
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing_cell("HomeTeam"))?
        .to_string();
    let away_team = raw
        .away_team
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing_cell("AwayTeam"))?
        .to_string();

    let kickoff = parse_kickoff(
        raw.date.as_deref().ok_or_else(|| missing_cell("Date"))?,
        raw.time.as_deref(),
    )
    .ok_or_else(|| {
        FeatureError::data(format!(
            "{} line {line}: unparseable kickoff for {home_team} vs {away_team}",
            path.display()
        ))
    })?;

    let odds = MarketOdds {
        home: raw
            .avg_home
            .or(raw.b365_home)
            .ok_or_else(|| missing_cell("AvgH"))?,
        draw: raw
            .avg_draw
            .or(raw.b365_draw)
            .ok_or_else(|| missing_cell("AvgD"))?,
        away: raw
            .avg_away
            .or(raw.b365_away)
            .ok_or_else(|| missing_cell("AvgA"))?,
        over_25: raw
            .avg_over
            .or(raw.b365_over)
            .ok_or_else(|| missing_cell("Avg>2.5"))?,
        under_25: raw
            .avg_under
            .or(raw.b365_under)
            .ok_or_else(|| missing_cell("Avg<2.5"))?,
    };

    Ok(MatchRecord {
        index: 0, // assigned after sorting
        kickoff,
        home_team,
        away_team,
        home_goals: raw.full_time_home_goals.ok_or_else(|| missing_cell("FTHG"))?,
        away_goals: raw.full_time_away_goals.ok_or_else(|| missing_cell("FTAG"))?,
        home_ht_goals: raw.half_time_home_goals.ok_or_else(|| missing_cell("HTHG"))?,
        away_ht_goals: raw.half_time_away_goals.ok_or_else(|| missing_cell("HTAG"))?,
        home_shots: raw.home_shots.ok_or_else(|| missing_cell("HS"))?,
        away_shots: raw.away_shots.ok_or_else(|| missing_cell("AS"))?,
        home_shots_on_target: raw.home_shots_on_target.ok_or_else(|| missing_cell("HST"))?,
        away_shots_on_target: raw.away_shots_on_target.ok_or_else(|| missing_cell("AST"))?,
        odds,
    })
}

fn parse_kickoff(date: &str, time: Option<&str>) -> Option<NaiveDateTime> {
    let date = date.trim();
    // %Y would happily read "24" as the year 24, so pick the format from
    // the year segment's width instead of trying both.
    let year_len = date.rsplit('/').next().map(str::len).unwrap_or(0);
    let date_fmt = if year_len == 2 { "%d/%m/%y" } else { "%d/%m/%Y" };
    let parsed_date = NaiveDate::parse_from_str(date, date_fmt).ok()?;
    let parsed_time = match time.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => NaiveTime::parse_from_str(t, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M:%S"))
            .ok()?,
        None => NaiveTime::from_hms_opt(0, 0, 0)?,
    };
    Some(parsed_date.and_time(parsed_time))
}
