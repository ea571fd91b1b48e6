use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::{Row, RowAccessor};

use crate::error::FeatureError;
use crate::match_table::{MarketOdds, MatchRecord, MatchTable};

/// Leaf column names expected in a parquet match dataset. Same naming as
/// the feature store's `matches` table.
const COLUMNS: [&str; 16] = [
    "datetime",
    "home_team",
    "away_team",
    "fthg",
    "ftag",
    "hthg",
    "htag",
    "hs",
    "as",
    "hst",
    "ast",
    "avgh",
    "avgd",
    "avga",
    "avg_gt_2_5",
    "avg_lt_2_5",
];

/// A loaded table plus how many rows failed to decode. External parquet
/// dumps are messy; undecodable rows are dropped rather than failing the
/// batch, and the caller decides whether the skip count is acceptable.
#[derive(Debug)]
pub struct ParquetLoad {
    pub table: MatchTable,
    pub rows_skipped: usize,
}

struct ColumnMap {
    idx: [usize; 16],
}

impl ColumnMap {
    fn get(&self, name: &str) -> usize {
        let pos = COLUMNS.iter().position(|c| *c == name).expect("known column");
        self.idx[pos]
    }
}

pub fn load_matches_parquet(path: &Path) -> Result<ParquetLoad, FeatureError> {
    let file = fs::File::open(path)
        .map_err(|e| FeatureError::data(format!("open parquet {}: {e}", path.display())))?;
    let reader = SerializedFileReader::new(file)
        .map_err(|e| FeatureError::data(format!("read parquet {}: {e}", path.display())))?;

    let columns = resolve_columns(&reader, path)?;

    let iter = reader
        .get_row_iter(None)
        .map_err(|e| FeatureError::data(format!("iterate parquet {}: {e}", path.display())))?;

    let mut rows = Vec::new();
    let mut rows_skipped = 0usize;
    for row in iter {
        let Ok(row) = row else {
            rows_skipped += 1;
            continue;
        };
        match decode_row(&row, &columns) {
            Some(record) => rows.push(record),
            None => rows_skipped += 1,
        }
    }

    let table = MatchTable::from_unordered_rows(rows)?;
    Ok(ParquetLoad {
        table,
        rows_skipped,
    })
}

fn resolve_columns(
    reader: &SerializedFileReader<fs::File>,
    path: &Path,
) -> Result<ColumnMap, FeatureError> {
    let schema = reader.metadata().file_metadata().schema_descr();
    let names: Vec<String> = (0..schema.num_columns())
        .map(|i| schema.column(i).name().to_string())
        .collect();

    let mut idx = [0usize; 16];
    let mut missing = Vec::new();
    for (pos, wanted) in COLUMNS.iter().enumerate() {
        match names.iter().position(|n| n == wanted) {
            Some(found) => idx[pos] = found,
            None => missing.push(*wanted),
        }
    }
    if !missing.is_empty() {
        return Err(FeatureError::data(format!(
            "{} is missing required columns: {}",
            path.display(),
            missing.join(", ")
        )));
    }
    Ok(ColumnMap { idx })
}

fn decode_row(row: &Row, columns: &ColumnMap) -> Option<MatchRecord> {
    let home_team = row.get_string(columns.get("home_team")).ok()?.trim().to_string();
    let away_team = row.get_string(columns.get("away_team")).ok()?.trim().to_string();
    if home_team.is_empty() || away_team.is_empty() {
        return None;
    }

    let kickoff = parse_datetime(row.get_string(columns.get("datetime")).ok()?)?;

    let odds = MarketOdds {
        home: read_num(row, columns.get("avgh"))?,
        draw: read_num(row, columns.get("avgd"))?,
        away: read_num(row, columns.get("avga"))?,
        over_25: read_num(row, columns.get("avg_gt_2_5"))?,
        under_25: read_num(row, columns.get("avg_lt_2_5"))?,
    };

    Some(MatchRecord {
        index: 0, // assigned after sorting
        kickoff,
        home_team,
        away_team,
        home_goals: read_count(row, columns.get("fthg"))?,
        away_goals: read_count(row, columns.get("ftag"))?,
        home_ht_goals: read_count(row, columns.get("hthg"))?,
        away_ht_goals: read_count(row, columns.get("htag"))?,
        home_shots: read_count(row, columns.get("hs"))?,
        away_shots: read_count(row, columns.get("as"))?,
        home_shots_on_target: read_count(row, columns.get("hst"))?,
        away_shots_on_target: read_count(row, columns.get("ast"))?,
        odds,
    })
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    None
}

fn read_num(row: &Row, idx: usize) -> Option<f64> {
    if let Ok(v) = row.get_double(idx) {
        return Some(v);
    }
    if let Ok(v) = row.get_float(idx) {
        return Some(v as f64);
    }
    if let Ok(v) = row.get_long(idx) {
        return Some(v as f64);
    }
    if let Ok(v) = row.get_int(idx) {
        return Some(v as f64);
    }
    None
}

fn read_count(row: &Row, idx: usize) -> Option<u32> {
    let v = read_num(row, idx)?;
    if !v.is_finite() || v < 0.0 {
        return None;
    }
    Some(v as u32)
}

#[cfg(test)]
mod tests {
    use super::parse_datetime;

    #[test]
    fn accepts_common_timestamp_forms() {
        assert!(parse_datetime("2024-08-17 15:00:00").is_some());
        assert!(parse_datetime("2024-08-17T15:00:00").is_some());
        assert!(parse_datetime("2024-08-17 15:00").is_some());
        assert!(parse_datetime("17/08/2024").is_none());
    }
}
