use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::feature_matrix::build_training_matrix;
use crate::feature_store::StoredMatchRow;
use crate::lag_features::{LagRow, LagTable, LAG_SERIES};
use crate::league_trends::LeagueTrend;
use crate::match_table::MatchTable;

pub struct ExportReport {
    pub matches: usize,
    pub lag_rows: usize,
    pub matrix_rows: usize,
}

/// Writes the engineered tables for one league to an .xlsx workbook:
/// a Matches sheet (raw metrics, odds, label, trend columns), a Lags sheet
/// (one bracketed sequence per series column), and, when every match has a
/// lag row for `window`, the flattened Training sheet.
pub fn export_feature_tables(
    path: &Path,
    window: usize,
    matches: &[StoredMatchRow],
    lag_rows: &[LagRow],
) -> Result<ExportReport> {
    let mut match_rows = vec![vec![
        "Index".to_string(),
        "Kickoff".to_string(),
        "Home".to_string(),
        "Away".to_string(),
        "FTHG".to_string(),
        "FTAG".to_string(),
        "HTHG".to_string(),
        "HTAG".to_string(),
        "HS".to_string(),
        "AS".to_string(),
        "HST".to_string(),
        "AST".to_string(),
        "AvgH".to_string(),
        "AvgD".to_string(),
        "AvgA".to_string(),
        "Avg>2.5".to_string(),
        "Avg<2.5".to_string(),
        "O/U".to_string(),
        "League Over %".to_string(),
        "League Under %".to_string(),
    ]];
    for row in matches {
        let m = &row.record;
        match_rows.push(vec![
            m.index.to_string(),
            m.kickoff.format("%Y-%m-%d %H:%M").to_string(),
            m.home_team.clone(),
            m.away_team.clone(),
            m.home_goals.to_string(),
            m.away_goals.to_string(),
            m.home_ht_goals.to_string(),
            m.away_ht_goals.to_string(),
            m.home_shots.to_string(),
            m.away_shots.to_string(),
            m.home_shots_on_target.to_string(),
            m.away_shots_on_target.to_string(),
            format!("{:.2}", m.odds.home),
            format!("{:.2}", m.odds.draw),
            format!("{:.2}", m.odds.away),
            format!("{:.2}", m.odds.over_25),
            format!("{:.2}", m.odds.under_25),
            m.over_under().as_char().to_string(),
            format!("{:.4}", row.trend.over_percentage),
            format!("{:.4}", row.trend.under_percentage),
        ]);
    }

    let mut lag_sheet_rows = vec![{
        let mut header = vec![
            "Index".to_string(),
            "Kickoff".to_string(),
            "Home".to_string(),
            "Away".to_string(),
        ];
        header.extend(LAG_SERIES.iter().map(|s| s.to_string()));
        header
    }];
    for row in lag_rows {
        let mut cells = vec![
            row.index.to_string(),
            row.kickoff.format("%Y-%m-%d %H:%M").to_string(),
            row.home_team.clone(),
            row.away_team.clone(),
        ];
        for series in row.home.series().into_iter().chain(row.away.series()) {
            cells.push(format_sequence(series));
        }
        lag_sheet_rows.push(cells);
    }

    let training_rows = if !matches.is_empty() && lag_rows.len() == matches.len() {
        training_sheet_rows(window, matches, lag_rows)?
    } else {
        Vec::new()
    };

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Matches")?;
        write_rows(sheet, &match_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Lags")?;
        write_rows(sheet, &lag_sheet_rows)?;
    }
    if !training_rows.is_empty() {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Training")?;
        write_rows(sheet, &training_rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        matches: matches.len(),
        lag_rows: lag_rows.len(),
        matrix_rows: training_rows.len().saturating_sub(1),
    })
}

/// Flattened classifier view rebuilt from the stored tables: one header
/// row, then one row per match with empty cells where a lag slot has no
/// history yet.
fn training_sheet_rows(
    window: usize,
    matches: &[StoredMatchRow],
    lag_rows: &[LagRow],
) -> Result<Vec<Vec<String>>> {
    let records = matches.iter().map(|r| r.record.clone()).collect();
    let table = MatchTable::from_rows(records).context("stored match rows lost their ordering")?;
    let trends: Vec<LeagueTrend> = matches.iter().map(|r| r.trend).collect();
    let lags = LagTable::from_rows(window, lag_rows.to_vec())
        .context("stored lag rows disagree with window")?;
    let matrix =
        build_training_matrix(&table, &trends, &lags).context("flatten stored feature tables")?;

    let mut header = vec![
        "Index".to_string(),
        "Kickoff".to_string(),
        "Home".to_string(),
        "Away".to_string(),
        "Label".to_string(),
    ];
    header.extend(matrix.column_names.iter().cloned());

    let mut out = vec![header];
    for row in &matrix.rows {
        let mut cells = vec![
            row.index.to_string(),
            row.kickoff.format("%Y-%m-%d %H:%M").to_string(),
            row.home_team.clone(),
            row.away_team.clone(),
            row.label.to_string(),
        ];
        cells.extend(
            row.features
                .iter()
                .map(|v| v.map(|x| format!("{x}")).unwrap_or_default()),
        );
        out.push(cells);
    }
    Ok(out)
}

fn format_sequence(values: &[u32]) -> String {
    let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
