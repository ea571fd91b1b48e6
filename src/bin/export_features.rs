use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use goalline::feature_export;
use goalline::feature_store;
use goalline::ingest::DEFAULT_LAG_WINDOW;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let db_path = parse_path_arg("--db")
        .or_else(|| env_path("GOALLINE_DB"))
        .or_else(feature_store::default_db_path)
        .context("unable to resolve sqlite path (pass --db or set GOALLINE_DB)")?;

    let league = parse_string_arg("--league")
        .or_else(|| std::env::var("GOALLINE_LEAGUE").ok())
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .context("no league selected (pass --league or set GOALLINE_LEAGUE)")?;

    let window = parse_usize_arg("--window")
        .or_else(|| env_usize("GOALLINE_LAG_WINDOW"))
        .unwrap_or(DEFAULT_LAG_WINDOW);

    let out_path = parse_path_arg("--out")
        .unwrap_or_else(|| PathBuf::from(format!("goalline_{}.xlsx", league.to_ascii_lowercase())));

    let conn = feature_store::open_db(&db_path)?;
    let matches = feature_store::load_match_rows(&conn, &league)?;
    if matches.is_empty() {
        return Err(anyhow!(
            "no stored matches for league {league} in {}",
            db_path.display()
        ));
    }
    let lag_rows = feature_store::load_lag_rows(&conn, &league, window)?;

    let report = feature_export::export_feature_tables(&out_path, window, &matches, &lag_rows)?;

    println!("Exported league {league} feature tables");
    println!("DB: {}", db_path.display());
    println!("Workbook: {}", out_path.display());
    println!("Matches: {}", report.matches);
    println!("Lag rows: {} (window {window})", report.lag_rows);
    if report.matrix_rows > 0 {
        println!("Training rows: {}", report.matrix_rows);
    } else {
        println!("Training sheet skipped (no complete lag coverage for window {window})");
    }

    Ok(())
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_path_arg(name: &str) -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix(&format!("{name}="))
            && !path.trim().is_empty()
        {
            return Some(PathBuf::from(path.trim()));
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(PathBuf::from(next.trim()));
        }
    }
    None
}

fn parse_string_arg(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}="))
            && !raw.trim().is_empty()
        {
            return Some(raw.trim().to_string());
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn parse_usize_arg(name: &str) -> Option<usize> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}="))
            && let Ok(v) = raw.trim().parse::<usize>()
        {
            return Some(v);
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && let Ok(v) = next.trim().parse::<usize>()
        {
            return Some(v);
        }
    }
    None
}
