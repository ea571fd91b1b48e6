use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use rayon::prelude::*;

use goalline::feature_store;
use goalline::ingest::{self, IngestConfig, MatchSource, DEFAULT_LAG_WINDOW};
use goalline::match_table::MatchTable;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let db_path = parse_path_arg("--db")
        .or_else(|| env_path("GOALLINE_DB"))
        .or_else(feature_store::default_db_path)
        .context("unable to resolve sqlite path (pass --db or set GOALLINE_DB)")?;

    let window = parse_usize_arg("--window")
        .or_else(|| env_usize("GOALLINE_LAG_WINDOW"))
        .unwrap_or(DEFAULT_LAG_WINDOW);

    let league_override = parse_string_arg("--league")
        .or_else(|| std::env::var("GOALLINE_LEAGUE").ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let mut sources: Vec<MatchSource> = parse_path_args("--csv")
        .into_iter()
        .map(MatchSource::Csv)
        .collect();
    sources.extend(parse_path_args("--parquet").into_iter().map(MatchSource::Parquet));
    if sources.is_empty() {
        return Err(anyhow!("no input files (pass --csv <path> and/or --parquet <path>)"));
    }
    if league_override.is_some() && sources.len() > 1 {
        return Err(anyhow!(
            "--league applies to a single input; with several files the league comes from each file name"
        ));
    }

    // Loading and validating the files is the expensive part and leagues
    // are disjoint, so fan that out; the store writes stay sequential on
    // one connection.
    let loaded: Vec<Result<(String, MatchTable, usize)>> = sources
        .par_iter()
        .map(|source| {
            let league = league_override
                .clone()
                .or_else(|| league_from_path(source))
                .ok_or_else(|| {
                    anyhow!("cannot infer league from {}", source.path().display())
                })?;
            let (table, skipped) = ingest::load_source(source)?;
            Ok((league, table, skipped))
        })
        .collect();

    let mut conn = feature_store::open_db(&db_path)?;
    let mut failures = 0usize;
    for result in loaded {
        match result {
            Ok((league, table, rows_skipped)) => {
                let config = IngestConfig {
                    league,
                    window,
                    db_path: db_path.clone(),
                };
                let summary = ingest::ingest_table(&mut conn, &config, &table, rows_skipped)?;

                println!("League {} ingest complete", summary.league);
                println!("DB: {}", summary.db_path.display());
                println!(
                    "Rows in source: {} (skipped: {})",
                    summary.rows_in_source, summary.rows_skipped
                );
                println!("Matches inserted: {}", summary.matches_inserted);
                println!("Lag rows inserted: {} (window {})", summary.lag_rows_inserted, window);
                if let Some(latest) = summary.latest_kickoff {
                    println!("Latest kickoff: {}", latest.format("%Y-%m-%d %H:%M"));
                }
                println!();
            }
            Err(err) => {
                failures += 1;
                eprintln!("ingest failed: {err:#}");
            }
        }
    }

    if failures > 0 {
        return Err(anyhow!("{failures} input file(s) failed to ingest"));
    }
    Ok(())
}

/// League code from the file stem, the way season sheets are distributed
/// (E0.csv, D1.csv, ...).
fn league_from_path(source: &MatchSource) -> Option<String> {
    let stem = source.path().file_stem()?.to_str()?.trim();
    if stem.is_empty() {
        return None;
    }
    Some(stem.to_ascii_uppercase())
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
    parse_path_args(name).into_iter().next()
}

fn parse_path_args(name: &str) -> Vec<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut out = Vec::new();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix(&format!("{name}="))
            && !path.trim().is_empty()
        {
            out.push(PathBuf::from(path.trim()));
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            out.push(PathBuf::from(next.trim()));
        }
    }
    out
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
