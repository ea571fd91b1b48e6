use chrono::NaiveDate;
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use goalline::feature_matrix::build_training_matrix;
use goalline::lag_features::compute_lag_table;
use goalline::league_trends::compute_running_percentages;
use goalline::match_table::{MarketOdds, MatchRecord, MatchTable};

/// Full double round-robin over 20 teams (380 fixtures), the size of one
/// Premier League season. Values derive from the index so runs are stable.
fn season_table() -> MatchTable {
    let teams: Vec<String> = (0..20).map(|i| format!("Team {i:02}")).collect();
    let mut rows = Vec::new();
    let mut index = 0u64;
    for round in 0..2u32 {
        for i in 0..teams.len() {
            for j in 0..teams.len() {
                if i == j || ((round == 0) == (i < j)) {
                    continue;
                }
                let kickoff = NaiveDate::from_ymd_opt(2024, 8, 1)
                    .unwrap()
                    .checked_add_days(chrono::Days::new(index))
                    .unwrap()
                    .and_hms_opt(15, 0, 0)
                    .unwrap();
                rows.push(MatchRecord {
                    index,
                    kickoff,
                    home_team: teams[i].clone(),
                    away_team: teams[j].clone(),
                    home_goals: (index % 5) as u32,
                    away_goals: ((index / 3) % 4) as u32,
                    home_ht_goals: (index % 2) as u32,
                    away_ht_goals: 0,
                    home_shots: 5 + (index % 17) as u32,
                    away_shots: 4 + (index % 11) as u32,
                    home_shots_on_target: 1 + (index % 7) as u32,
                    away_shots_on_target: 1 + (index % 6) as u32,
                    odds: MarketOdds {
                        home: 1.50 + (index % 20) as f64 * 0.15,
                        draw: 3.40,
                        away: 4.10,
                        over_25: 1.88,
                        under_25: 1.92,
                    },
                });
                index += 1;
            }
        }
    }
    MatchTable::from_rows(rows).expect("synthetic season is ordered")
}

fn bench_running_percentages(c: &mut Criterion) {
    let table = season_table();
    c.bench_function("running_percentages_season", |b| {
        b.iter(|| {
            let trends = compute_running_percentages(black_box(&table));
            black_box(trends.len());
        })
    });
}

fn bench_lag_table(c: &mut Criterion) {
    let table = season_table();
    c.bench_function("lag_table_season_w5", |b| {
        b.iter(|| {
            let lags = compute_lag_table(black_box(&table), 5).unwrap();
            black_box(lags.len());
        })
    });
}

fn bench_training_matrix(c: &mut Criterion) {
    let table = season_table();
    let trends = compute_running_percentages(&table);
    let lags = compute_lag_table(&table, 5).unwrap();
    c.bench_function("training_matrix_season_w5", |b| {
        b.iter(|| {
            let matrix =
                build_training_matrix(black_box(&table), black_box(&trends), black_box(&lags))
                    .unwrap();
            black_box(matrix.rows.len());
        })
    });
}

criterion_group!(
    perf,
    bench_running_percentages,
    bench_lag_table,
    bench_training_matrix
);
criterion_main!(perf);
