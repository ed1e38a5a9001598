use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::stats_api::GameLogRow;

pub const FEATURE_COUNT: usize = 7;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "rolling_avg_pts",
    "rolling_avg_reb",
    "rolling_avg_ast",
    "minutes_played",
    "fgm_pct",
    "ftm_pct",
    "fg3m_pct",
];

const ROLLING_WINDOW: usize = 5;
const DATE_FORMAT: &str = "%b %d, %Y";

/// Which box-score column a model is trained to predict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStat {
    Points,
    Assists,
    Rebounds,
}

impl TargetStat {
    pub fn label(&self) -> &'static str {
        match self {
            TargetStat::Points => "Points",
            TargetStat::Assists => "Assists",
            TargetStat::Rebounds => "Rebounds",
        }
    }

    pub fn of(&self, row: &EngineeredRow) -> f64 {
        match self {
            TargetStat::Points => row.pts,
            TargetStat::Assists => row.ast,
            TargetStat::Rebounds => row.reb,
        }
    }

    pub fn next(&self) -> TargetStat {
        match self {
            TargetStat::Points => TargetStat::Assists,
            TargetStat::Assists => TargetStat::Rebounds,
            TargetStat::Rebounds => TargetStat::Points,
        }
    }

    pub fn prev(&self) -> TargetStat {
        match self {
            TargetStat::Points => TargetStat::Rebounds,
            TargetStat::Assists => TargetStat::Points,
            TargetStat::Rebounds => TargetStat::Assists,
        }
    }
}

/// One chronologically ordered game with every derived column defined.
#[derive(Debug, Clone)]
pub struct EngineeredRow {
    pub date: NaiveDate,
    pub home: bool,
    pub pts: f64,
    pub reb: f64,
    pub ast: f64,
    /// Expanding means from game 1 through this game.
    pub avg_pts: f64,
    pub avg_ast: f64,
    pub avg_reb: f64,
    /// The seven predictors, ordered as [`FEATURE_NAMES`].
    pub features: [f64; FEATURE_COUNT],
}

/// Engineer the feature table for one player's combined game log.
///
/// Rows are sorted ascending by date first; rolling means then run over
/// exactly the trailing five games in chronological order, so the first four
/// chronological rows never survive. Rows where a shooting ratio is
/// undefined (zero attempts) are dropped as well.
pub fn build_features(rows: &[GameLogRow]) -> Result<Vec<EngineeredRow>> {
    let mut dated = Vec::with_capacity(rows.len());
    for row in rows {
        let date = NaiveDate::parse_from_str(row.game_date.trim(), DATE_FORMAT)
            .with_context(|| format!("unparseable game date {:?}", row.game_date))?;
        dated.push((date, row));
    }
    dated.sort_by_key(|(date, _)| *date);

    let mut out = Vec::with_capacity(dated.len().saturating_sub(ROLLING_WINDOW - 1));
    let mut sum_pts = 0.0;
    let mut sum_reb = 0.0;
    let mut sum_ast = 0.0;

    for (i, (date, row)) in dated.iter().enumerate() {
        sum_pts += row.pts;
        sum_reb += row.reb;
        sum_ast += row.ast;
        let played = (i + 1) as f64;

        if i + 1 < ROLLING_WINDOW {
            continue;
        }
        let window = &dated[i + 1 - ROLLING_WINDOW..=i];
        let roll_pts = window.iter().map(|(_, r)| r.pts).sum::<f64>() / ROLLING_WINDOW as f64;
        let roll_reb = window.iter().map(|(_, r)| r.reb).sum::<f64>() / ROLLING_WINDOW as f64;
        let roll_ast = window.iter().map(|(_, r)| r.ast).sum::<f64>() / ROLLING_WINDOW as f64;

        let Some(fgm_pct) = ratio(row.fgm, row.fga) else {
            continue;
        };
        let Some(ftm_pct) = ratio(row.ftm, row.fta) else {
            continue;
        };
        let Some(fg3m_pct) = ratio(row.fg3m, row.fg3a) else {
            continue;
        };

        let features = [
            roll_pts, roll_reb, roll_ast, row.min, fgm_pct, ftm_pct, fg3m_pct,
        ];
        if features.iter().any(|v| !v.is_finite()) {
            continue;
        }

        out.push(EngineeredRow {
            date: *date,
            home: !row.matchup.contains('@'),
            pts: row.pts,
            reb: row.reb,
            ast: row.ast,
            avg_pts: sum_pts / played,
            avg_ast: sum_ast / played,
            avg_reb: sum_reb / played,
            features,
        });
    }
    Ok(out)
}

/// Column means over all engineered rows: the single-row "average game"
/// input used at prediction time.
pub fn mean_feature_row(rows: &[EngineeredRow]) -> [f64; FEATURE_COUNT] {
    let mut mean = [0.0; FEATURE_COUNT];
    if rows.is_empty() {
        return mean;
    }
    for row in rows {
        for (acc, v) in mean.iter_mut().zip(row.features.iter()) {
            *acc += v;
        }
    }
    for acc in &mut mean {
        *acc /= rows.len() as f64;
    }
    mean
}

fn ratio(made: f64, attempted: f64) -> Option<f64> {
    if attempted == 0.0 {
        return None;
    }
    Some(made / attempted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats_api::GameLogRow;

    fn log_row(date: &str, matchup: &str, pts: f64) -> GameLogRow {
        GameLogRow {
            game_date: date.to_string(),
            matchup: matchup.to_string(),
            min: 30.0,
            pts,
            reb: 5.0,
            ast: 4.0,
            fgm: 8.0,
            fga: 16.0,
            fg_pct: 0.5,
            fg3m: 2.0,
            fg3a: 6.0,
            fg3_pct: 0.333,
            ftm: 4.0,
            fta: 5.0,
            ft_pct: 0.8,
            tov: 2.0,
            pf: 3.0,
        }
    }

    fn sample_log(n: usize) -> Vec<GameLogRow> {
        let base = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        (0..n)
            .map(|i| {
                let matchup = if i % 2 == 0 { "LAL vs. BOS" } else { "LAL @ BOS" };
                let date = base + chrono::Duration::days(i as i64);
                log_row(&date.format(DATE_FORMAT).to_string(), matchup, (10 + i) as f64)
            })
            .collect()
    }

    #[test]
    fn first_four_chronological_rows_are_dropped() {
        let rows = build_features(&sample_log(8)).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2025, 1, 5).unwrap());
    }

    #[test]
    fn rolling_mean_uses_exactly_trailing_five() {
        let rows = build_features(&sample_log(7)).unwrap();
        // Points are 10..=16 by date; the first emitted row covers 10..=14.
        assert!((rows[0].features[0] - 12.0).abs() < 1e-9);
        // The last row covers 12..=16.
        assert!((rows.last().unwrap().features[0] - 14.0).abs() < 1e-9);
    }

    #[test]
    fn rolling_is_chronological_even_for_shuffled_input() {
        let mut log = sample_log(7);
        log.reverse();
        let rows = build_features(&log).unwrap();
        assert!((rows[0].features[0] - 12.0).abs() < 1e-9);
    }

    #[test]
    fn expanding_mean_starts_at_game_one() {
        let rows = build_features(&sample_log(5)).unwrap();
        assert_eq!(rows.len(), 1);
        // Mean of 10..=14 over the five games played so far.
        assert!((rows[0].avg_pts - 12.0).abs() < 1e-9);
    }

    #[test]
    fn zero_attempt_rows_are_dropped() {
        let mut log = sample_log(6);
        log[5].fta = 0.0;
        let rows = build_features(&log).unwrap();
        // Row 5 (index 4) survives; row 6 is dropped for the 0/0 ratio.
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn shooting_ratios_are_made_over_attempted() {
        let rows = build_features(&sample_log(5)).unwrap();
        let row = &rows[0];
        assert!((row.features[4] - 0.5).abs() < 1e-9);
        assert!((row.features[5] - 0.8).abs() < 1e-9);
        assert!((row.features[6] - (2.0 / 6.0)).abs() < 1e-9);
    }

    #[test]
    fn home_away_comes_from_matchup_text() {
        let rows = build_features(&sample_log(6)).unwrap();
        // Date 5 (index 4 of the input) is "vs.", date 6 is "@".
        assert!(rows[0].home);
        assert!(!rows[1].home);
    }

    #[test]
    fn no_emitted_row_has_undefined_values() {
        let rows = build_features(&sample_log(40)).unwrap();
        assert!(
            rows.iter()
                .all(|r| r.features.iter().all(|v| v.is_finite()))
        );
    }

    #[test]
    fn unparseable_date_is_an_error() {
        let mut log = sample_log(5);
        log[2].game_date = "not a date".to_string();
        assert!(build_features(&log).is_err());
    }

    #[test]
    fn mean_feature_row_averages_columns() {
        let rows = build_features(&sample_log(9)).unwrap();
        let mean = mean_feature_row(&rows);
        let expect: f64 =
            rows.iter().map(|r| r.features[0]).sum::<f64>() / rows.len() as f64;
        assert!((mean[0] - expect).abs() < 1e-9);
        assert!((mean[3] - 30.0).abs() < 1e-9);
    }
}
