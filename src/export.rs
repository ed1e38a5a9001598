use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::batch::PlayerOutcome;
use crate::features::TargetStat;
use crate::state::SideBoard;

pub struct ExportReport {
    pub predictions: usize,
    pub skips: usize,
}

/// Write the current prediction board to an .xlsx workbook: one sheet of
/// successful predictions, one of skipped players.
pub fn export_board(path: &Path, sides: &[SideBoard], target: TargetStat) -> Result<ExportReport> {
    let mut prediction_rows = vec![vec![
        "Team".to_string(),
        "Opponent".to_string(),
        "Player".to_string(),
        format!("Predicted {}", target.label()),
        "RMSE".to_string(),
        "Season Avg".to_string(),
        "Career Avg vs Opp".to_string(),
    ]];
    let mut skip_rows = vec![vec![
        "Team".to_string(),
        "Player".to_string(),
        "Reason".to_string(),
    ]];
    let mut total_rows = vec![vec![
        "Team".to_string(),
        "Opponent".to_string(),
        "Total Predicted".to_string(),
        "Roster".to_string(),
    ]];

    for side in sides {
        for outcome in &side.outcomes {
            match outcome {
                PlayerOutcome::Predicted(p) => prediction_rows.push(vec![
                    side.team.abbr.to_string(),
                    side.opponent.abbr.to_string(),
                    p.name.clone(),
                    format!("{:.1}", p.predicted),
                    format!("{:.2}", p.rmse),
                    format!("{:.1}", p.season_avg),
                    p.career_avg_vs_opp
                        .map(|avg| format!("{avg:.1}"))
                        .unwrap_or_else(|| "No data".to_string()),
                ]),
                PlayerOutcome::Skipped { name, reason } => skip_rows.push(vec![
                    side.team.abbr.to_string(),
                    name.clone(),
                    reason.describe(),
                ]),
            }
        }
        total_rows.push(vec![
            side.team.abbr.to_string(),
            side.opponent.abbr.to_string(),
            format!("{:.1}", side.total),
            side.roster.to_string(),
        ]);
    }

    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Predictions").context("name sheet")?;
    write_rows(sheet, &prediction_rows)?;

    let sheet = workbook.add_worksheet();
    sheet.set_name("Skips").context("name sheet")?;
    write_rows(sheet, &skip_rows)?;

    let sheet = workbook.add_worksheet();
    sheet.set_name("Totals").context("name sheet")?;
    write_rows(sheet, &total_rows)?;

    workbook
        .save(path)
        .with_context(|| format!("save workbook {}", path.display()))?;

    Ok(ExportReport {
        predictions: prediction_rows.len() - 1,
        skips: skip_rows.len() - 1,
    })
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
