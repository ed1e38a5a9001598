use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use hoops_terminal::career_db::{self, CareerLogRow};
use hoops_terminal::stats_api::{self, TeamInfo};

const DEFAULT_SEASONS_BACK: usize = 5;
// Rate-limit pause between provider calls.
const CALL_GAP_SLEEP_SECS: u64 = 1;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let teams = parse_teams_arg()?;
    if teams.is_empty() {
        return Err(anyhow!("no teams resolved for ingest"));
    }
    let season = parse_string_arg("--season").unwrap_or_else(stats_api::current_season_from_env);
    let seasons_back = parse_usize_arg("--seasons-back")
        .unwrap_or(DEFAULT_SEASONS_BACK)
        .max(1);
    let db_path = parse_db_path_arg()
        .or_else(career_db::default_db_path)
        .context("unable to resolve sqlite path")?;

    let seasons = season_chain(&season, seasons_back);
    eprintln!(
        "[INFO] Ingesting {} teams across seasons {:?} into {}",
        teams.len(),
        seasons,
        db_path.display()
    );

    let mut conn = career_db::open_db(&db_path)?;
    let mut players_processed = 0usize;
    let mut rows_upserted = 0usize;
    let mut errors: Vec<String> = Vec::new();

    for team in &teams {
        let roster = match stats_api::fetch_team_roster(team, &season) {
            Ok(roster) => roster,
            Err(err) => {
                eprintln!("[WARN] Roster fetch failed for {}: {err:#}", team.abbr);
                errors.push(format!("{}: {err:#}", team.abbr));
                continue;
            }
        };
        eprintln!("[INFO] {}: {} players", team.abbr, roster.len());

        for slot in &roster {
            let mut rows: Vec<CareerLogRow> = Vec::new();
            for fetch_season in &seasons {
                match stats_api::fetch_player_game_log(slot.player_id, fetch_season) {
                    Ok(log) => rows.extend(log.iter().map(|row| {
                        CareerLogRow::from_game_log(slot.player_id, &slot.name, fetch_season, row)
                    })),
                    Err(err) => {
                        eprintln!(
                            "[WARN] Game log fetch failed for {} ({fetch_season}): {err:#}",
                            slot.name
                        );
                        errors.push(format!("{} {fetch_season}: {err:#}", slot.name));
                    }
                }
                thread::sleep(Duration::from_secs(CALL_GAP_SLEEP_SECS));
            }

            if rows.is_empty() {
                continue;
            }
            match career_db::upsert_game_logs(&mut conn, &rows) {
                Ok(n) => rows_upserted += n,
                Err(err) => {
                    eprintln!("[WARN] Upsert failed for {}: {err:#}", slot.name);
                    errors.push(format!("{}: {err:#}", slot.name));
                }
            }
            players_processed += 1;
        }
    }

    println!("Career ingest complete");
    println!("DB: {}", db_path.display());
    println!("Teams: {}", teams.len());
    println!("Players: {players_processed}");
    println!("Rows upserted: {rows_upserted}");
    println!("Rows in table: {}", career_db::count_game_logs(&conn)?);
    if !errors.is_empty() {
        println!("Errors: {}", errors.len());
        for err in errors.iter().take(10) {
            println!(" - {err}");
        }
    }

    Ok(())
}

fn season_chain(season: &str, count: usize) -> Vec<String> {
    let mut out = vec![season.to_string()];
    let mut current = season.to_string();
    for _ in 1..count {
        let Some(prev) = stats_api::prior_season(&current) else {
            break;
        };
        out.push(prev.clone());
        current = prev;
    }
    out
}

fn parse_teams_arg() -> Result<Vec<&'static TeamInfo>> {
    let Some(raw) = parse_string_arg("--teams") else {
        return Ok(stats_api::all_teams().iter().collect());
    };
    let mut out = Vec::new();
    for part in raw.split([',', ';', ' ']) {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }
        let team = stats_api::find_team_by_abbreviation(trimmed)
            .ok_or_else(|| anyhow!("unknown team abbreviation '{trimmed}'"))?;
        if !out.iter().any(|t: &&TeamInfo| t.id == team.id) {
            out.push(team);
        }
    }
    Ok(out)
}

fn parse_db_path_arg() -> Option<PathBuf> {
    parse_string_arg("--db").map(PathBuf::from)
}

fn parse_usize_arg(name: &str) -> Option<usize> {
    parse_string_arg(name)?.trim().parse().ok()
}

fn parse_string_arg(name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
        {
            let trimmed = next.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}
