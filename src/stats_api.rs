use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;

use crate::http_cache::fetch_json_cached;
use crate::http_client::http_client;
use crate::retry::{classify_http_error, with_backoff};

const STATS_BASE_URL: &str = "https://stats.nba.com/stats";

const ROSTER_RETRY_ATTEMPTS: usize = 3;
const ROSTER_RETRY_DELAY_SECS: u64 = 5;
const GAMELOG_RETRY_ATTEMPTS: usize = 3;
const GAMELOG_RETRY_DELAY_SECS: u64 = 2;
// Upstream rate limit between the two season calls.
const SEASON_GAP_SLEEP_SECS: u64 = 1;

/// Minimum combined rows across the two seasons; smaller logs are rejected
/// before feature building.
pub const MIN_GAMES: usize = 5;

pub const DEFAULT_SEASON: &str = "2024-25";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamInfo {
    pub id: u32,
    pub abbr: &'static str,
    pub name: &'static str,
}

pub const TEAMS: [TeamInfo; 30] = [
    TeamInfo { id: 1610612737, abbr: "ATL", name: "Atlanta Hawks" },
    TeamInfo { id: 1610612738, abbr: "BOS", name: "Boston Celtics" },
    TeamInfo { id: 1610612751, abbr: "BKN", name: "Brooklyn Nets" },
    TeamInfo { id: 1610612766, abbr: "CHA", name: "Charlotte Hornets" },
    TeamInfo { id: 1610612741, abbr: "CHI", name: "Chicago Bulls" },
    TeamInfo { id: 1610612739, abbr: "CLE", name: "Cleveland Cavaliers" },
    TeamInfo { id: 1610612742, abbr: "DAL", name: "Dallas Mavericks" },
    TeamInfo { id: 1610612743, abbr: "DEN", name: "Denver Nuggets" },
    TeamInfo { id: 1610612765, abbr: "DET", name: "Detroit Pistons" },
    TeamInfo { id: 1610612744, abbr: "GSW", name: "Golden State Warriors" },
    TeamInfo { id: 1610612745, abbr: "HOU", name: "Houston Rockets" },
    TeamInfo { id: 1610612754, abbr: "IND", name: "Indiana Pacers" },
    TeamInfo { id: 1610612746, abbr: "LAC", name: "Los Angeles Clippers" },
    TeamInfo { id: 1610612747, abbr: "LAL", name: "Los Angeles Lakers" },
    TeamInfo { id: 1610612763, abbr: "MEM", name: "Memphis Grizzlies" },
    TeamInfo { id: 1610612748, abbr: "MIA", name: "Miami Heat" },
    TeamInfo { id: 1610612749, abbr: "MIL", name: "Milwaukee Bucks" },
    TeamInfo { id: 1610612750, abbr: "MIN", name: "Minnesota Timberwolves" },
    TeamInfo { id: 1610612740, abbr: "NOP", name: "New Orleans Pelicans" },
    TeamInfo { id: 1610612752, abbr: "NYK", name: "New York Knicks" },
    TeamInfo { id: 1610612760, abbr: "OKC", name: "Oklahoma City Thunder" },
    TeamInfo { id: 1610612753, abbr: "ORL", name: "Orlando Magic" },
    TeamInfo { id: 1610612755, abbr: "PHI", name: "Philadelphia 76ers" },
    TeamInfo { id: 1610612756, abbr: "PHX", name: "Phoenix Suns" },
    TeamInfo { id: 1610612757, abbr: "POR", name: "Portland Trail Blazers" },
    TeamInfo { id: 1610612758, abbr: "SAC", name: "Sacramento Kings" },
    TeamInfo { id: 1610612759, abbr: "SAS", name: "San Antonio Spurs" },
    TeamInfo { id: 1610612761, abbr: "TOR", name: "Toronto Raptors" },
    TeamInfo { id: 1610612762, abbr: "UTA", name: "Utah Jazz" },
    TeamInfo { id: 1610612764, abbr: "WAS", name: "Washington Wizards" },
];

pub fn all_teams() -> &'static [TeamInfo] {
    &TEAMS
}

pub fn find_team_by_abbreviation(abbr: &str) -> Option<&'static TeamInfo> {
    let wanted = abbr.trim().to_ascii_uppercase();
    TEAMS.iter().find(|t| t.abbr == wanted)
}

#[derive(Debug, Clone)]
pub struct PlayerListing {
    pub id: i64,
    pub full_name: String,
}

#[derive(Debug, Clone)]
pub struct RosterSlot {
    pub player_id: i64,
    pub name: String,
}

/// One played game as the provider reports it. Immutable once fetched;
/// derived columns live on the engineered rows.
#[derive(Debug, Clone)]
pub struct GameLogRow {
    pub game_date: String,
    pub matchup: String,
    pub min: f64,
    pub pts: f64,
    pub reb: f64,
    pub ast: f64,
    pub fgm: f64,
    pub fga: f64,
    pub fg_pct: f64,
    pub fg3m: f64,
    pub fg3a: f64,
    pub fg3_pct: f64,
    pub ftm: f64,
    pub fta: f64,
    pub ft_pct: f64,
    pub tov: f64,
    pub pf: f64,
}

pub fn current_season_from_env() -> String {
    std::env::var("HOOPS_SEASON")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SEASON.to_string())
}

/// "2024-25" -> "2023-24".
pub fn prior_season(season: &str) -> Option<String> {
    let start: i32 = season.split('-').next()?.trim().parse().ok()?;
    let prev = start - 1;
    Some(format!("{prev}-{:02}", (start % 100 + 100) % 100))
}

pub fn fetch_all_players(season: &str) -> Result<Vec<PlayerListing>> {
    let client = http_client()?;
    let url = format!(
        "{STATS_BASE_URL}/commonallplayers?IsOnlyCurrentSeason=0&LeagueID=00&Season={season}"
    );
    let body = with_backoff(
        ROSTER_RETRY_ATTEMPTS,
        Duration::from_secs(ROSTER_RETRY_DELAY_SECS),
        classify_http_error,
        || fetch_json_cached(client, &url, &[]),
    )
    .context("fetch player list failed")?;
    parse_players_json(&body)
}

pub fn fetch_team_roster(team: &TeamInfo, season: &str) -> Result<Vec<RosterSlot>> {
    let client = http_client()?;
    let url = format!(
        "{STATS_BASE_URL}/commonteamroster?LeagueID=00&Season={season}&TeamID={}",
        team.id
    );
    let body = with_backoff(
        ROSTER_RETRY_ATTEMPTS,
        Duration::from_secs(ROSTER_RETRY_DELAY_SECS),
        classify_http_error,
        || fetch_json_cached(client, &url, &[]),
    )
    .with_context(|| format!("fetch roster failed for {}", team.abbr))?;
    parse_roster_json(&body)
}

pub fn fetch_player_game_log(player_id: i64, season: &str) -> Result<Vec<GameLogRow>> {
    let client = http_client()?;
    let url = format!(
        "{STATS_BASE_URL}/playergamelog?PlayerID={player_id}&Season={season}&SeasonType=Regular%20Season"
    );
    let body = with_backoff(
        GAMELOG_RETRY_ATTEMPTS,
        Duration::from_secs(GAMELOG_RETRY_DELAY_SECS),
        classify_http_error,
        || fetch_json_cached(client, &url, &[]),
    )
    .with_context(|| format!("fetch game log failed for player {player_id}"))?;
    parse_game_log_json(&body)
}

/// Current plus prior season, concatenated. Callers reject logs shorter than
/// [`MIN_GAMES`] before feature building.
pub fn fetch_two_season_log(player_id: i64, season: &str) -> Result<Vec<GameLogRow>> {
    let mut rows = fetch_player_game_log(player_id, season)?;
    thread::sleep(Duration::from_secs(SEASON_GAP_SLEEP_SECS));
    if let Some(prev) = prior_season(season) {
        rows.extend(fetch_player_game_log(player_id, &prev)?);
    }
    Ok(rows)
}

pub fn parse_players_json(raw: &str) -> Result<Vec<PlayerListing>> {
    let table = ResultTable::from_raw(raw, "CommonAllPlayers")?;
    let mut out = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let Some(id) = table.cell_i64(row, "PERSON_ID") else {
            continue;
        };
        let Some(full_name) = table.cell_str(row, "DISPLAY_FIRST_LAST") else {
            continue;
        };
        if full_name.is_empty() {
            continue;
        }
        out.push(PlayerListing { id, full_name });
    }
    Ok(out)
}

pub fn parse_roster_json(raw: &str) -> Result<Vec<RosterSlot>> {
    let table = ResultTable::from_raw(raw, "CommonTeamRoster")?;
    let mut out = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let Some(player_id) = table.cell_i64(row, "PLAYER_ID") else {
            continue;
        };
        let Some(name) = table.cell_str(row, "PLAYER") else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        out.push(RosterSlot { player_id, name });
    }
    Ok(out)
}

pub fn parse_game_log_json(raw: &str) -> Result<Vec<GameLogRow>> {
    let table = ResultTable::from_raw(raw, "PlayerGameLog")?;
    let mut out = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let Some(game_date) = table.cell_str(row, "GAME_DATE") else {
            continue;
        };
        let Some(matchup) = table.cell_str(row, "MATCHUP") else {
            continue;
        };
        out.push(GameLogRow {
            game_date,
            matchup,
            min: table.cell_f64(row, "MIN").unwrap_or(0.0),
            pts: table.cell_f64(row, "PTS").unwrap_or(0.0),
            reb: table.cell_f64(row, "REB").unwrap_or(0.0),
            ast: table.cell_f64(row, "AST").unwrap_or(0.0),
            fgm: table.cell_f64(row, "FGM").unwrap_or(0.0),
            fga: table.cell_f64(row, "FGA").unwrap_or(0.0),
            fg_pct: table.cell_f64(row, "FG_PCT").unwrap_or(0.0),
            fg3m: table.cell_f64(row, "FG3M").unwrap_or(0.0),
            fg3a: table.cell_f64(row, "FG3A").unwrap_or(0.0),
            fg3_pct: table.cell_f64(row, "FG3_PCT").unwrap_or(0.0),
            ftm: table.cell_f64(row, "FTM").unwrap_or(0.0),
            fta: table.cell_f64(row, "FTA").unwrap_or(0.0),
            ft_pct: table.cell_f64(row, "FT_PCT").unwrap_or(0.0),
            tov: table.cell_f64(row, "TOV").unwrap_or(0.0),
            pf: table.cell_f64(row, "PF").unwrap_or(0.0),
        });
    }
    Ok(out)
}

/// One resultSets table: header names mapped to column indices, rows as raw
/// JSON arrays. Header lookup is case-insensitive; the provider is not
/// consistent about casing across endpoints.
struct ResultTable {
    columns: HashMap<String, usize>,
    rows: Vec<Vec<Value>>,
}

impl ResultTable {
    fn from_raw(raw: &str, set_name: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(Self {
                columns: HashMap::new(),
                rows: Vec::new(),
            });
        }
        let root: Value = serde_json::from_str(trimmed).context("invalid stats json")?;
        let sets = root
            .get("resultSets")
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow!("missing resultSets"))?;

        let wanted = set_name.to_ascii_uppercase();
        let set = sets
            .iter()
            .find(|s| {
                s.get("name")
                    .and_then(|n| n.as_str())
                    .map(|n| n.to_ascii_uppercase() == wanted)
                    .unwrap_or(false)
            })
            .or_else(|| sets.first())
            .ok_or_else(|| anyhow!("empty resultSets"))?;

        let mut columns = HashMap::new();
        if let Some(headers) = set.get("headers").and_then(|v| v.as_array()) {
            for (idx, header) in headers.iter().enumerate() {
                if let Some(name) = header.as_str() {
                    columns.insert(name.to_ascii_uppercase(), idx);
                }
            }
        }

        let rows = set
            .get("rowSet")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|row| row.as_array().cloned())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Ok(Self { columns, rows })
    }

    fn cell<'a>(&self, row: &'a [Value], name: &str) -> Option<&'a Value> {
        let idx = *self.columns.get(&name.to_ascii_uppercase())?;
        row.get(idx)
    }

    fn cell_f64(&self, row: &[Value], name: &str) -> Option<f64> {
        let v = self.cell(row, name)?;
        if let Some(n) = v.as_f64() {
            return Some(n);
        }
        v.as_str()?.trim().parse::<f64>().ok()
    }

    fn cell_i64(&self, row: &[Value], name: &str) -> Option<i64> {
        let v = self.cell(row, name)?;
        if let Some(n) = v.as_i64() {
            return Some(n);
        }
        v.as_str()?.trim().parse::<i64>().ok()
    }

    fn cell_str(&self, row: &[Value], name: &str) -> Option<String> {
        Some(self.cell(row, name)?.as_str()?.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_lookup_is_case_insensitive() {
        assert_eq!(find_team_by_abbreviation("lal").unwrap().id, 1610612747);
        assert_eq!(find_team_by_abbreviation(" BOS ").unwrap().abbr, "BOS");
        assert!(find_team_by_abbreviation("XXX").is_none());
    }

    #[test]
    fn prior_season_rolls_back_one_year() {
        assert_eq!(prior_season("2024-25").as_deref(), Some("2023-24"));
        assert_eq!(prior_season("2000-01").as_deref(), Some("1999-00"));
        assert!(prior_season("garbage").is_none());
    }

    #[test]
    fn game_log_parses_numbers_from_strings_and_numbers() {
        let raw = r#"{
            "resultSets": [{
                "name": "PlayerGameLog",
                "headers": ["GAME_DATE", "MATCHUP", "MIN", "PTS", "REB", "AST",
                            "FGM", "FGA", "FG_PCT", "FG3M", "FG3A", "FG3_PCT",
                            "FTM", "FTA", "FT_PCT", "TOV", "PF"],
                "rowSet": [
                    ["APR 09, 2025", "LAL vs. BOS", "36", 31, 8, 9,
                     11, 21, 0.524, 3, 8, 0.375, 6, 7, 0.857, 2, 1]
                ]
            }]
        }"#;
        let rows = parse_game_log_json(raw).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].min, 36.0);
        assert_eq!(rows[0].pts, 31.0);
        assert_eq!(rows[0].matchup, "LAL vs. BOS");
    }

    #[test]
    fn null_payload_is_empty() {
        assert!(parse_game_log_json("null").unwrap().is_empty());
        assert!(parse_roster_json("").unwrap().is_empty());
    }

    #[test]
    fn rows_missing_identity_columns_are_skipped() {
        let raw = r#"{
            "resultSets": [{
                "name": "CommonTeamRoster",
                "headers": ["PLAYER_ID", "PLAYER"],
                "rowSet": [[123, "Real Player"], [null, "Ghost"], [456, ""]]
            }]
        }"#;
        let roster = parse_roster_json(raw).unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].player_id, 123);
    }
}
