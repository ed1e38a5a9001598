use std::fs;
use std::path::PathBuf;

use hoops_terminal::stats_api::{parse_game_log_json, parse_players_json, parse_roster_json};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn parses_game_log_fixture() {
    let raw = read_fixture("player_game_log.json");
    let rows = parse_game_log_json(&raw).expect("fixture should parse");
    assert_eq!(rows.len(), 30);

    // The provider returns rows newest-first.
    assert_eq!(rows[0].game_date, "MAR 25, 2025");
    assert!(rows[0].matchup.starts_with("LAL"));
    assert!(rows.iter().all(|r| r.min > 0.0));
    assert!(rows.iter().all(|r| r.fga >= r.fgm));
}

#[test]
fn parses_roster_fixture_and_skips_coaches_set() {
    let raw = read_fixture("team_roster.json");
    let roster = parse_roster_json(&raw).expect("fixture should parse");
    assert_eq!(roster.len(), 3);
    assert_eq!(roster[0].player_id, 2544);
    assert_eq!(roster[0].name, "LeBron James");
    assert_eq!(roster[1].name, "Luka Dončić");
}

#[test]
fn parses_all_players_fixture() {
    let raw = read_fixture("all_players.json");
    let players = parse_players_json(&raw).expect("fixture should parse");
    assert_eq!(players.len(), 5);
    assert!(players.iter().any(|p| p.full_name == "Stephen Curry"));
}

#[test]
fn null_payloads_are_empty() {
    assert!(parse_game_log_json("null").unwrap().is_empty());
    assert!(parse_roster_json("null").unwrap().is_empty());
    assert!(parse_players_json("").unwrap().is_empty());
}
