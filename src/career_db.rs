use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};

use crate::http_cache::app_cache_dir;
use crate::stats_api::GameLogRow;

/// One persisted game-log row. The dashboard only reads; writes happen in
/// the `career_ingest` bin.
#[derive(Debug, Clone)]
pub struct CareerLogRow {
    pub player_id: i64,
    pub player: String,
    pub season: String,
    pub game_date: String,
    pub matchup: String,
    pub minutes: f64,
    pub pts: f64,
    pub reb: f64,
    pub ast: f64,
}

impl CareerLogRow {
    pub fn from_game_log(player_id: i64, player: &str, season: &str, row: &GameLogRow) -> Self {
        Self {
            player_id,
            player: player.to_string(),
            season: season.to_string(),
            game_date: row.game_date.clone(),
            matchup: row.matchup.clone(),
            minutes: row.min,
            pts: row.pts,
            reb: row.reb,
            ast: row.ast,
        }
    }
}

pub fn default_db_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("HOOPS_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    app_cache_dir().map(|dir| dir.join("career_game_logs.sqlite"))
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS game_logs (
            player_id INTEGER NOT NULL,
            player TEXT NOT NULL,
            season TEXT NOT NULL,
            game_date TEXT NOT NULL,
            matchup TEXT NOT NULL,
            minutes REAL NOT NULL,
            pts REAL NOT NULL,
            reb REAL NOT NULL,
            ast REAL NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (player_id, season, game_date, matchup)
        );
        CREATE INDEX IF NOT EXISTS idx_game_logs_player ON game_logs(player_id);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

pub fn upsert_game_logs(conn: &mut Connection, rows: &[CareerLogRow]) -> Result<usize> {
    let tx = conn.transaction().context("begin ingest transaction")?;
    let mut upserted = 0usize;
    for row in rows {
        tx.execute(
            r#"
            INSERT INTO game_logs (
                player_id, player, season, game_date, matchup,
                minutes, pts, reb, ast, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(player_id, season, game_date, matchup) DO UPDATE SET
                player = excluded.player,
                minutes = excluded.minutes,
                pts = excluded.pts,
                reb = excluded.reb,
                ast = excluded.ast,
                updated_at = excluded.updated_at
            "#,
            params![
                row.player_id,
                row.player,
                row.season,
                row.game_date,
                row.matchup,
                row.minutes,
                row.pts,
                row.reb,
                row.ast,
                Utc::now().to_rfc3339(),
            ],
        )
        .context("upsert game log row")?;
        upserted += 1;
    }
    tx.commit().context("commit ingest transaction")?;
    Ok(upserted)
}

/// Career points average against one opponent: every stored matchup whose
/// text contains the opponent abbreviation ("vs. LAL" and "@ LAL" both
/// count). No matching rows is `Ok(None)`, never an error.
pub fn career_avg_vs_opponent(
    conn: &Connection,
    player_id: i64,
    opponent_abbr: &str,
) -> Result<Option<f64>> {
    conn.query_row(
        "SELECT AVG(pts) FROM game_logs WHERE player_id = ?1 AND matchup LIKE '%' || ?2 || '%'",
        params![player_id, opponent_abbr],
        |row| row.get::<_, Option<f64>>(0),
    )
    .context("query career average vs opponent")
}

pub fn count_game_logs(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM game_logs", [], |row| row.get(0))
        .context("count game log rows")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_db() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        init_schema(&conn).expect("schema");
        conn
    }

    fn log_row(player_id: i64, date: &str, matchup: &str, pts: f64) -> CareerLogRow {
        CareerLogRow {
            player_id,
            player: "Test Player".to_string(),
            season: "2024-25".to_string(),
            game_date: date.to_string(),
            matchup: matchup.to_string(),
            minutes: 30.0,
            pts,
            reb: 5.0,
            ast: 4.0,
        }
    }

    #[test]
    fn home_and_away_matchups_both_count() {
        let mut conn = mem_db();
        upsert_game_logs(
            &mut conn,
            &[
                log_row(1, "JAN 01, 2025", "BOS vs. LAL", 30.0),
                log_row(1, "JAN 03, 2025", "BOS @ LAL", 20.0),
                log_row(1, "JAN 05, 2025", "BOS vs. MIA", 40.0),
            ],
        )
        .unwrap();

        let avg = career_avg_vs_opponent(&conn, 1, "LAL").unwrap().unwrap();
        assert!((avg - 25.0).abs() < 1e-9);
    }

    #[test]
    fn no_matching_rows_is_none_not_zero() {
        let mut conn = mem_db();
        upsert_game_logs(&mut conn, &[log_row(1, "JAN 01, 2025", "BOS vs. MIA", 40.0)]).unwrap();

        assert!(career_avg_vs_opponent(&conn, 1, "LAL").unwrap().is_none());
        assert!(career_avg_vs_opponent(&conn, 999, "MIA").unwrap().is_none());
    }

    #[test]
    fn upsert_replaces_existing_rows() {
        let mut conn = mem_db();
        upsert_game_logs(&mut conn, &[log_row(1, "JAN 01, 2025", "BOS vs. LAL", 30.0)]).unwrap();
        upsert_game_logs(&mut conn, &[log_row(1, "JAN 01, 2025", "BOS vs. LAL", 12.0)]).unwrap();

        assert_eq!(count_game_logs(&conn).unwrap(), 1);
        let avg = career_avg_vs_opponent(&conn, 1, "LAL").unwrap().unwrap();
        assert!((avg - 12.0).abs() < 1e-9);
    }
}
