use rusqlite::Connection;

use crate::career_db::career_avg_vs_opponent;
use crate::features::{build_features, mean_feature_row, TargetStat};
use crate::model::{self, ModelKind};
use crate::resolve::resolve_player;
use crate::stats_api::{self, PlayerListing, RosterSlot, TeamInfo, MIN_GAMES};

#[derive(Debug, Clone)]
pub struct MatchupRequest {
    pub home: &'static TeamInfo,
    pub away: &'static TeamInfo,
    pub model: ModelKind,
    pub target: TargetStat,
    pub season: String,
}

/// Why a roster slot produced no prediction.
#[derive(Debug, Clone)]
pub enum SkipReason {
    UnresolvedName,
    FetchFailed(String),
    InsufficientGames(usize),
    Processing(String),
}

impl SkipReason {
    pub fn describe(&self) -> String {
        match self {
            SkipReason::UnresolvedName => "name not in canonical player list".to_string(),
            SkipReason::FetchFailed(err) => format!("game log fetch failed: {err}"),
            SkipReason::InsufficientGames(n) => {
                format!("insufficient data: only {n} games found")
            }
            SkipReason::Processing(err) => format!("processing failed: {err}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlayerPrediction {
    pub player_id: i64,
    pub name: String,
    pub predicted: f64,
    pub mse: f64,
    pub rmse: f64,
    /// Expanding average of the target stat as of the most recent game.
    pub season_avg: f64,
    pub career_avg_vs_opp: Option<f64>,
}

#[derive(Debug, Clone)]
pub enum PlayerOutcome {
    Predicted(PlayerPrediction),
    Skipped { name: String, reason: SkipReason },
}

impl PlayerOutcome {
    pub fn predicted(&self) -> Option<&PlayerPrediction> {
        match self {
            PlayerOutcome::Predicted(p) => Some(p),
            PlayerOutcome::Skipped { .. } => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PlayerOutcome::Predicted(p) => &p.name,
            PlayerOutcome::Skipped { name, .. } => name,
        }
    }
}

/// One side of the matchup: outcomes in roster order plus the total over
/// successful predictions.
#[derive(Debug, Clone)]
pub struct TeamBoard {
    pub team: &'static TeamInfo,
    pub opponent: &'static TeamInfo,
    pub outcomes: Vec<PlayerOutcome>,
    pub total_predicted: f64,
}

#[derive(Debug, Clone)]
pub enum BatchEvent {
    Log(String),
    SideStarted {
        side: usize,
        team: &'static TeamInfo,
        opponent: &'static TeamInfo,
        roster: usize,
    },
    Player {
        side: usize,
        outcome: PlayerOutcome,
    },
    SideFinished {
        side: usize,
        total: f64,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub predicted: usize,
    pub skipped: usize,
}

pub fn summary(boards: &[TeamBoard]) -> BatchSummary {
    let mut out = BatchSummary::default();
    for board in boards {
        for outcome in &board.outcomes {
            match outcome {
                PlayerOutcome::Predicted(_) => out.predicted += 1,
                PlayerOutcome::Skipped { .. } => out.skipped += 1,
            }
        }
    }
    out
}

/// Run both sides of the matchup sequentially: home against away, then away
/// against home, each roster in provider order. Every recoverable failure
/// becomes a collected skip; nothing here aborts the run.
pub fn run_matchup(
    req: &MatchupRequest,
    conn: Option<&Connection>,
    on_event: &mut dyn FnMut(BatchEvent),
) -> Vec<TeamBoard> {
    let players = match stats_api::fetch_all_players(&req.season) {
        Ok(players) => players,
        Err(err) => {
            on_event(BatchEvent::Log(format!(
                "[ERROR] Player list fetch failed: {err:#}"
            )));
            Vec::new()
        }
    };

    let sides = [(req.home, req.away), (req.away, req.home)];
    let mut boards = Vec::with_capacity(sides.len());

    for (side, (team, opponent)) in sides.into_iter().enumerate() {
        let mut board = TeamBoard {
            team,
            opponent,
            outcomes: Vec::new(),
            total_predicted: 0.0,
        };

        let roster = match stats_api::fetch_team_roster(team, &req.season) {
            Ok(roster) => roster,
            Err(err) => {
                on_event(BatchEvent::Log(format!(
                    "[ERROR] Roster fetch failed for {}: {err:#}",
                    team.abbr
                )));
                boards.push(board);
                continue;
            }
        };
        if roster.is_empty() {
            on_event(BatchEvent::Log(format!(
                "[WARN] Empty roster for {}, side skipped",
                team.abbr
            )));
            boards.push(board);
            continue;
        }

        on_event(BatchEvent::SideStarted {
            side,
            team,
            opponent,
            roster: roster.len(),
        });

        for slot in &roster {
            let outcome = predict_player(slot, opponent, &players, req, conn, on_event);
            if let Some(prediction) = outcome.predicted() {
                board.total_predicted += prediction.predicted;
            }
            on_event(BatchEvent::Player {
                side,
                outcome: outcome.clone(),
            });
            board.outcomes.push(outcome);
        }

        on_event(BatchEvent::SideFinished {
            side,
            total: board.total_predicted,
        });
        boards.push(board);
    }

    boards
}

fn predict_player(
    slot: &RosterSlot,
    opponent: &'static TeamInfo,
    players: &[PlayerListing],
    req: &MatchupRequest,
    conn: Option<&Connection>,
    on_event: &mut dyn FnMut(BatchEvent),
) -> PlayerOutcome {
    let Some(resolved) = resolve_player(&slot.name, players) else {
        return PlayerOutcome::Skipped {
            name: slot.name.clone(),
            reason: SkipReason::UnresolvedName,
        };
    };
    if resolved.low_confidence {
        on_event(BatchEvent::Log(format!(
            "[WARN] '{}' not found; using closest match '{}' ({:.0})",
            slot.name, resolved.name, resolved.score
        )));
    }

    let rows = match stats_api::fetch_two_season_log(resolved.id, &req.season) {
        Ok(rows) => rows,
        Err(err) => {
            return PlayerOutcome::Skipped {
                name: resolved.name,
                reason: SkipReason::FetchFailed(format!("{err:#}")),
            };
        }
    };
    if rows.len() < MIN_GAMES {
        return PlayerOutcome::Skipped {
            name: resolved.name,
            reason: SkipReason::InsufficientGames(rows.len()),
        };
    }

    let engineered = match build_features(&rows) {
        Ok(rows) => rows,
        Err(err) => {
            return PlayerOutcome::Skipped {
                name: resolved.name,
                reason: SkipReason::Processing(format!("{err:#}")),
            };
        }
    };
    if engineered.is_empty() {
        return PlayerOutcome::Skipped {
            name: resolved.name,
            reason: SkipReason::Processing("no usable rows after feature engineering".to_string()),
        };
    }

    let trained = match model::train(req.model, &engineered, req.target) {
        Ok(trained) => trained,
        Err(err) => {
            return PlayerOutcome::Skipped {
                name: resolved.name,
                reason: SkipReason::Processing(format!("{err:#}")),
            };
        }
    };
    let predicted = trained.predict(&mean_feature_row(&engineered));

    let season_avg = engineered
        .last()
        .map(|row| match req.target {
            TargetStat::Points => row.avg_pts,
            TargetStat::Assists => row.avg_ast,
            TargetStat::Rebounds => row.avg_reb,
        })
        .unwrap_or(0.0);

    let career_avg_vs_opp = match conn {
        Some(conn) => match career_avg_vs_opponent(conn, resolved.id, opponent.abbr) {
            Ok(avg) => avg,
            Err(err) => {
                on_event(BatchEvent::Log(format!(
                    "[WARN] Career lookup failed for {}: {err:#}",
                    resolved.name
                )));
                None
            }
        },
        None => None,
    };

    PlayerOutcome::Predicted(PlayerPrediction {
        player_id: resolved.id,
        name: resolved.name,
        predicted,
        mse: trained.mse,
        rmse: trained.rmse(),
        season_avg,
        career_avg_vs_opp,
    })
}
