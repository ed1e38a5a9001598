use std::collections::VecDeque;

use crate::batch::{BatchSummary, MatchupRequest, PlayerOutcome};
use crate::features::TargetStat;
use crate::model::ModelKind;
use crate::stats_api::{self, TeamInfo, TEAMS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Setup,
    Board,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupField {
    HomeTeam,
    AwayTeam,
    Model,
    Target,
}

impl SetupField {
    pub fn next(&self) -> SetupField {
        match self {
            SetupField::HomeTeam => SetupField::AwayTeam,
            SetupField::AwayTeam => SetupField::Model,
            SetupField::Model => SetupField::Target,
            SetupField::Target => SetupField::HomeTeam,
        }
    }

    pub fn prev(&self) -> SetupField {
        match self {
            SetupField::HomeTeam => SetupField::Target,
            SetupField::AwayTeam => SetupField::HomeTeam,
            SetupField::Model => SetupField::AwayTeam,
            SetupField::Target => SetupField::Model,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SetupField::HomeTeam => "Home Team",
            SetupField::AwayTeam => "Away Team",
            SetupField::Model => "Model",
            SetupField::Target => "Category",
        }
    }
}

#[derive(Debug)]
pub enum ProviderCommand {
    RunMatchup(MatchupRequest),
}

/// State updates from the provider thread.
#[derive(Debug, Clone)]
pub enum Delta {
    Log(String),
    BatchStarted {
        request: MatchupRequest,
    },
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
    BatchFinished,
}

/// One side of the board as it fills in.
#[derive(Debug, Clone)]
pub struct SideBoard {
    pub team: &'static TeamInfo,
    pub opponent: &'static TeamInfo,
    pub roster: usize,
    pub outcomes: Vec<PlayerOutcome>,
    pub total: f64,
    pub finished: bool,
}

pub struct AppState {
    pub screen: Screen,
    pub setup_field: SetupField,
    pub home_idx: usize,
    pub away_idx: usize,
    pub model: ModelKind,
    pub target: TargetStat,
    pub season: String,
    pub running: bool,
    pub sides: Vec<SideBoard>,
    pub selected: usize,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            screen: Screen::Setup,
            setup_field: SetupField::HomeTeam,
            home_idx: 0,
            away_idx: 1,
            model: ModelKind::Linear,
            target: TargetStat::Points,
            season: stats_api::current_season_from_env(),
            running: false,
            sides: Vec::new(),
            selected: 0,
            logs: VecDeque::new(),
            help_overlay: false,
        }
    }

    pub fn home_team(&self) -> &'static TeamInfo {
        &TEAMS[self.home_idx]
    }

    pub fn away_team(&self) -> &'static TeamInfo {
        &TEAMS[self.away_idx]
    }

    pub fn request(&self) -> MatchupRequest {
        MatchupRequest {
            home: self.home_team(),
            away: self.away_team(),
            model: self.model,
            target: self.target,
            season: self.season.clone(),
        }
    }

    pub fn cycle_field_next(&mut self) {
        self.setup_field = self.setup_field.next();
    }

    pub fn cycle_field_prev(&mut self) {
        self.setup_field = self.setup_field.prev();
    }

    pub fn cycle_value_next(&mut self) {
        match self.setup_field {
            SetupField::HomeTeam => self.home_idx = (self.home_idx + 1) % TEAMS.len(),
            SetupField::AwayTeam => self.away_idx = (self.away_idx + 1) % TEAMS.len(),
            SetupField::Model => self.model = self.model.next(),
            SetupField::Target => self.target = self.target.next(),
        }
    }

    pub fn cycle_value_prev(&mut self) {
        match self.setup_field {
            SetupField::HomeTeam => {
                self.home_idx = (self.home_idx + TEAMS.len() - 1) % TEAMS.len();
            }
            SetupField::AwayTeam => {
                self.away_idx = (self.away_idx + TEAMS.len() - 1) % TEAMS.len();
            }
            SetupField::Model => self.model = self.model.prev(),
            SetupField::Target => self.target = self.target.prev(),
        }
    }

    /// Total selectable rows across both board sides.
    pub fn board_rows(&self) -> usize {
        self.sides.iter().map(|side| side.outcomes.len()).sum()
    }

    pub fn select_next(&mut self) {
        let rows = self.board_rows();
        if rows > 0 && self.selected + 1 < rows {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn clamp_selection(&mut self) {
        let rows = self.board_rows();
        if rows == 0 {
            self.selected = 0;
        } else if self.selected >= rows {
            self.selected = rows - 1;
        }
    }

    pub fn board_summary(&self) -> BatchSummary {
        let mut out = BatchSummary::default();
        for side in &self.sides {
            for outcome in &side.outcomes {
                match outcome {
                    PlayerOutcome::Predicted(_) => out.predicted += 1,
                    PlayerOutcome::Skipped { .. } => out.skipped += 1,
                }
            }
        }
        out
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        const MAX_LOGS: usize = 200;
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::Log(msg) => state.push_log(msg),
        Delta::BatchStarted { request } => {
            state.running = true;
            state.sides.clear();
            state.selected = 0;
            state.screen = Screen::Board;
            state.push_log(format!(
                "[INFO] {} predictions: {} vs {} ({})",
                request.model.label(),
                request.home.abbr,
                request.away.abbr,
                request.target.label()
            ));
        }
        Delta::SideStarted {
            side,
            team,
            opponent,
            roster,
        } => {
            while state.sides.len() <= side {
                state.sides.push(SideBoard {
                    team,
                    opponent,
                    roster: 0,
                    outcomes: Vec::new(),
                    total: 0.0,
                    finished: false,
                });
            }
            let board = &mut state.sides[side];
            board.team = team;
            board.opponent = opponent;
            board.roster = roster;
            state.push_log(format!(
                "[INFO] Analyzing {roster} players from {} against {}",
                team.abbr, opponent.abbr
            ));
        }
        Delta::Player { side, outcome } => {
            if let Some(board) = state.sides.get_mut(side) {
                board.outcomes.push(outcome);
            }
        }
        Delta::SideFinished { side, total } => {
            if let Some(board) = state.sides.get_mut(side) {
                board.total = total;
                board.finished = true;
                let abbr = board.team.abbr;
                state.push_log(format!("[INFO] Total predicted for {abbr}: {total:.1}"));
            }
        }
        Delta::BatchFinished => {
            state.running = false;
            let summary = state.board_summary();
            state.push_log(format!(
                "[INFO] Run finished: {} predicted, {} skipped",
                summary.predicted, summary.skipped
            ));
        }
    }
    state.clamp_selection();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_fields_cycle_in_a_ring() {
        let mut field = SetupField::HomeTeam;
        for _ in 0..4 {
            field = field.next();
        }
        assert_eq!(field, SetupField::HomeTeam);
        assert_eq!(SetupField::HomeTeam.prev(), SetupField::Target);
    }

    #[test]
    fn team_cycling_wraps() {
        let mut state = AppState::new();
        state.setup_field = SetupField::HomeTeam;
        state.home_idx = TEAMS.len() - 1;
        state.cycle_value_next();
        assert_eq!(state.home_idx, 0);
        state.cycle_value_prev();
        assert_eq!(state.home_idx, TEAMS.len() - 1);
    }

    #[test]
    fn log_buffer_is_capped() {
        let mut state = AppState::new();
        for i in 0..300 {
            state.push_log(format!("line {i}"));
        }
        assert_eq!(state.logs.len(), 200);
        assert_eq!(state.logs.front().map(String::as_str), Some("line 100"));
    }
}
