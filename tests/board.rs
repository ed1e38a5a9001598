use hoops_terminal::batch::{PlayerOutcome, PlayerPrediction, SkipReason};
use hoops_terminal::state::{apply_delta, AppState, Delta, Screen};
use hoops_terminal::stats_api::TEAMS;

fn predicted(name: &str, points: f64) -> PlayerOutcome {
    PlayerOutcome::Predicted(PlayerPrediction {
        player_id: 1,
        name: name.to_string(),
        predicted: points,
        mse: 9.0,
        rmse: 3.0,
        season_avg: points - 1.0,
        career_avg_vs_opp: Some(points + 2.0),
    })
}

fn skipped(name: &str) -> PlayerOutcome {
    PlayerOutcome::Skipped {
        name: name.to_string(),
        reason: SkipReason::InsufficientGames(3),
    }
}

#[test]
fn batch_flow_fills_both_sides() {
    let mut state = AppState::new();
    let request = state.request();

    apply_delta(&mut state, Delta::BatchStarted { request });
    assert!(state.running);
    assert_eq!(state.screen, Screen::Board);
    assert!(state.sides.is_empty());

    apply_delta(
        &mut state,
        Delta::SideStarted {
            side: 0,
            team: &TEAMS[0],
            opponent: &TEAMS[1],
            roster: 2,
        },
    );
    apply_delta(
        &mut state,
        Delta::Player {
            side: 0,
            outcome: predicted("A. Starter", 24.5),
        },
    );
    apply_delta(
        &mut state,
        Delta::Player {
            side: 0,
            outcome: skipped("B. Rookie"),
        },
    );
    apply_delta(&mut state, Delta::SideFinished { side: 0, total: 24.5 });

    apply_delta(
        &mut state,
        Delta::SideStarted {
            side: 1,
            team: &TEAMS[1],
            opponent: &TEAMS[0],
            roster: 1,
        },
    );
    apply_delta(
        &mut state,
        Delta::Player {
            side: 1,
            outcome: predicted("C. Veteran", 18.0),
        },
    );
    apply_delta(&mut state, Delta::SideFinished { side: 1, total: 18.0 });
    apply_delta(&mut state, Delta::BatchFinished);

    assert!(!state.running);
    assert_eq!(state.sides.len(), 2);
    assert_eq!(state.sides[0].outcomes.len(), 2);
    assert!((state.sides[0].total - 24.5).abs() < 1e-9);
    assert!(state.sides[0].finished);
    assert_eq!(state.board_rows(), 3);

    let summary = state.board_summary();
    assert_eq!(summary.predicted, 2);
    assert_eq!(summary.skipped, 1);
    assert!(
        state
            .logs
            .iter()
            .any(|line| line.contains("2 predicted, 1 skipped"))
    );
}

#[test]
fn new_batch_clears_the_previous_board() {
    let mut state = AppState::new();
    let request = state.request();

    apply_delta(
        &mut state,
        Delta::BatchStarted {
            request: request.clone(),
        },
    );
    apply_delta(
        &mut state,
        Delta::SideStarted {
            side: 0,
            team: &TEAMS[0],
            opponent: &TEAMS[1],
            roster: 1,
        },
    );
    apply_delta(
        &mut state,
        Delta::Player {
            side: 0,
            outcome: predicted("A. Starter", 24.5),
        },
    );
    apply_delta(&mut state, Delta::BatchFinished);

    apply_delta(&mut state, Delta::BatchStarted { request });
    assert!(state.sides.is_empty());
    assert_eq!(state.selected, 0);
}

#[test]
fn selection_is_clamped_to_board_rows() {
    let mut state = AppState::new();
    let request = state.request();
    apply_delta(&mut state, Delta::BatchStarted { request });
    apply_delta(
        &mut state,
        Delta::SideStarted {
            side: 0,
            team: &TEAMS[0],
            opponent: &TEAMS[1],
            roster: 2,
        },
    );
    apply_delta(
        &mut state,
        Delta::Player {
            side: 0,
            outcome: predicted("A. Starter", 24.5),
        },
    );
    apply_delta(
        &mut state,
        Delta::Player {
            side: 0,
            outcome: predicted("B. Backup", 9.0),
        },
    );

    state.select_next();
    assert_eq!(state.selected, 1);
    state.select_next();
    assert_eq!(state.selected, 1);
    state.select_prev();
    state.select_prev();
    assert_eq!(state.selected, 0);
}

#[test]
fn out_of_order_side_start_creates_placeholder() {
    let mut state = AppState::new();
    let request = state.request();
    apply_delta(&mut state, Delta::BatchStarted { request });

    // Side 0's roster fetch failed; side 1 still reports.
    apply_delta(
        &mut state,
        Delta::SideStarted {
            side: 1,
            team: &TEAMS[1],
            opponent: &TEAMS[0],
            roster: 1,
        },
    );
    assert_eq!(state.sides.len(), 2);
    assert_eq!(state.sides[1].roster, 1);
}
