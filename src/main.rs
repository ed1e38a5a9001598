use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use hoops_terminal::batch::PlayerOutcome;
use hoops_terminal::export;
use hoops_terminal::provider;
use hoops_terminal::state::{self, apply_delta, AppState, Screen, SetupField};

struct App {
    state: AppState,
    should_quit: bool,
    cmd_tx: Option<mpsc::Sender<state::ProviderCommand>>,
}

impl App {
    fn new(cmd_tx: Option<mpsc::Sender<state::ProviderCommand>>) -> Self {
        Self {
            state: AppState::new(),
            should_quit: false,
            cmd_tx,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            KeyCode::Char('1') => self.state.screen = Screen::Setup,
            KeyCode::Char('2') => {
                if !self.state.sides.is_empty() {
                    self.state.screen = Screen::Board;
                }
            }
            _ => match self.state.screen {
                Screen::Setup => self.on_setup_key(key),
                Screen::Board => self.on_board_key(key),
            },
        }
    }

    fn on_setup_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down | KeyCode::Tab => self.state.cycle_field_next(),
            KeyCode::Char('k') | KeyCode::Up | KeyCode::BackTab => self.state.cycle_field_prev(),
            KeyCode::Char('l') | KeyCode::Right => self.state.cycle_value_next(),
            KeyCode::Char('h') | KeyCode::Left => self.state.cycle_value_prev(),
            KeyCode::Char('g') | KeyCode::Enter => self.trigger_run(),
            _ => {}
        }
    }

    fn on_board_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            KeyCode::Char('b') | KeyCode::Esc => self.state.screen = Screen::Setup,
            KeyCode::Char('g') | KeyCode::Enter => self.trigger_run(),
            KeyCode::Char('e') => self.export_board(),
            _ => {}
        }
    }

    fn trigger_run(&mut self) {
        if self.state.running {
            self.state
                .push_log("[WARN] A run is already in progress".to_string());
            return;
        }
        if self.state.home_idx == self.state.away_idx {
            self.state
                .push_log("[WARN] Home and away teams must differ".to_string());
            return;
        }
        let Some(tx) = &self.cmd_tx else {
            self.state
                .push_log("[WARN] Prediction provider unavailable".to_string());
            return;
        };
        let request = self.state.request();
        if tx.send(state::ProviderCommand::RunMatchup(request)).is_err() {
            self.state
                .push_log("[ERROR] Prediction request failed".to_string());
        }
    }

    fn export_board(&mut self) {
        if self.state.sides.is_empty() {
            self.state
                .push_log("[INFO] Nothing to export yet".to_string());
            return;
        }
        let path = export_path();
        match export::export_board(&path, &self.state.sides, self.state.target) {
            Ok(report) => self.state.push_log(format!(
                "[INFO] Exported {} predictions, {} skips to {}",
                report.predictions,
                report.skips,
                path.display()
            )),
            Err(err) => self
                .state
                .push_log(format!("[ERROR] Export failed: {err:#}")),
        }
    }
}

fn export_path() -> PathBuf {
    std::env::var("HOOPS_EXPORT_PATH")
        .ok()
        .map(|raw| PathBuf::from(raw.trim().to_string()))
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from("hoops_predictions.xlsx"))
}

fn main() -> io::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    provider::spawn_provider(tx, cmd_rx);

    let mut app = App::new(Some(cmd_tx));
    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<state::Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header =
        Paragraph::new(header_text(&app.state)).block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    match app.state.screen {
        Screen::Setup => render_setup(frame, chunks[1], &app.state),
        Screen::Board => render_board(frame, chunks[1], &app.state),
    }

    let console = Paragraph::new(console_text(&app.state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new(footer_text(&app.state));
    frame.render_widget(footer, chunks[3]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    let status = if state.running { "RUNNING" } else { "IDLE" };
    let title = format!(
        "HOOPS TERMINAL | {} | {} | {} | {}",
        state.season,
        state.model.label(),
        state.target.label(),
        status
    );
    let line1 = format!("  .--.  {title}");
    let line2 = " ( () )".to_string();
    let line3 = "  `--'".to_string();
    format!("{line1}\n{line2}\n{line3}")
}

fn footer_text(state: &AppState) -> String {
    match state.screen {
        Screen::Setup => {
            "1 Setup | 2 Board | j/k Field | h/l Value | Enter/g Run | ? Help | q Quit".to_string()
        }
        Screen::Board => {
            "1 Setup | b/Esc Back | j/k Move | g Re-run | e Export | ? Help | q Quit".to_string()
        }
    }
}

fn render_setup(frame: &mut Frame, area: Rect, state: &AppState) {
    let fields = [
        SetupField::HomeTeam,
        SetupField::AwayTeam,
        SetupField::Model,
        SetupField::Target,
    ];

    let mut lines = vec![String::new()];
    for field in fields {
        let marker = if state.setup_field == field { "> " } else { "  " };
        let value = match field {
            SetupField::HomeTeam => {
                let team = state.home_team();
                format!("{} - {}", team.abbr, team.name)
            }
            SetupField::AwayTeam => {
                let team = state.away_team();
                format!("{} - {}", team.abbr, team.name)
            }
            SetupField::Model => state.model.label().to_string(),
            SetupField::Target => state.target.label().to_string(),
        };
        lines.push(format!("{marker}{:<10} {value}", field.label()));
    }
    lines.push(String::new());
    lines.push("  Enter/g to generate predictions for both sides".to_string());

    let setup = Paragraph::new(lines.join("\n"))
        .block(Block::default().title("Matchup").borders(Borders::ALL));
    frame.render_widget(setup, area);
}

fn render_board(frame: &mut Frame, area: Rect, state: &AppState) {
    if state.sides.is_empty() {
        let empty = Paragraph::new("No predictions yet; run a matchup from Setup")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, area);
        return;
    }

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let mut row_offset = 0usize;
    for (idx, side) in state.sides.iter().take(2).enumerate() {
        let title = if side.finished {
            format!(
                "{} vs {} | total {:.1}",
                side.team.abbr, side.opponent.abbr, side.total
            )
        } else {
            format!("{} vs {} | running...", side.team.abbr, side.opponent.abbr)
        };

        let block = Block::default().title(title).borders(Borders::ALL);
        let inner = block.inner(columns[idx]);
        frame.render_widget(block, columns[idx]);

        render_side_rows(frame, inner, state, side, row_offset);
        row_offset += side.outcomes.len();
    }
}

fn render_side_rows(
    frame: &mut Frame,
    area: Rect,
    state: &AppState,
    side: &state::SideBoard,
    row_offset: usize,
) {
    if area.height == 0 || side.outcomes.is_empty() {
        return;
    }

    let visible = area.height as usize;
    let local_selected = state.selected.checked_sub(row_offset).filter(|idx| {
        *idx < side.outcomes.len()
    });
    let (start, end) = visible_range(
        local_selected.unwrap_or(0),
        side.outcomes.len(),
        visible,
    );

    let mut lines = Vec::with_capacity(end - start);
    for idx in start..end {
        let marker = if local_selected == Some(idx) { "> " } else { "  " };
        lines.push(format!("{marker}{}", outcome_line(&side.outcomes[idx])));
    }
    let paragraph = Paragraph::new(lines.join("\n"));
    frame.render_widget(paragraph, area);
}

fn outcome_line(outcome: &PlayerOutcome) -> String {
    match outcome {
        PlayerOutcome::Predicted(p) => {
            let career = p
                .career_avg_vs_opp
                .map(|avg| format!("{avg:.1}"))
                .unwrap_or_else(|| "no data".to_string());
            format!(
                "{:<22} {:>5.1} ±{:>4.1} | avg {:>5.1} | vs opp {career}",
                truncate_name(&p.name, 22),
                p.predicted,
                p.rmse,
                p.season_avg
            )
        }
        PlayerOutcome::Skipped { name, reason } => {
            format!("{:<22}   --  {}", truncate_name(name, 22), reason.describe())
        }
    }
}

fn truncate_name(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        return name.to_string();
    }
    let mut out: String = name.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No messages yet".to_string();
    }
    state
        .logs
        .iter()
        .rev()
        .take(3)
        .cloned()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total == 0 {
        return (0, 0);
    }
    if total <= visible {
        return (0, total);
    }

    let mut start = selected.saturating_sub(visible / 2);
    if start + visible > total {
        start = total - visible;
    }
    (start, start + visible)
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Hoops Terminal - Help",
        "",
        "Global:",
        "  1            Setup",
        "  2            Board",
        "  ?            Toggle help",
        "  q            Quit",
        "",
        "Setup:",
        "  j/k or ↑/↓   Move between fields",
        "  h/l or ←/→   Change field value",
        "  Enter / g    Generate predictions",
        "",
        "Board:",
        "  j/k or ↑/↓   Move selection",
        "  b / Esc      Back to setup",
        "  e            Export board to .xlsx",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
