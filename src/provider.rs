use std::sync::mpsc::{Receiver, Sender};
use std::thread;

use crate::batch::{self, BatchEvent};
use crate::career_db;
use crate::state::{Delta, ProviderCommand};

/// Spawn the worker that owns all network, model and database work. Commands
/// are processed one at a time; the UI stays responsive on its own thread.
pub fn spawn_provider(tx: Sender<Delta>, cmd_rx: Receiver<ProviderCommand>) {
    thread::spawn(move || {
        let conn = match career_db::default_db_path() {
            Some(path) => match career_db::open_db(&path) {
                Ok(conn) => {
                    let _ = tx.send(Delta::Log(format!(
                        "[INFO] Career database: {}",
                        path.display()
                    )));
                    Some(conn)
                }
                Err(err) => {
                    let _ = tx.send(Delta::Log(format!(
                        "[WARN] Career database unavailable: {err:#}"
                    )));
                    None
                }
            },
            None => {
                let _ = tx.send(Delta::Log(
                    "[WARN] No cache directory; career averages disabled".to_string(),
                ));
                None
            }
        };

        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                ProviderCommand::RunMatchup(request) => {
                    if tx
                        .send(Delta::BatchStarted {
                            request: request.clone(),
                        })
                        .is_err()
                    {
                        return;
                    }

                    let tx_events = tx.clone();
                    batch::run_matchup(&request, conn.as_ref(), &mut |event| {
                        let delta = match event {
                            BatchEvent::Log(msg) => Delta::Log(msg),
                            BatchEvent::SideStarted {
                                side,
                                team,
                                opponent,
                                roster,
                            } => Delta::SideStarted {
                                side,
                                team,
                                opponent,
                                roster,
                            },
                            BatchEvent::Player { side, outcome } => {
                                Delta::Player { side, outcome }
                            }
                            BatchEvent::SideFinished { side, total } => {
                                Delta::SideFinished { side, total }
                            }
                        };
                        let _ = tx_events.send(delta);
                    });

                    if tx.send(Delta::BatchFinished).is_err() {
                        return;
                    }
                }
            }
        }
    });
}
