//! The refresh loop shared by every screen.
//!
//! One task owns the screen and its [`LiveQuery`]. Loads run on spawned tasks
//! and report back over a channel tagged with their ticket, so a slow
//! response can never overwrite a newer one. Polling and manual mode differ
//! only in whether the ticker exists.

use std::io::{IsTerminal, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::GatewayError;
use crate::gateway::{Gateway, LiveQuery, QueryState, Ticket};
use crate::views::{render_state, CommandOutcome, Preferences, RenderContext, Screen};

#[derive(Debug, Clone, Default)]
pub struct MonitorOptions {
    /// Render the first completed load and exit.
    pub once: bool,
    /// Write each fresh view model here as JSON.
    pub export: Option<PathBuf>,
    pub prefs: Preferences,
}

type Completion<D> = (Ticket, Result<D, GatewayError>);

fn dispatch<S: Screen>(
    screen: &S,
    gateway: &Arc<Gateway>,
    ticket: Ticket,
    tx: &mpsc::Sender<Completion<S::Data>>,
) {
    debug!(?ticket, screen = %screen.title(), "dispatching load");
    let screen = screen.clone();
    let gateway = Arc::clone(gateway);
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = screen.load(&gateway, Utc::now()).await;
        // The receiver only goes away when the monitor is shutting down.
        let _ = tx.send((ticket, result)).await;
    });
}

/// Ticket for a poll tick, or `None` while the previous load is still
/// running. Issuing anyway would supersede it, and a load slower than the
/// interval would then never land.
fn poll<T: Clone>(live: &mut LiveQuery<T>) -> Option<Ticket> {
    if live.in_flight() {
        return None;
    }
    Some(live.issue())
}

/// Resolves on the next poll tick, or never in manual mode.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn write_export<M: Serialize>(path: &Path, model: &M) -> Result<()> {
    let json = serde_json::to_string_pretty(model).context("failed to serialise view")?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

struct Terminal {
    interactive: bool,
}

impl Terminal {
    fn draw(&self, frame: &str, footer: &str) {
        let mut out = std::io::stdout().lock();
        if self.interactive {
            // Clear and home the cursor so each frame replaces the last.
            let _ = write!(out, "\x1B[2J\x1B[H");
        }
        let _ = write!(out, "{frame}");
        if !footer.is_empty() {
            let _ = writeln!(out, "{footer}");
        }
        let _ = out.flush();
    }

    fn bell(&self) {
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\x07");
        let _ = out.flush();
    }
}

fn footer<S: Screen>(screen: &S, once: bool) -> String {
    if once {
        return String::new();
    }
    let extra = screen.help();
    if extra.is_empty() {
        "[Enter/r] refresh · [q] quit".to_string()
    } else {
        format!("[Enter/r] refresh · [q] quit · {extra}")
    }
}

pub async fn run<S: Screen>(
    mut screen: S,
    gateway: Arc<Gateway>,
    settings: Arc<Settings>,
    options: MonitorOptions,
) -> Result<()> {
    if !options.prefs.color {
        colored::control::set_override(false);
    }
    let term = Terminal {
        interactive: !options.once && std::io::stdout().is_terminal(),
    };
    let render = |screen: &S, live: &LiveQuery<S::Data>| {
        let ctx = RenderContext {
            settings: &settings,
            prefs: options.prefs,
            now: Utc::now(),
        };
        render_state(screen, live.state(), live.last_updated(), &ctx)
    };

    let (tx, mut rx) = mpsc::channel::<Completion<S::Data>>(16);
    let mut live: LiveQuery<S::Data> = LiveQuery::new();

    let mut ticker = match settings.refresh.interval {
        Some(every) if !options.once => {
            let mut interval = tokio::time::interval_at(Instant::now() + every, every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Some(interval)
        }
        _ => None,
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = !options.once;

    info!(screen = %screen.title(), refresh = %settings.refresh, once = options.once, "monitor started");
    let ticket = live.issue();
    dispatch(&screen, &gateway, ticket, &tx);
    term.draw(&render(&screen, &live), &footer(&screen, options.once));

    loop {
        tokio::select! {
            Some((ticket, result)) = rx.recv() => {
                if !live.resolve(ticket, result, Utc::now()) {
                    continue;
                }
                if let QueryState::Ready { data, .. } = live.state() {
                    let ctx = RenderContext {
                        settings: &settings,
                        prefs: options.prefs,
                        now: Utc::now(),
                    };
                    if screen.alarm(data, &ctx) {
                        term.bell();
                    }
                    if let Some(path) = &options.export {
                        match write_export(path, &screen.build(data, &ctx)) {
                            Ok(()) if options.once => println!("💾 Results saved to: {}", path.display()),
                            Ok(()) => debug!(path = %path.display(), "view exported"),
                            Err(e) => warn!(error = %format!("{e:#}"), "export failed"),
                        }
                    }
                }
                term.draw(&render(&screen, &live), &footer(&screen, options.once));
                if options.once {
                    break;
                }
            }
            _ = next_tick(&mut ticker) => {
                match poll(&mut live) {
                    Some(ticket) => dispatch(&screen, &gateway, ticket, &tx),
                    None => debug!("previous load still running, skipping poll"),
                }
            }
            line = lines.next_line(), if stdin_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        debug!("stdin closed, commands disabled");
                        stdin_open = false;
                        continue;
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to read stdin, commands disabled");
                        stdin_open = false;
                        continue;
                    }
                };
                match line.trim() {
                    "" | "r" => {
                        let ticket = live.issue();
                        dispatch(&screen, &gateway, ticket, &tx);
                    }
                    "q" => break,
                    input => match screen.command(input) {
                        CommandOutcome::Refetch => {
                            let ticket = live.reissue(screen.cached(&gateway));
                            dispatch(&screen, &gateway, ticket, &tx);
                        }
                        CommandOutcome::Rerender => {}
                        CommandOutcome::Unknown(cmd) => {
                            println!("❓ Unknown command: {cmd}");
                            continue;
                        }
                    },
                }
                term.draw(&render(&screen, &live), &footer(&screen, options.once));
            }
            res = tokio::signal::ctrl_c() => {
                res.context("failed to listen for Ctrl+C")?;
                break;
            }
        }
    }

    info!("monitor stopped");
    Ok(())
}
