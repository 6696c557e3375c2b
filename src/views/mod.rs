//! Terminal views over query state.
//!
//! Each view turns a response into a serialisable view model that also
//! implements `Display`. Views never fail: a failed query renders as an error
//! block with a retry hint, above the last good data if there is any.

pub mod alerts;
pub mod chart;
pub mod flows;
pub mod history;
pub mod leaderboard;
pub mod summary;

use std::fmt::{self, Write as _};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Settings;
use crate::error::GatewayError;
use crate::format;
use crate::gateway::{Gateway, QueryState};

/// User preferences that affect rendering only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preferences {
    /// Ring the terminal bell on large alerts.
    pub bell: bool,
    pub color: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            bell: false,
            color: true,
        }
    }
}

pub struct RenderContext<'a> {
    pub settings: &'a Settings,
    pub prefs: Preferences,
    pub now: DateTime<Utc>,
}

/// Result of feeding an interactive command to a screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Query parameters changed; fetch again.
    Refetch,
    /// Only the client-side presentation changed.
    Rerender,
    Unknown(String),
}

/// One monitored view: how to load it, and how to present what was loaded.
///
/// Screens are cloned into the task that runs `load`, so they should carry
/// only their parameters.
#[async_trait]
pub trait Screen: Clone + Send + Sync + 'static {
    type Data: Clone + Send + Sync + 'static;
    type Model: fmt::Display + Serialize;

    fn title(&self) -> String;

    async fn load(&self, gateway: &Gateway, now: DateTime<Utc>)
        -> Result<Self::Data, GatewayError>;

    /// A previously fetched payload for the current parameters, if any.
    fn cached(&self, _gateway: &Gateway) -> Option<Self::Data> {
        None
    }

    fn build(&self, data: &Self::Data, ctx: &RenderContext<'_>) -> Self::Model;

    fn command(&mut self, input: &str) -> CommandOutcome {
        CommandOutcome::Unknown(input.to_string())
    }

    /// Extra interactive commands this screen understands.
    fn help(&self) -> &'static str {
        ""
    }

    /// Whether newly arrived data deserves the bell.
    fn alarm(&mut self, _data: &Self::Data, _ctx: &RenderContext<'_>) -> bool {
        false
    }
}

/// Render a query state for `screen`, including the refresh footer.
pub fn render_state<S: Screen>(
    screen: &S,
    state: &QueryState<S::Data>,
    last_updated: Option<DateTime<Utc>>,
    ctx: &RenderContext<'_>,
) -> String {
    let title = screen.title();
    let mut out = String::new();
    let _ = writeln!(out, "━━ {title} ━━");

    match state {
        QueryState::Pending { stale: None } => {
            let _ = writeln!(out, "⏳ Loading {}...", title.to_lowercase());
        }
        QueryState::Pending { stale: Some(data) } => {
            let _ = writeln!(out, "{}", screen.build(data, ctx));
            let _ = writeln!(out, "⏳ Refreshing...");
        }
        QueryState::Failed { message, stale } => {
            let _ = writeln!(out, "⚠️  Error loading {}", title.to_lowercase());
            let _ = writeln!(out, "   {message}");
            let _ = writeln!(out, "   Press Enter to try again.");
            if let Some(data) = stale {
                let _ = writeln!(out, "\n(showing last good data)");
                let _ = writeln!(out, "{}", screen.build(data, ctx));
            }
        }
        QueryState::Ready { data, .. } => {
            let _ = writeln!(out, "{}", screen.build(data, ctx));
        }
    }

    if let Some(at) = last_updated {
        let _ = writeln!(
            out,
            "Last updated: {}",
            format::relative_time(&at.timestamp().to_string(), ctx.now)
        );
    }
    if !ctx.settings.refresh.is_polling() {
        let _ = writeln!(
            out,
            "Auto-refresh disabled to save API queries. Press Enter to refresh."
        );
    }
    out
}

/// `$1.00K` / `-$1.00K`: [`format::abbreviate`] with a sign for net flows.
pub(crate) fn signed_abbreviate(value: f64) -> String {
    if value < 0.0 {
        format!("-{}", format::abbreviate(-value))
    } else {
        format::abbreviate(value)
    }
}
