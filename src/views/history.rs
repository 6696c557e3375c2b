//! Historical replay: transfers in a fixed time window, one page at a time.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::alerts::AlertCard;
use super::{CommandOutcome, RenderContext, Screen};
use crate::config::Settings;
use crate::error::GatewayError;
use crate::format;
use crate::gateway::Gateway;
use crate::queries::TransfersInRange;
use crate::transfer::TransfersResponse;
use crate::units::Units;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPage {
    pub from: String,
    pub to: String,
    pub min_amount: String,
    /// 1-based.
    pub page: u32,
    pub has_more: bool,
    pub page_volume: String,
    pub cards: Vec<AlertCard>,
}

pub fn build(
    resp: &TransfersResponse,
    screen: &HistoryScreen,
    settings: &Settings,
    now: DateTime<Utc>,
) -> HistoryPage {
    // One extra row is requested to learn whether another page exists.
    let page_size = screen.page_size as usize;
    let has_more = resp.transfers.len() > page_size;
    let cards: Vec<AlertCard> = resp
        .transfers
        .iter()
        .take(page_size)
        .map(|t| AlertCard::new(t, settings, now))
        .collect();
    let volume: f64 = cards.iter().map(|c| c.value_usd).sum();

    HistoryPage {
        from: format::absolute_time(&screen.start_time.to_string()),
        to: format::absolute_time(&screen.end_time.to_string()),
        min_amount: format::abbreviate(screen.min_usd),
        page: screen.page + 1,
        has_more,
        page_volume: format::abbreviate(volume),
        cards,
    }
}

impl fmt::Display for HistoryPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} to {} · {}+", self.from, self.to, self.min_amount)?;
        if self.cards.is_empty() {
            writeln!(f, "No transfers on page {}", self.page)?;
            return if self.page > 1 {
                write!(f, "  Press p to go back a page")
            } else {
                write!(f, "  Try a lower minimum amount or a wider time range")
            };
        }
        for card in &self.cards {
            writeln!(f, "{card}")?;
        }
        write!(
            f,
            "Page {} · {} transfers · {} on this page",
            self.page,
            self.cards.len(),
            self.page_volume
        )?;
        match (self.page > 1, self.has_more) {
            (true, true) => write!(f, " · n/p for more"),
            (false, true) => write!(f, " · n for more"),
            (true, false) => write!(f, " · p to go back"),
            (false, false) => Ok(()),
        }
    }
}

/// The window is anchored when the screen is created, so paging and
/// refreshing walk the same set of transfers.
#[derive(Debug, Clone)]
pub struct HistoryScreen {
    pub start_time: i64,
    pub end_time: i64,
    pub min_usd: f64,
    pub page_size: u32,
    pub page: u32,
    units: Units,
}

impl HistoryScreen {
    pub fn new(
        hours: u32,
        min_usd: f64,
        page_size: u32,
        settings: &Settings,
        now: DateTime<Utc>,
    ) -> Self {
        let end_time = now.timestamp();
        Self {
            start_time: (end_time - i64::from(hours) * 3_600).max(0),
            end_time,
            min_usd,
            // Leaves room for the lookahead row under the indexer's 1000 cap.
            page_size: page_size.clamp(1, 999),
            page: 0,
            units: settings.units,
        }
    }

    pub fn query(&self) -> TransfersInRange {
        TransfersInRange {
            start_time: self.start_time.to_string(),
            end_time: self.end_time.to_string(),
            min_value: self.units.to_raw(self.min_usd),
            first: self.page_size + 1,
            skip: self.page.saturating_mul(self.page_size),
        }
    }
}

#[async_trait]
impl Screen for HistoryScreen {
    type Data = TransfersResponse;
    type Model = HistoryPage;

    fn title(&self) -> String {
        "Historical Activity".into()
    }

    async fn load(&self, gateway: &Gateway, _now: DateTime<Utc>) -> Result<TransfersResponse, GatewayError> {
        gateway.fetch(&self.query()).await
    }

    fn cached(&self, gateway: &Gateway) -> Option<TransfersResponse> {
        gateway.cached(&self.query()).map(|(data, _)| data)
    }

    fn build(&self, data: &TransfersResponse, ctx: &RenderContext<'_>) -> HistoryPage {
        build(data, self, ctx.settings, ctx.now)
    }

    fn command(&mut self, input: &str) -> CommandOutcome {
        match input {
            "n" => {
                self.page += 1;
                CommandOutcome::Refetch
            }
            "p" if self.page > 0 => {
                self.page -= 1;
                CommandOutcome::Refetch
            }
            "p" => CommandOutcome::Rerender,
            other => CommandOutcome::Unknown(other.to_string()),
        }
    }

    fn help(&self) -> &'static str {
        "n/p  next or previous page"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::tests::ScriptedTransport;
    use crate::gateway::RetryPolicy;
    use crate::transfer::Transfer;
    use crate::views::tests::now;
    use serde_json::json;
    use std::sync::Arc;

    fn page_of(n: usize) -> TransfersResponse {
        TransfersResponse {
            transfers: (0..n)
                .map(|i| Transfer {
                    id: format!("t{i}"),
                    value: "100000000000".into(),
                    timestamp: (now().timestamp() - 600).to_string(),
                    ..Default::default()
                })
                .collect(),
        }
    }

    fn screen() -> HistoryScreen {
        HistoryScreen::new(24, 50_000.0, 3, &Settings::default(), now())
    }

    #[test]
    fn query_pages_with_one_row_of_lookahead() {
        let mut screen = screen();
        let q = screen.query();
        assert_eq!(q.start_time, "1699913600");
        assert_eq!(q.end_time, "1700000000");
        assert_eq!(q.min_value, "50000000000");
        assert_eq!((q.first, q.skip), (4, 0));

        assert_eq!(screen.command("n"), CommandOutcome::Refetch);
        assert_eq!(screen.query().skip, 3);
        assert_eq!(screen.command("p"), CommandOutcome::Refetch);
        assert_eq!(screen.command("p"), CommandOutcome::Rerender);
        assert_eq!(screen.page, 0);
        assert!(matches!(screen.command("x"), CommandOutcome::Unknown(_)));
    }

    #[test]
    fn lookahead_row_is_hidden() {
        let settings = Settings::default();
        let screen = screen();
        let page = build(&page_of(4), &screen, &settings, now());
        assert_eq!(page.cards.len(), 3);
        assert!(page.has_more);
        assert_eq!(page.page_volume, "$300.00K");
        assert!(page.to_string().contains("n for more"));

        let last = build(&page_of(2), &screen, &settings, now());
        assert!(!last.has_more);
        assert_eq!(last.cards[0].time_ago, "10 minutes ago");
    }

    #[test]
    fn empty_page_hints() {
        let settings = Settings::default();
        let mut screen = screen();
        let first = build(&page_of(0), &screen, &settings, now());
        assert!(first.to_string().contains("wider time range"));

        screen.page = 2;
        let later = build(&page_of(0), &screen, &settings, now());
        assert_eq!(later.page, 3);
        assert!(later.to_string().contains("Press p"));
    }

    #[tokio::test]
    async fn paging_requests_the_next_slice() {
        let transport = Arc::new(ScriptedTransport::with(vec![
            ScriptedTransport::data(json!({ "transfers": [] })),
            ScriptedTransport::data(json!({ "transfers": [] })),
        ]));
        let gateway = Gateway::new(transport.clone(), RetryPolicy::default());
        let mut screen = screen();

        screen.load(&gateway, now()).await.unwrap();
        screen.command("n");
        screen.load(&gateway, now()).await.unwrap();
        assert!(screen.cached(&gateway).is_some());

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].variables["skip"], 0);
        assert_eq!(seen[1].variables["skip"], 3);
        assert_eq!(seen[1].variables["first"], 4);
    }
}
