//! Live whale alert stream.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Serialize;

use super::{CommandOutcome, RenderContext, Screen};
use crate::config::{AlertPresets, Settings};
use crate::error::GatewayError;
use crate::format;
use crate::gateway::Gateway;
use crate::labels::{self, AddressKind};
use crate::queries::WhaleAlerts;
use crate::severity::SeverityTier;
use crate::transfer::{Account, Transfer, TransfersResponse};
use crate::units::Units;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertFilter {
    All,
    Medium,
    Mega,
}

impl AlertFilter {
    pub fn min_usd(self, presets: &AlertPresets) -> f64 {
        match self {
            AlertFilter::All => presets.all,
            AlertFilter::Medium => presets.medium,
            AlertFilter::Mega => presets.mega,
        }
    }

    pub fn label(self, presets: &AlertPresets) -> String {
        let min = format::abbreviate(self.min_usd(presets));
        match self {
            AlertFilter::All => format!("All Whales ({min}+)"),
            AlertFilter::Medium => format!("Medium Whales ({min}+)"),
            AlertFilter::Mega => format!("Mega Whales ({min}+)"),
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        AlertFilter::from_str(input.trim(), true).ok()
    }
}

/// One side of a transfer, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Party {
    pub address: String,
    pub short: String,
    pub label: &'static str,
    pub kind: AddressKind,
    pub color: String,
    pub url: String,
}

impl Party {
    pub fn new(account: &Account, settings: &Settings) -> Self {
        Self {
            address: account.address.clone(),
            short: format::shorten_address(&account.address),
            label: labels::label_of(&account.address),
            kind: labels::kind_of(&account.address),
            color: labels::address_color(&account.address),
            url: settings.explorer.address(&account.address),
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.short.is_empty() {
            f.write_str(self.label)
        } else {
            write!(f, "{} ({})", self.label, self.short)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertCard {
    pub id: String,
    pub transaction: String,
    pub amount: String,
    pub exact_amount: String,
    pub value_usd: f64,
    pub tier: SeverityTier,
    pub color: &'static str,
    pub mega: bool,
    pub from: Party,
    pub to: Party,
    pub time_ago: String,
    pub time: String,
    pub url: Option<String>,
}

impl AlertCard {
    pub fn new(transfer: &Transfer, settings: &Settings, now: DateTime<Utc>) -> Self {
        let value_usd = settings.units.scale(&transfer.value);
        let tier = settings.thresholds.severity_of(value_usd);
        let url = (!transfer.transaction.is_empty())
            .then(|| settings.explorer.transaction(&transfer.transaction));

        Self {
            id: transfer.id.clone(),
            transaction: transfer.transaction.clone(),
            amount: format::abbreviate(value_usd),
            exact_amount: format::exact(value_usd),
            value_usd,
            tier,
            color: tier.color(),
            mega: value_usd >= settings.alert_presets.mega,
            from: Party::new(&transfer.from, settings),
            to: Party::new(&transfer.to, settings),
            time_ago: format::relative_time(&transfer.timestamp, now),
            time: format::absolute_time(&transfer.timestamp),
            url,
        }
    }
}

impl fmt::Display for AlertCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let badge = if self.mega { "  🐋 Mega Whale" } else { "" };
        writeln!(
            f,
            "{}  [{}]{}  {}",
            self.tier.paint(&self.amount),
            self.tier,
            badge,
            self.time_ago
        )?;
        writeln!(f, "    From: {}", self.from)?;
        writeln!(f, "    To:   {}", self.to)?;
        write!(f, "    {}", self.exact_amount)?;
        if !self.time.is_empty() {
            write!(f, " · {}", self.time)?;
        }
        if let Some(url) = &self.url {
            write!(f, " · {url}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertStream {
    pub filter: String,
    pub cards: Vec<AlertCard>,
}

pub fn build(
    resp: &TransfersResponse,
    filter: AlertFilter,
    settings: &Settings,
    now: DateTime<Utc>,
) -> AlertStream {
    AlertStream {
        filter: filter.label(&settings.alert_presets),
        cards: resp
            .transfers
            .iter()
            .map(|t| AlertCard::new(t, settings, now))
            .collect(),
    }
}

impl fmt::Display for AlertStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Filter: {}", self.filter)?;
        if self.cards.is_empty() {
            writeln!(f, "No whale alerts found")?;
            return write!(f, "  Try adjusting your filters or check back later");
        }
        for (i, card) in self.cards.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{card}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AlertsScreen {
    pub filter: AlertFilter,
    /// Explicit minimum that overrides the filter preset.
    pub min_usd: Option<f64>,
    pub first: u32,
    units: Units,
    presets: AlertPresets,
    /// `(id, transaction, timestamp)` of the last head we rang for. `id`
    /// alone can be missing and default to "".
    announced: Option<(String, String, String)>,
}

impl AlertsScreen {
    pub fn new(filter: AlertFilter, min_usd: Option<f64>, settings: &Settings) -> Self {
        Self {
            filter,
            min_usd,
            first: settings.page_size,
            units: settings.units,
            presets: settings.alert_presets,
            announced: None,
        }
    }

    pub fn query(&self) -> WhaleAlerts {
        let min = self
            .min_usd
            .unwrap_or_else(|| self.filter.min_usd(&self.presets));
        WhaleAlerts {
            min_amount: self.units.to_raw(min),
            first: self.first,
        }
    }
}

#[async_trait]
impl Screen for AlertsScreen {
    type Data = TransfersResponse;
    type Model = AlertStream;

    fn title(&self) -> String {
        "Live Whale Alert Stream".into()
    }

    async fn load(&self, gateway: &Gateway, _now: DateTime<Utc>) -> Result<TransfersResponse, GatewayError> {
        gateway.fetch(&self.query()).await
    }

    fn cached(&self, gateway: &Gateway) -> Option<TransfersResponse> {
        gateway.cached(&self.query()).map(|(data, _)| data)
    }

    fn build(&self, data: &TransfersResponse, ctx: &RenderContext<'_>) -> AlertStream {
        let mut stream = build(data, self.filter, ctx.settings, ctx.now);
        if let Some(min) = self.min_usd {
            stream.filter = format!("Custom ({}+)", format::abbreviate(min));
        }
        stream
    }

    fn command(&mut self, input: &str) -> CommandOutcome {
        let Some(arg) = input.strip_prefix("f ") else {
            return CommandOutcome::Unknown(input.to_string());
        };
        match AlertFilter::parse(arg) {
            Some(filter) => {
                self.filter = filter;
                self.min_usd = None;
                CommandOutcome::Refetch
            }
            None => CommandOutcome::Unknown(input.to_string()),
        }
    }

    fn help(&self) -> &'static str {
        "f all|medium|mega  change the alert filter"
    }

    fn alarm(&mut self, data: &TransfersResponse, ctx: &RenderContext<'_>) -> bool {
        let Some(newest) = data.transfers.first() else {
            return false;
        };
        let key = (
            newest.id.clone(),
            newest.transaction.clone(),
            newest.timestamp.clone(),
        );
        if self.announced.as_ref() == Some(&key) {
            return false;
        }
        self.announced = Some(key);
        let value = ctx.settings.units.scale(&newest.value);
        ctx.prefs.bell && ctx.settings.thresholds.severity_of(value).is_alarming()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::tests::ScriptedTransport;
    use crate::gateway::RetryPolicy;
    use crate::views::tests::{ctx, now};
    use serde_json::json;
    use std::sync::Arc;

    const BURN: &str = "0x0000000000000000000000000000000000000000";
    const BINANCE: &str = "0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be";

    fn transfer(value: &str, secs_ago: i64) -> Transfer {
        Transfer {
            id: format!("t-{value}"),
            transaction: "0xfeed".into(),
            timestamp: (now().timestamp() - secs_ago).to_string(),
            value: value.into(),
            from: Account {
                address: BURN.into(),
                ..Default::default()
            },
            to: Account {
                address: BINANCE.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn burn_to_known_exchange() {
        let settings = Settings::default();
        let card = AlertCard::new(&transfer("50000000000", 10), &settings, now());

        assert_eq!(card.amount, "$50.00K");
        assert_eq!(card.exact_amount, "$50,000.00");
        assert_eq!(card.tier, SeverityTier::Medium);
        assert_eq!(card.from.label, "Burn Address");
        assert_eq!(card.to.label, "Binance");
        assert_eq!(card.to.kind, AddressKind::Exchange);
        assert_eq!(card.time_ago, "just now");
        assert!(!card.mega);

        let text = card.to_string();
        assert!(text.contains("From: Burn Address"));
        assert!(text.contains("To:   Binance"));
    }

    #[test]
    fn formatting_is_idempotent() {
        let settings = Settings::default();
        let t = transfer("1234567890000", 4000);
        assert_eq!(
            AlertCard::new(&t, &settings, now()),
            AlertCard::new(&t, &settings, now())
        );
    }

    #[test]
    fn negative_and_malformed_values_show_zero() {
        let settings = Settings::default();
        let card = AlertCard::new(&transfer("-100", 10), &settings, now());
        assert_eq!(card.amount, "$0.00");
        assert_eq!(card.tier, SeverityTier::Low);

        let mut odd = transfer("oops", 10);
        odd.timestamp = String::new();
        odd.from = Account::default();
        let card = AlertCard::new(&odd, &settings, now());
        assert_eq!(card.amount, "$0.00");
        assert_eq!(card.time_ago, "");
        assert_eq!(card.from.to_string(), "Unknown");
    }

    #[test]
    fn mega_badge_and_tier() {
        let settings = Settings::default();
        let card = AlertCard::new(&transfer("12000000000000", 10), &settings, now());
        assert_eq!(card.amount, "$12.00M");
        assert_eq!(card.tier, SeverityTier::Mega);
        assert!(card.mega);
        assert!(card.to_string().contains("Mega Whale"));
    }

    #[test]
    fn empty_stream_suggests_filters() {
        let settings = Settings::default();
        let stream = build(&TransfersResponse::default(), AlertFilter::Mega, &settings, now());
        assert_eq!(stream.filter, "Mega Whales ($1.00M+)");
        assert!(stream.to_string().contains("No whale alerts found"));
    }

    #[test]
    fn filter_changes_requery() {
        let settings = Settings::default();
        let mut screen = AlertsScreen::new(AlertFilter::All, None, &settings);
        assert_eq!(screen.query().min_amount, "50000000000");

        assert_eq!(screen.command("f medium"), CommandOutcome::Refetch);
        assert_eq!(screen.query().min_amount, "250000000000");
        assert_eq!(screen.command("f MEGA"), CommandOutcome::Refetch);
        assert_eq!(screen.query().min_amount, "1000000000000");
        assert!(matches!(screen.command("f huge"), CommandOutcome::Unknown(_)));
    }

    #[test]
    fn custom_minimum_overrides_preset() {
        let settings = Settings::default();
        let screen = AlertsScreen::new(AlertFilter::All, Some(75_000.0), &settings);
        assert_eq!(screen.query().min_amount, "75000000000");
        let stream = screen.build(&TransfersResponse::default(), &ctx(&settings));
        assert_eq!(stream.filter, "Custom ($75.00K+)");
    }

    #[test]
    fn bell_rings_once_per_new_large_transfer() {
        let settings = Settings::default();
        let mut context = ctx(&settings);
        context.prefs.bell = true;
        let mut screen = AlertsScreen::new(AlertFilter::All, None, &settings);

        let big = TransfersResponse {
            transfers: vec![transfer("2000000000000", 5)],
        };
        assert!(screen.alarm(&big, &context));
        assert!(!screen.alarm(&big, &context));

        let small = TransfersResponse {
            transfers: vec![transfer("60000000000", 1)],
        };
        assert!(!screen.alarm(&small, &context));
    }

    #[test]
    fn bell_rings_for_new_heads_without_ids() {
        let settings = Settings::default();
        let mut context = ctx(&settings);
        context.prefs.bell = true;
        let mut screen = AlertsScreen::new(AlertFilter::All, None, &settings);
        let head = |secs_ago: i64, tx: &str| {
            let mut t = transfer("2000000000000", secs_ago);
            t.id = String::new();
            t.transaction = tx.into();
            TransfersResponse { transfers: vec![t] }
        };

        assert!(screen.alarm(&head(30, "0xaa"), &context));
        assert!(!screen.alarm(&head(30, "0xaa"), &context));
        assert!(screen.alarm(&head(10, "0xbb"), &context));
        assert!(screen.alarm(&head(10, "0xcc"), &context));
    }

    #[test]
    fn quarter_million_is_large() {
        let settings = Settings::default();
        let card = AlertCard::new(&transfer("300000000000", 10), &settings, now());
        assert_eq!(card.amount, "$300.00K");
        assert_eq!(card.tier, SeverityTier::Large);
        assert!(!card.mega);
    }

    #[tokio::test]
    async fn end_to_end_from_gateway() {
        let settings = Settings::default();
        let transport = Arc::new(ScriptedTransport::with(vec![ScriptedTransport::data(json!({
            "transfers": [{
                "value": "50000000000",
                "timestamp": (now().timestamp() - 30).to_string(),
                "from": { "address": BURN },
                "to": { "address": BINANCE }
            }]
        }))]));
        let gateway = Gateway::new(transport, RetryPolicy::default());
        let screen = AlertsScreen::new(AlertFilter::All, None, &settings);

        let data = screen.load(&gateway, now()).await.unwrap();
        let stream = screen.build(&data, &ctx(&settings));
        let card = &stream.cards[0];
        assert_eq!(card.amount, "$50.00K");
        assert_eq!(card.tier, SeverityTier::Medium);
        assert_eq!(card.from.label, "Burn Address");
        assert_eq!(card.to.label, "Binance");
        assert_eq!(card.time_ago, "just now");
        assert!(card.url.is_none());

        assert_eq!(screen.cached(&gateway), Some(data));
    }
}
