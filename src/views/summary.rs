//! Network-wide totals and recent whale activity.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::alerts::AlertCard;
use super::{RenderContext, Screen};
use crate::config::Settings;
use crate::error::GatewayError;
use crate::format;
use crate::gateway::Gateway;
use crate::queries::{ActivitySummary, LatestTransfers, TokenInfo};
use crate::transfer::{ActivitySummaryResponse, TokensResponse, Transfer, TransfersResponse};
use crate::units::{self, Units};

/// The indexer caps each list at this many rows.
const PAGE_CAP: usize = 1000;
const LATEST_COUNT: u32 = 5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryData {
    pub token: TokensResponse,
    pub activity: ActivitySummaryResponse,
    pub latest: TransfersResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenTotals {
    pub name: String,
    pub symbol: String,
    pub total_supply_usd: f64,
    pub total_supply: String,
    pub holders: String,
    pub transfers: String,
    pub url: String,
}

/// Count and volume of one activity window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowStats {
    pub count: usize,
    /// The indexer returned a full page, so the true count may be higher.
    pub capped: bool,
    pub volume_usd: f64,
    pub volume: String,
}

impl WindowStats {
    fn new(transfers: &[Transfer], units: Units) -> Self {
        let volume_usd: f64 = transfers.iter().map(|t| units.scale(&t.value)).sum();
        Self {
            count: transfers.len(),
            capped: transfers.len() >= PAGE_CAP,
            volume_usd,
            volume: format::abbreviate(volume_usd),
        }
    }

    fn count_label(&self) -> String {
        let count = format::abbreviate_number(self.count as f64);
        if self.capped {
            format!("{count}+")
        } else {
            count
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub token: Option<TokenTotals>,
    pub whale_min: String,
    pub last_1h: WindowStats,
    pub last_24h: WindowStats,
    pub whales_1h: WindowStats,
    pub whales_24h: WindowStats,
    /// Last hour's transfer rate against the 24h hourly average.
    pub pace: String,
    pub latest: Vec<AlertCard>,
}

fn token_totals(resp: &TokensResponse, settings: &Settings) -> Option<TokenTotals> {
    let token = resp.tokens.first()?;
    let units = settings.units;
    let total_supply_usd = units.scale(&token.total_supply);
    Some(TokenTotals {
        name: token.name.clone().unwrap_or_else(|| "USD Coin".into()),
        symbol: token.symbol.clone().unwrap_or_else(|| "USDC".into()),
        total_supply_usd,
        total_supply: format::abbreviate(total_supply_usd),
        holders: format::abbreviate_number(units::parse_count(&token.holder_count) as f64),
        transfers: format::abbreviate_number(units::parse_count(&token.transfer_count) as f64),
        url: settings.explorer.token(&token.id),
    })
}

pub fn build(data: &SummaryData, settings: &Settings, now: DateTime<Utc>) -> DashboardSummary {
    let units = settings.units;
    let last_1h = WindowStats::new(&data.activity.last1h, units);
    let last_24h = WindowStats::new(&data.activity.last24h, units);
    let hourly_average = last_24h.count as f64 / 24.0;
    let pace = (last_1h.count as f64 - hourly_average) / hourly_average * 100.0;

    DashboardSummary {
        token: token_totals(&data.token, settings),
        whale_min: format::abbreviate(settings.alert_presets.all),
        last_1h,
        last_24h,
        whales_1h: WindowStats::new(&data.activity.whales_last1h, units),
        whales_24h: WindowStats::new(&data.activity.whales_last24h, units),
        pace: format::percent_change(pace),
        latest: data
            .latest
            .transfers
            .iter()
            .map(|t| AlertCard::new(t, settings, now))
            .collect(),
    }
}

impl fmt::Display for DashboardSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.token {
            Some(token) => {
                writeln!(f, "{} ({})", token.name, token.symbol)?;
                writeln!(f, "  Total supply:  {}", token.total_supply)?;
                writeln!(f, "  Holders:       {}", token.holders)?;
                writeln!(f, "  Transfers:     {}", token.transfers)?;
                writeln!(f, "  {}", token.url)?;
            }
            None => writeln!(f, "Token data unavailable")?,
        }
        writeln!(f)?;
        writeln!(f, "Activity          1h          24h")?;
        writeln!(
            f,
            "  Transfers   {:>10}   {:>10}   ({} vs 24h avg)",
            self.last_1h.count_label(),
            self.last_24h.count_label(),
            self.pace
        )?;
        writeln!(
            f,
            "  Whales      {:>10}   {:>10}   ({}+)",
            self.whales_1h.count_label(),
            self.whales_24h.count_label(),
            self.whale_min
        )?;
        writeln!(
            f,
            "  Whale vol   {:>10}   {:>10}",
            self.whales_1h.volume, self.whales_24h.volume
        )?;
        writeln!(f)?;
        writeln!(f, "Latest transfers")?;
        if self.latest.is_empty() {
            return write!(f, "  No recent transfers");
        }
        for card in &self.latest {
            writeln!(
                f,
                "  {}  {} → {}  {}",
                card.tier.paint(&format!("{:>10}", card.amount)),
                card.from,
                card.to,
                card.time_ago
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SummaryScreen {
    units: Units,
    whale_min: f64,
}

impl SummaryScreen {
    pub fn new(settings: &Settings) -> Self {
        Self {
            units: settings.units,
            whale_min: settings.alert_presets.all,
        }
    }

    pub fn activity_query(&self, now: DateTime<Utc>) -> ActivitySummary {
        ActivitySummary {
            since_1h: units::seconds_ago(now, 3_600),
            since_24h: units::seconds_ago(now, 86_400),
            whale_min: self.units.to_raw(self.whale_min),
        }
    }
}

#[async_trait]
impl Screen for SummaryScreen {
    type Data = SummaryData;
    type Model = DashboardSummary;

    fn title(&self) -> String {
        "Whale Activity Summary".into()
    }

    async fn load(&self, gateway: &Gateway, now: DateTime<Utc>) -> Result<SummaryData, GatewayError> {
        let activity = self.activity_query(now);
        let latest = LatestTransfers {
            first: LATEST_COUNT,
        };
        let (token, activity, latest) = tokio::try_join!(
            gateway.fetch(&TokenInfo),
            gateway.fetch(&activity),
            gateway.fetch(&latest),
        )?;
        Ok(SummaryData {
            token,
            activity,
            latest,
        })
    }

    fn build(&self, data: &SummaryData, ctx: &RenderContext<'_>) -> DashboardSummary {
        build(data, ctx.settings, ctx.now)
    }
}
