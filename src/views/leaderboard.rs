//! Top USDC holders.
//!
//! The query fetches every account above the band floor; the category filter
//! is applied locally, since that superset already holds every row any
//! filter can show.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Serialize;

use super::{CommandOutcome, RenderContext, Screen};
use crate::config::{Settings, WhaleBands};
use crate::error::GatewayError;
use crate::format;
use crate::gateway::Gateway;
use crate::labels;
use crate::queries::WhaleLeaderboard;
use crate::transfer::{Account, AccountsResponse};
use crate::units::Units;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WhaleCategory {
    Mega,
    Large,
    Medium,
    Small,
}

impl WhaleCategory {
    pub fn of(balance: f64, bands: &WhaleBands) -> Self {
        if balance >= bands.mega {
            WhaleCategory::Mega
        } else if balance >= bands.large {
            WhaleCategory::Large
        } else if balance >= bands.medium {
            WhaleCategory::Medium
        } else {
            WhaleCategory::Small
        }
    }
}

impl fmt::Display for WhaleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WhaleCategory::Mega => "Mega Whale",
            WhaleCategory::Large => "Large Whale",
            WhaleCategory::Medium => "Medium Whale",
            WhaleCategory::Small => "Small Holder",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardFilter {
    All,
    Mega,
    Large,
    Medium,
}

impl LeaderboardFilter {
    pub fn admits(self, balance: f64, bands: &WhaleBands) -> bool {
        match self {
            LeaderboardFilter::All => balance >= bands.floor,
            LeaderboardFilter::Mega => balance >= bands.mega,
            LeaderboardFilter::Large => balance >= bands.large && balance < bands.mega,
            LeaderboardFilter::Medium => balance >= bands.medium && balance < bands.large,
        }
    }
}

pub fn rank_emoji(rank: usize) -> &'static str {
    match rank {
        1 => "👑",
        2..=3 => "🐋",
        4..=10 => "🐳",
        _ => "🐟",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub emoji: &'static str,
    pub address: String,
    pub short: String,
    pub label: &'static str,
    pub balance_usd: f64,
    pub balance: String,
    pub category: WhaleCategory,
    pub recent_activity: usize,
    pub last_active: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub mega: usize,
    pub large: usize,
    pub medium: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leaderboard {
    pub filter: LeaderboardFilter,
    pub counts: CategoryCounts,
    pub rows: Vec<LeaderboardRow>,
}

/// Most recent transfer timestamp in either direction.
fn last_active(account: &Account) -> Option<&str> {
    account
        .transfers_from
        .iter()
        .chain(account.transfers_to.iter())
        .map(|s| s.timestamp.as_str())
        .max_by_key(|ts| ts.parse::<i64>().unwrap_or(0))
}

pub fn build(
    resp: &AccountsResponse,
    filter: LeaderboardFilter,
    settings: &Settings,
    now: DateTime<Utc>,
) -> Leaderboard {
    let bands = &settings.whale_bands;
    let mut counts = CategoryCounts::default();
    let mut rows = Vec::new();

    for account in &resp.accounts {
        let balance_usd = settings.units.scale(&account.balance);
        let category = WhaleCategory::of(balance_usd, bands);
        match category {
            WhaleCategory::Mega => counts.mega += 1,
            WhaleCategory::Large => counts.large += 1,
            WhaleCategory::Medium => counts.medium += 1,
            WhaleCategory::Small => {}
        }

        if !filter.admits(balance_usd, bands) {
            continue;
        }

        let rank = rows.len() + 1;
        rows.push(LeaderboardRow {
            rank,
            emoji: rank_emoji(rank),
            address: account.address.clone(),
            short: format::shorten_address(&account.address),
            label: labels::label_of(&account.address),
            balance_usd,
            balance: format::abbreviate(balance_usd),
            category,
            recent_activity: account.transfers_from.len() + account.transfers_to.len(),
            last_active: last_active(account)
                .map(|ts| format::relative_time(ts, now))
                .unwrap_or_default(),
            url: settings.explorer.address(&account.address),
        });
    }

    Leaderboard {
        filter,
        counts,
        rows,
    }
}

impl fmt::Display for Leaderboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} Whales · Mega: {} · Large: {} · Medium: {}",
            format::abbreviate_number(self.rows.len() as f64),
            format::abbreviate_number(self.counts.mega as f64),
            format::abbreviate_number(self.counts.large as f64),
            format::abbreviate_number(self.counts.medium as f64),
        )?;
        if self.rows.is_empty() {
            writeln!(f, "No whales found")?;
            return write!(f, "  Try a different filter or refresh to check for new data");
        }
        for row in &self.rows {
            write!(
                f,
                "{:>3} {} {:<14} {:<22} {:>10}  {}",
                row.rank, row.emoji, row.short, row.label, row.balance, row.category
            )?;
            if !row.last_active.is_empty() {
                write!(f, "  · active {}", row.last_active)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LeaderboardScreen {
    pub filter: LeaderboardFilter,
    pub limit: u32,
    units: Units,
    floor: f64,
}

impl LeaderboardScreen {
    pub fn new(filter: LeaderboardFilter, limit: u32, settings: &Settings) -> Self {
        Self {
            filter,
            limit,
            units: settings.units,
            floor: settings.whale_bands.floor,
        }
    }

    pub fn query(&self) -> WhaleLeaderboard {
        WhaleLeaderboard {
            min_balance: self.units.to_raw(self.floor),
            first: self.limit,
        }
    }
}

#[async_trait]
impl Screen for LeaderboardScreen {
    type Data = AccountsResponse;
    type Model = Leaderboard;

    fn title(&self) -> String {
        "Whale Leaderboard".into()
    }

    async fn load(&self, gateway: &Gateway, _now: DateTime<Utc>) -> Result<AccountsResponse, GatewayError> {
        gateway.fetch(&self.query()).await
    }

    fn cached(&self, gateway: &Gateway) -> Option<AccountsResponse> {
        gateway.cached(&self.query()).map(|(data, _)| data)
    }

    fn build(&self, data: &AccountsResponse, ctx: &RenderContext<'_>) -> Leaderboard {
        build(data, self.filter, ctx.settings, ctx.now)
    }

    fn command(&mut self, input: &str) -> CommandOutcome {
        let parsed = input
            .strip_prefix("f ")
            .and_then(|arg| LeaderboardFilter::from_str(arg.trim(), true).ok());
        match parsed {
            Some(filter) => {
                self.filter = filter;
                CommandOutcome::Rerender
            }
            None => CommandOutcome::Unknown(input.to_string()),
        }
    }

    fn help(&self) -> &'static str {
        "f all|mega|large|medium  change the category filter"
    }
}
