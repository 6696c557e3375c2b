//! Inflow/outflow analysis for a single address.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{signed_abbreviate, RenderContext, Screen};
use crate::config::Settings;
use crate::error::GatewayError;
use crate::format;
use crate::gateway::Gateway;
use crate::labels::{self, AddressKind};
use crate::queries::WhaleFlowAnalysis;
use crate::transfer::{FlowAnalysisResponse, Transfer};
use crate::units::{self, Units};

const TOP_COUNTERPARTIES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlowDirection {
    Accumulating,
    Distributing,
    Neutral,
}

impl fmt::Display for FlowDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FlowDirection::Accumulating => "📈 Accumulating",
            FlowDirection::Distributing => "📉 Distributing",
            FlowDirection::Neutral => "➖ Neutral",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Counterparty {
    pub address: String,
    pub short: String,
    pub label: &'static str,
    pub kind: AddressKind,
    pub color: String,
    pub received_usd: f64,
    pub sent_usd: f64,
    pub volume: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowReport {
    pub address: String,
    pub label: &'static str,
    pub hours: u32,
    pub inflow_count: usize,
    pub outflow_count: usize,
    pub inflow_usd: f64,
    pub outflow_usd: f64,
    pub inflow: String,
    pub outflow: String,
    pub net: String,
    pub direction: FlowDirection,
    /// Volume exchanged with known centralised exchanges.
    pub exchange_volume: String,
    /// Volume exchanged with known DEX routers.
    pub dex_volume: String,
    pub counterparties: Vec<Counterparty>,
    pub url: String,
}

#[derive(Default)]
struct Tally {
    received: f64,
    sent: f64,
}

fn total(transfers: &[Transfer], units: Units) -> f64 {
    transfers.iter().map(|t| units.scale(&t.value)).sum()
}

pub fn build(resp: &FlowAnalysisResponse, address: &str, hours: u32, settings: &Settings) -> FlowReport {
    let units = settings.units;
    let inflow_usd = total(&resp.inflow_transfers, units);
    let outflow_usd = total(&resp.outflow_transfers, units);
    let net_usd = inflow_usd - outflow_usd;
    let direction = if net_usd > 0.0 {
        FlowDirection::Accumulating
    } else if net_usd < 0.0 {
        FlowDirection::Distributing
    } else {
        FlowDirection::Neutral
    };

    // Inflows credit the sender, outflows the recipient.
    let mut tallies: HashMap<String, Tally> = HashMap::new();
    for t in &resp.inflow_transfers {
        tallies.entry(t.from.address.to_lowercase()).or_default().sent += units.scale(&t.value);
    }
    for t in &resp.outflow_transfers {
        tallies.entry(t.to.address.to_lowercase()).or_default().received += units.scale(&t.value);
    }

    let mut exchange_volume = 0.0;
    let mut dex_volume = 0.0;
    let mut counterparties: Vec<Counterparty> = tallies
        .into_iter()
        .filter(|(addr, _)| !addr.is_empty())
        .map(|(addr, tally)| {
            let volume = tally.received + tally.sent;
            if labels::is_exchange(&addr) {
                exchange_volume += volume;
            } else if labels::is_dex(&addr) {
                dex_volume += volume;
            }
            Counterparty {
                short: format::shorten_address(&addr),
                label: labels::label_of(&addr),
                kind: labels::kind_of(&addr),
                color: labels::address_color(&addr),
                received_usd: tally.received,
                sent_usd: tally.sent,
                volume: format::abbreviate(volume),
                address: addr,
            }
        })
        .collect();
    counterparties.sort_by(|a, b| {
        let (va, vb) = (a.received_usd + a.sent_usd, b.received_usd + b.sent_usd);
        vb.total_cmp(&va).then_with(|| a.address.cmp(&b.address))
    });
    counterparties.truncate(TOP_COUNTERPARTIES);

    FlowReport {
        address: address.to_string(),
        label: labels::label_of(address),
        hours,
        inflow_count: resp.inflow_transfers.len(),
        outflow_count: resp.outflow_transfers.len(),
        inflow_usd,
        outflow_usd,
        inflow: format::abbreviate(inflow_usd),
        outflow: format::abbreviate(outflow_usd),
        net: signed_abbreviate(net_usd),
        direction,
        exchange_volume: format::abbreviate(exchange_volume),
        dex_volume: format::abbreviate(dex_volume),
        counterparties,
        url: settings.explorer.address(address),
    }
}

impl fmt::Display for FlowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({}) · last {}h",
            self.label,
            format::shorten_address(&self.address),
            self.hours
        )?;
        writeln!(f, "  Inflow:   {:>10}  ({} transfers)", self.inflow, self.inflow_count)?;
        writeln!(f, "  Outflow:  {:>10}  ({} transfers)", self.outflow, self.outflow_count)?;
        writeln!(f, "  Net:      {:>10}  {}", self.net, self.direction)?;
        writeln!(
            f,
            "  Exchanges: {} · DEX routers: {}",
            self.exchange_volume, self.dex_volume
        )?;
        if self.counterparties.is_empty() {
            writeln!(f, "No flows in this window")?;
            return write!(f, "  Try a longer window with --hours");
        }
        writeln!(f, "Top counterparties")?;
        for c in &self.counterparties {
            writeln!(f, "  {:<22} {:<14} {:>10}", c.label, c.short, c.volume)?;
        }
        write!(f, "{}", self.url)
    }
}

#[derive(Debug, Clone)]
pub struct FlowsScreen {
    pub address: String,
    pub hours: u32,
}

impl FlowsScreen {
    pub fn new(address: impl Into<String>, hours: u32) -> Self {
        Self {
            address: address.into().trim().to_string(),
            hours,
        }
    }

    pub fn query(&self, now: DateTime<Utc>) -> WhaleFlowAnalysis {
        WhaleFlowAnalysis {
            whale_address: self.address.clone(),
            since: units::seconds_ago(now, i64::from(self.hours) * 3_600),
        }
    }
}

#[async_trait]
impl Screen for FlowsScreen {
    type Data = FlowAnalysisResponse;
    type Model = FlowReport;

    fn title(&self) -> String {
        "Whale Flow Analysis".into()
    }

    async fn load(&self, gateway: &Gateway, now: DateTime<Utc>) -> Result<FlowAnalysisResponse, GatewayError> {
        gateway.fetch(&self.query(now)).await
    }

    fn build(&self, data: &FlowAnalysisResponse, ctx: &RenderContext<'_>) -> FlowReport {
        build(data, &self.address, self.hours, ctx.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::Account;
    use crate::views::tests::now;

    const WHALE: &str = "0x9999999999999999999999999999999999999999";
    const BINANCE: &str = "0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be";
    const UNISWAP: &str = "0x7a250d5630b4cf539739df2c5dacb4c659f2488d";

    fn transfer(from: &str, to: &str, usd: u64) -> Transfer {
        Transfer {
            value: format!("{usd}000000"),
            from: Account {
                address: from.into(),
                ..Default::default()
            },
            to: Account {
                address: to.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn net_flow_and_direction() {
        let settings = Settings::default();
        let resp = FlowAnalysisResponse {
            inflow_transfers: vec![transfer(BINANCE, WHALE, 3_000_000), transfer(BINANCE, WHALE, 500_000)],
            outflow_transfers: vec![transfer(WHALE, UNISWAP, 1_000_000)],
        };
        let report = build(&resp, WHALE, 24, &settings);

        assert_eq!(report.inflow, "$3.50M");
        assert_eq!(report.outflow, "$1.00M");
        assert_eq!(report.net, "$2.50M");
        assert_eq!(report.direction, FlowDirection::Accumulating);
        assert_eq!(report.exchange_volume, "$3.50M");
        assert_eq!(report.dex_volume, "$1.00M");

        assert_eq!(report.counterparties.len(), 2);
        assert_eq!(report.counterparties[0].label, "Binance");
        assert_eq!(report.counterparties[0].kind, AddressKind::Exchange);
        assert_eq!(report.counterparties[1].label, "Uniswap Router");
    }

    #[test]
    fn distributing_shows_negative_net() {
        let settings = Settings::default();
        let resp = FlowAnalysisResponse {
            inflow_transfers: vec![],
            outflow_transfers: vec![transfer(WHALE, BINANCE, 20_000)],
        };
        let report = build(&resp, WHALE, 6, &settings);
        assert_eq!(report.net, "-$20.00K");
        assert_eq!(report.direction, FlowDirection::Distributing);
        assert!(report.to_string().contains("Distributing"));
    }

    #[test]
    fn empty_window() {
        let settings = Settings::default();
        let report = build(&FlowAnalysisResponse::default(), WHALE, 24, &settings);
        assert_eq!(report.direction, FlowDirection::Neutral);
        assert_eq!(report.net, "$0.00");
        assert!(report.to_string().contains("No flows in this window"));
    }

    #[test]
    fn counterparty_addresses_merge_across_case() {
        let settings = Settings::default();
        let upper = BINANCE.to_uppercase().replacen("0X", "0x", 1);
        let resp = FlowAnalysisResponse {
            inflow_transfers: vec![transfer(&upper, WHALE, 1_000)],
            outflow_transfers: vec![transfer(WHALE, BINANCE, 2_000)],
        };
        let report = build(&resp, WHALE, 24, &settings);
        assert_eq!(report.counterparties.len(), 1);
        assert_eq!(report.counterparties[0].volume, "$3.00K");
    }

    #[test]
    fn window_follows_hours() {
        let q = FlowsScreen::new(" 0xABC ", 6).query(now());
        assert_eq!(q.since, "1699978400");
        assert_eq!(q.whale_address, "0xABC");
    }
}
