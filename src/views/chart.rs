//! Hourly transfer volume as a horizontal bar chart.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{RenderContext, Screen};
use crate::config::Settings;
use crate::error::GatewayError;
use crate::format;
use crate::gateway::Gateway;
use crate::queries::HourlyActivity;
use crate::transfer::TransfersResponse;
use crate::units;

const BAR_WIDTH: usize = 40;
const HOUR: i64 = 3_600;
/// One week of hourly rows.
const MAX_HOURS: u32 = 168;
/// The indexer caps the response at this many rows.
const PAGE_CAP: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourBucket {
    /// Unix seconds at the start of the hour.
    pub start: i64,
    pub label: String,
    pub count: usize,
    pub volume_usd: f64,
    pub volume: String,
    pub bar: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeChart {
    pub buckets: Vec<HourBucket>,
    pub total: String,
    pub peak: Option<String>,
    /// A full page came back oldest-first, so the latest hours may be undercounted.
    pub truncated: bool,
}

fn bar_len(volume: f64, max: f64) -> usize {
    if volume <= 0.0 || max <= 0.0 {
        return 0;
    }
    (((volume / max) * BAR_WIDTH as f64).round() as usize).clamp(1, BAR_WIDTH)
}

/// Bucket transfers into the `hours` whole hours ending with the current one.
pub fn build(resp: &TransfersResponse, hours: u32, settings: &Settings, now: DateTime<Utc>) -> VolumeChart {
    let hours = hours.clamp(1, MAX_HOURS) as usize;
    let current = now.timestamp().div_euclid(HOUR) * HOUR;
    let first = current - (hours as i64 - 1) * HOUR;

    let mut counts = vec![0usize; hours];
    let mut volumes = vec![0f64; hours];
    for t in &resp.transfers {
        let Ok(ts) = t.timestamp.trim().parse::<i64>() else {
            continue;
        };
        if ts < first || ts >= current + HOUR {
            continue;
        }
        let slot = ((ts - first) / HOUR) as usize;
        counts[slot] += 1;
        volumes[slot] += settings.units.scale(&t.value);
    }

    let max = volumes.iter().copied().fold(0.0, f64::max);
    let total: f64 = volumes.iter().sum();
    let buckets: Vec<HourBucket> = (0..hours)
        .map(|i| {
            let start = first + i as i64 * HOUR;
            HourBucket {
                start,
                label: DateTime::from_timestamp(start, 0)
                    .map(|dt| dt.format("%H:00").to_string())
                    .unwrap_or_default(),
                count: counts[i],
                volume_usd: volumes[i],
                volume: format::abbreviate(volumes[i]),
                bar: bar_len(volumes[i], max),
            }
        })
        .collect();
    let peak = buckets
        .iter()
        .filter(|b| b.volume_usd > 0.0)
        .max_by(|a, b| a.volume_usd.total_cmp(&b.volume_usd))
        .map(|b| b.label.clone());

    VolumeChart {
        buckets,
        total: format::abbreviate(total),
        peak,
        truncated: resp.transfers.len() >= PAGE_CAP,
    }
}

impl fmt::Display for VolumeChart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Hourly volume (UTC) · total {}", self.total)?;
        for b in &self.buckets {
            writeln!(
                f,
                "{}  {:<width$}  {:>10}  ({})",
                b.label,
                "█".repeat(b.bar),
                b.volume,
                b.count,
                width = BAR_WIDTH
            )?;
        }
        match &self.peak {
            Some(label) => write!(f, "Peak hour: {label}")?,
            None => write!(f, "No transfers in this window")?,
        }
        if self.truncated {
            write!(f, "\n(only the first {PAGE_CAP} transfers in the window were returned)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ChartScreen {
    pub hours: u32,
}

impl ChartScreen {
    pub fn new(hours: u32) -> Self {
        Self {
            hours: hours.clamp(1, MAX_HOURS),
        }
    }

    pub fn query(&self, now: DateTime<Utc>) -> HourlyActivity {
        HourlyActivity {
            since: units::seconds_ago(now, i64::from(self.hours) * HOUR),
        }
    }
}

#[async_trait]
impl Screen for ChartScreen {
    type Data = TransfersResponse;
    type Model = VolumeChart;

    fn title(&self) -> String {
        "Transfer Volume".into()
    }

    async fn load(&self, gateway: &Gateway, now: DateTime<Utc>) -> Result<TransfersResponse, GatewayError> {
        gateway.fetch(&self.query(now)).await
    }

    fn build(&self, data: &TransfersResponse, ctx: &RenderContext<'_>) -> VolumeChart {
        build(data, self.hours, ctx.settings, ctx.now)
    }
}
