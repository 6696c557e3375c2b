use colored::{ColoredString, Colorize};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size class of a single transfer, ordered smallest to largest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeverityTier {
    Low,
    Medium,
    Large,
    High,
    Mega,
}

impl SeverityTier {
    /// Hex color used by renderers and exports.
    pub fn color(self) -> &'static str {
        match self {
            SeverityTier::Low => "#2ECC40",
            SeverityTier::Medium => "#FFDC00",
            SeverityTier::Large => "#FF851B",
            SeverityTier::High => "#FF4136",
            SeverityTier::Mega => "#B10DC9",
        }
    }

    fn rgb(self) -> (u8, u8, u8) {
        match self {
            SeverityTier::Low => (0x2E, 0xCC, 0x40),
            SeverityTier::Medium => (0xFF, 0xDC, 0x00),
            SeverityTier::Large => (0xFF, 0x85, 0x1B),
            SeverityTier::High => (0xFF, 0x41, 0x36),
            SeverityTier::Mega => (0xB1, 0x0D, 0xC9),
        }
    }

    /// Paint `text` in this tier's color for the terminal.
    pub fn paint(self, text: &str) -> ColoredString {
        let (r, g, b) = self.rgb();
        let painted = text.truecolor(r, g, b);
        if self >= SeverityTier::High {
            painted.bold()
        } else {
            painted
        }
    }

    /// Tiers that ring the terminal bell when the user enabled it.
    pub fn is_alarming(self) -> bool {
        self >= SeverityTier::High
    }
}

impl fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeverityTier::Low => "LOW",
            SeverityTier::Medium => "MEDIUM",
            SeverityTier::Large => "LARGE",
            SeverityTier::High => "HIGH",
            SeverityTier::Mega => "MEGA",
        };
        f.write_str(name)
    }
}

/// Lower bounds (inclusive, display currency) of each tier above `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub medium: f64,
    pub large: f64,
    pub high: f64,
    pub mega: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            medium: 50_000.0,
            large: 250_000.0,
            high: 1_000_000.0,
            mega: 10_000_000.0,
        }
    }
}

impl Thresholds {
    /// Highest tier whose threshold `value` meets or exceeds.
    pub fn severity_of(&self, value: f64) -> SeverityTier {
        if !value.is_finite() {
            return SeverityTier::Low;
        }
        if value >= self.mega {
            SeverityTier::Mega
        } else if value >= self.high {
            SeverityTier::High
        } else if value >= self.large {
            SeverityTier::Large
        } else if value >= self.medium {
            SeverityTier::Medium
        } else {
            SeverityTier::Low
        }
    }

    pub fn is_monotonic(&self) -> bool {
        let bounds = [self.medium, self.large, self.high, self.mega];
        bounds.iter().all(|t| t.is_finite() && *t >= 0.0) && bounds.windows(2).all(|w| w[0] < w[1])
    }
}
