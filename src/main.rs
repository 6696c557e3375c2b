use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};

mod config;
mod error;
mod format;
mod gateway;
mod labels;
mod logging;
mod monitor;
mod queries;
mod severity;
mod transfer;
mod units;
mod views;

use config::{Explorer, FileConfig, Settings};
use gateway::{Gateway, HttpTransport, RefreshPolicy};
use monitor::MonitorOptions;
use units::Units;
use views::alerts::{AlertFilter, AlertsScreen};
use views::chart::ChartScreen;
use views::flows::FlowsScreen;
use views::history::HistoryScreen;
use views::leaderboard::{LeaderboardFilter, LeaderboardScreen};
use views::summary::SummaryScreen;
use views::Preferences;

#[derive(Parser, Debug)]
#[command(name = "whale-watch", author, version, about = "Watch large USDC transfers from the terminal", long_about = None)]
struct Cli {
    /// GraphQL endpoint (overrides the URL built from the API key)
    #[arg(long, global = true, env = "WHALE_WATCH_ENDPOINT")]
    endpoint: Option<String>,

    /// The Graph gateway API key
    #[arg(long, global = true, env = "GRAPH_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Subgraph deployment id
    #[arg(long, global = true, default_value = config::SUBGRAPH_ID)]
    subgraph_id: String,

    /// JSON settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Poll interval in seconds (0 refreshes only on request)
    #[arg(long, global = true)]
    poll_secs: Option<u64>,

    /// Token decimals used to scale raw amounts
    #[arg(long, global = true)]
    decimals: Option<u32>,

    /// Render once and exit
    #[arg(long, global = true, default_value_t = false)]
    once: bool,

    /// Write the rendered view to this file as JSON
    #[arg(long, global = true)]
    export: Option<PathBuf>,

    #[arg(long, global = true, default_value_t = false)]
    no_color: bool,

    /// Ring the terminal bell on high-severity alerts
    #[arg(long, global = true, default_value_t = false)]
    bell: bool,

    /// Also write JSON logs to a daily file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Block explorer base URL for links
    #[arg(long, global = true)]
    explorer_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Live stream of large transfers
    Alerts {
        #[arg(long, value_enum, default_value_t = AlertFilter::All)]
        filter: AlertFilter,
        /// Custom minimum in USD (overrides --filter)
        #[arg(long)]
        min_usd: Option<f64>,
    },
    /// Top holders by balance
    Leaderboard {
        #[arg(long, value_enum, default_value_t = LeaderboardFilter::All)]
        filter: LeaderboardFilter,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Token totals and recent activity
    Summary,
    /// Page through transfers in a past window
    History {
        #[arg(long, default_value_t = 24)]
        hours: u32,
        #[arg(long)]
        min_usd: Option<f64>,
        #[arg(long)]
        page_size: Option<u32>,
    },
    /// Inflows and outflows of one address
    Flows {
        #[arg(long)]
        address: String,
        #[arg(long, default_value_t = 24)]
        hours: u32,
    },
    /// Hourly transfer volume
    Chart {
        #[arg(long, default_value_t = 24)]
        hours: u32,
    },
}

/// Defaults, then the config file, then flags and environment.
fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings {
        endpoint: config::gateway_url(cli.api_key.as_deref(), &cli.subgraph_id),
        ..Settings::default()
    };
    if let Some(path) = &cli.config {
        settings = settings.merge_file(FileConfig::load(path)?);
    }
    if let Some(endpoint) = &cli.endpoint {
        settings.endpoint = endpoint.clone();
    }
    if let Some(secs) = cli.poll_secs {
        settings.refresh = RefreshPolicy::from_secs(secs);
    }
    if let Some(decimals) = cli.decimals {
        settings.units = Units::new(decimals);
    }
    if let Some(url) = &cli.explorer_url {
        settings.explorer = Explorer {
            base_url: url.clone(),
        };
    }
    settings.validate()?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init_tracing(cli.log_dir.as_deref())?;

    let settings = Arc::new(load_settings(&cli).context("invalid configuration")?);
    settings.log_summary();

    let transport = HttpTransport::new(settings.endpoint.clone(), settings.request_timeout)
        .context("failed to build HTTP client")?;
    let gateway = Arc::new(Gateway::new(Arc::new(transport), settings.retry));

    let options = MonitorOptions {
        once: cli.once,
        export: cli.export.clone(),
        prefs: Preferences {
            bell: cli.bell,
            color: !cli.no_color,
        },
    };

    match cli.command {
        Commands::Alerts { filter, min_usd } => {
            let screen = AlertsScreen::new(filter, min_usd, &settings);
            monitor::run(screen, gateway, settings, options).await
        }
        Commands::Leaderboard { filter, limit } => {
            let screen = LeaderboardScreen::new(filter, limit, &settings);
            monitor::run(screen, gateway, settings, options).await
        }
        Commands::Summary => {
            let screen = SummaryScreen::new(&settings);
            monitor::run(screen, gateway, settings, options).await
        }
        Commands::History {
            hours,
            min_usd,
            page_size,
        } => {
            let screen = HistoryScreen::new(
                hours,
                min_usd.unwrap_or(settings.alert_presets.all),
                page_size.unwrap_or(settings.page_size),
                &settings,
                Utc::now(),
            );
            monitor::run(screen, gateway, settings, options).await
        }
        Commands::Flows { address, hours } => {
            let screen = FlowsScreen::new(address, hours);
            monitor::run(screen, gateway, settings, options).await
        }
        Commands::Chart { hours } => {
            let screen = ChartScreen::new(hours);
            monitor::run(screen, gateway, settings, options).await
        }
    }
}
