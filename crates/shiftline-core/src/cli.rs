use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::timeline::TimelineView;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "shiftline",
    version,
    about = "On-call rotation timeline calculator",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Config file; defaults to $SHIFTLINE_CONFIG or the user config dir.
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// IANA zone used for day boundaries and weekdays.
    #[arg(long = "tz", global = true)]
    pub tz: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Project every rotation and override of a schedule onto a window.
    Timeline(TimelineArgs),

    /// Show who is on call at an instant.
    Oncall(OncallArgs),

    /// Print the window for a view and anchor date.
    Range(RangeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct WindowArgs {
    #[arg(
        long = "view",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<TimelineView>())
    )]
    pub view: Option<TimelineView>,

    /// Anchor date expression, e.g. today, 2024-01-03, monday, +7d.
    #[arg(long = "date", default_value = "now")]
    pub date: String,

    /// Page the window by whole views, e.g. -1 for the previous week.
    #[arg(long = "shift", default_value_t = 0, allow_hyphen_values = true)]
    pub shift: i64,
}

#[derive(Args, Debug, Clone)]
pub struct TimelineArgs {
    /// JSON schedule document.
    pub file: PathBuf,

    #[arg(long = "schedule")]
    pub schedule: Option<String>,

    #[command(flatten)]
    pub window: WindowArgs,

    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct OncallArgs {
    pub file: PathBuf,

    #[arg(long = "schedule")]
    pub schedule: Option<String>,

    #[arg(long = "at", default_value = "now")]
    pub at: String,

    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RangeArgs {
    #[command(flatten)]
    pub window: WindowArgs,

    #[arg(long = "days", conflicts_with = "hours")]
    pub days: bool,

    #[arg(long = "hours")]
    pub hours: bool,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_timeline_invocation() {
        let cli = GlobalCli::try_parse_from([
            "shiftline",
            "-vv",
            "--tz",
            "Europe/Berlin",
            "timeline",
            "schedules.json",
            "--view",
            "Month",
            "--date",
            "2024-02-10",
            "--shift",
            "-1",
        ])
        .expect("parse args");

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.tz.as_deref(), Some("Europe/Berlin"));
        let Command::Timeline(args) = cli.command else {
            panic!("expected timeline command");
        };
        assert_eq!(args.window.view, Some(TimelineView::Month));
        assert_eq!(args.window.shift, -1);
        assert!(!args.json);
    }

    #[test]
    fn rejects_unknown_view() {
        assert!(
            GlobalCli::try_parse_from(["shiftline", "range", "--view", "year"]).is_err()
        );
    }
}
