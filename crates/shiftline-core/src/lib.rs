pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod present;
pub mod render;
pub mod schedule;
pub mod slots;
pub mod timeline;

use std::ffi::OsString;

use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use schedule::{
  MemberDirectory,
  OverrideDefinition,
  RotationDefinition,
  Schedule
};
pub use slots::{
  RotationSlot,
  project_override,
  project_rotation
};
pub use timeline::{
  TimelineRange,
  TimelineView
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting shiftline"
  );

  let cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  let tz =
    cfg.resolve_timezone(cli.tz.as_deref());
  debug!(timezone = %tz, ?cfg.loaded_file, "resolved settings");

  let renderer =
    render::Renderer::new(&cfg, tz);

  commands::dispatch(
    cli.command,
    &cfg,
    tz,
    &renderer,
    Utc::now()
  )?;

  info!("done");
  Ok(())
}
