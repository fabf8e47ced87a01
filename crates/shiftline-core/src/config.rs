use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::Context;
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{
  debug,
  info
};

use crate::datetime::resolve_timezone;
use crate::present::{
  Locale,
  Palette
};
use crate::timeline::TimelineView;

pub const CONFIG_FILE: &str =
  "shiftline.toml";
pub const CONFIG_ENV_VAR: &str =
  "SHIFTLINE_CONFIG";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
  timezone: Option<String>,
  view:     Option<TimelineView>,
  locale:   Option<Locale>,
  color:    Option<bool>,
  palette:  Option<Vec<String>>
}

#[derive(Debug, Clone)]
pub struct Config {
  pub timezone:    Option<String>,
  pub view:        TimelineView,
  pub locale:      Locale,
  pub color:       bool,
  pub palette:     Palette,
  pub loaded_file: Option<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      timezone:    None,
      view:        TimelineView::Week,
      locale:      Locale::En,
      color:       true,
      palette:     Palette::default(),
      loaded_file: None
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    override_path
  ))]
  pub fn load(
    override_path: Option<&Path>
  ) -> anyhow::Result<Self> {
    if let Some(path) = override_path {
      return Self::load_file(path);
    }

    let Some(path) = default_config_path()
    else {
      info!(
        "no config location available; \
         using defaults"
      );
      return Ok(Self::default());
    };

    if !path.exists() {
      info!(
        file = %path.display(),
        "config file not found; using defaults"
      );
      return Ok(Self::default());
    }

    Self::load_file(&path)
  }

  #[tracing::instrument]
  pub fn load_file(
    path: &Path
  ) -> anyhow::Result<Self> {
    let path = expand_tilde(path);
    let raw = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;

    let mut cfg = Self::from_toml_str(
      &raw,
      &path.display().to_string()
    )?;
    info!(
      file = %path.display(),
      view = %cfg.view,
      "loaded config"
    );
    cfg.loaded_file = Some(path);
    Ok(cfg)
  }

  pub fn from_toml_str(
    raw: &str,
    source: &str
  ) -> anyhow::Result<Self> {
    let parsed = toml::from_str::<
      ConfigFile
    >(raw)
    .with_context(|| {
      format!(
        "failed parsing config {source}"
      )
    })?;

    let defaults = Self::default();
    let cfg = Self {
      timezone:    parsed
        .timezone
        .filter(|tz| !tz.trim().is_empty()),
      view:        parsed
        .view
        .unwrap_or(defaults.view),
      locale:      parsed
        .locale
        .unwrap_or(defaults.locale),
      color:       parsed
        .color
        .unwrap_or(defaults.color),
      palette:     parsed
        .palette
        .map(Palette::new)
        .unwrap_or(defaults.palette),
      loaded_file: None
    };
    debug!(?cfg, "parsed config");
    Ok(cfg)
  }

  /// `--tz` beats the environment,
  /// which beats the config file.
  pub fn resolve_timezone(
    &self,
    flag: Option<&str>
  ) -> Tz {
    resolve_timezone(
      flag,
      self.timezone.as_deref()
    )
  }
}

fn default_config_path()
-> Option<PathBuf> {
  if let Ok(raw) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(expand_tilde(
        Path::new(trimmed)
      ));
    }
  }

  dirs::config_dir().map(|dir| {
    dir.join("shiftline").join(CONFIG_FILE)
  })
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}
