//! Run settings: built-in defaults, then an optional JSON settings file, then
//! `FLEETWATCH_*` environment variables, then command-line flags.
//! The settings file defaults to `$XDG_CONFIG_HOME/fleetwatch/settings.json`
//! (fallback ~/.config/fleetwatch/settings.json).

use std::{fs, io, path::PathBuf, time::Duration};

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{FleetError, Result};
use crate::inventory::{RetryPolicy, DEFAULT_RECORD_CAP};
use crate::notify::{DEFAULT_NOTIFY_URL, DEFAULT_RECIPIENT};
use crate::thresholds::StalenessPolicy;

pub const DEFAULT_INVENTORY_URL: &str = "http://localhost:2500";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub inventory_url: String,
    pub notify_url: String,
    pub recipient: String,
    /// Full-roster polling cycles per run.
    pub cycles: u32,
    pub state_dir: PathBuf,
    /// Machines fetched at the same time within a cycle.
    pub concurrency: usize,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub roster_retry_delay_ms: u64,
    pub record_cap: usize,
    pub offline_window_secs: i64,
    pub extended_offline_aliases: Vec<String>,
    pub extended_offline_factor: i32,
    pub dry_run: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            inventory_url: DEFAULT_INVENTORY_URL.into(),
            notify_url: DEFAULT_NOTIFY_URL.into(),
            recipient: DEFAULT_RECIPIENT.into(),
            cycles: 1,
            state_dir: PathBuf::from("."),
            concurrency: 4,
            max_attempts: 5,
            retry_delay_ms: 2_000,
            roster_retry_delay_ms: 2_000,
            record_cap: DEFAULT_RECORD_CAP,
            offline_window_secs: 3_600,
            extended_offline_aliases: vec!["AGILENT".into()],
            extended_offline_factor: 3,
            dry_run: false,
        }
    }
}

impl Settings {
    /// Resolve settings for one run from every layer.
    pub fn resolve(args: &CliArgs) -> Result<Settings> {
        let path = args.config.clone().unwrap_or_else(settings_path);
        let mut settings = match load_settings_file(&path)? {
            Some(s) => s,
            None if args.config.is_some() => {
                return Err(FleetError::Config(format!("{} not found", path.display())));
            }
            None => Settings::default(),
        };
        settings.apply_env(|k| std::env::var(k).ok());
        settings.apply_args(args);
        settings.validate()?;
        Ok(settings)
    }

    /// Overlay `FLEETWATCH_*` variables. Unparseable numbers are ignored.
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, var: F) {
        if let Some(v) = var("FLEETWATCH_INVENTORY_URL") {
            self.inventory_url = v;
        }
        if let Some(v) = var("FLEETWATCH_NOTIFY_URL") {
            self.notify_url = v;
        }
        if let Some(v) = var("FLEETWATCH_RECIPIENT") {
            self.recipient = v;
        }
        if let Some(v) = var("FLEETWATCH_CYCLES").and_then(|v| v.parse().ok()) {
            self.cycles = v;
        }
        if let Some(v) = var("FLEETWATCH_STATE_DIR") {
            self.state_dir = PathBuf::from(v);
        }
        if let Some(v) = var("FLEETWATCH_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.concurrency = v;
        }
        if let Some(v) = var("FLEETWATCH_DRY_RUN") {
            self.dry_run = v != "0";
        }
    }

    pub fn apply_args(&mut self, args: &CliArgs) {
        if let Some(v) = &args.inventory_url {
            self.inventory_url = v.clone();
        }
        if let Some(v) = &args.notify_url {
            self.notify_url = v.clone();
        }
        if let Some(v) = args.cycles {
            self.cycles = v;
        }
        if let Some(v) = &args.state_dir {
            self.state_dir = v.clone();
        }
        if args.dry_run {
            self.dry_run = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.inventory_base()?;
        if self.cycles == 0 {
            return Err(FleetError::Config("cycles must be at least 1".into()));
        }
        if self.concurrency == 0 {
            return Err(FleetError::Config("concurrency must be at least 1".into()));
        }
        if self.max_attempts == 0 {
            return Err(FleetError::Config("max_attempts must be at least 1".into()));
        }
        if self.offline_window_secs <= 0 || self.extended_offline_factor <= 0 {
            return Err(FleetError::Config("offline window must be positive".into()));
        }
        self.staleness()?;
        Ok(())
    }

    pub fn inventory_base(&self) -> Result<Url> {
        Url::parse(&self.inventory_url)
            .map_err(|e| FleetError::Config(format!("inventory url {:?}: {e}", self.inventory_url)))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
            roster_delay: Duration::from_millis(self.roster_retry_delay_ms),
        }
    }

    /// Fails when the window, or the extended window, does not fit a `TimeDelta`.
    pub fn staleness(&self) -> Result<StalenessPolicy> {
        let out_of_range = || {
            FleetError::Config(format!(
                "offline window of {}s x{} is out of range",
                self.offline_window_secs, self.extended_offline_factor
            ))
        };
        let base_window = TimeDelta::try_seconds(self.offline_window_secs).ok_or_else(out_of_range)?;
        base_window
            .checked_mul(self.extended_offline_factor)
            .ok_or_else(out_of_range)?;
        Ok(StalenessPolicy {
            base_window,
            extended_aliases: self.extended_offline_aliases.clone(),
            extended_factor: self.extended_offline_factor,
        })
    }
}

pub fn config_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join("fleetwatch")
    } else {
        dirs_next::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fleetwatch")
    }
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn load_settings_file(path: &std::path::Path) -> Result<Option<Settings>> {
    match fs::read_to_string(path) {
        Ok(s) => serde_json::from_str(&s)
            .map(Some)
            .map_err(|e| FleetError::Config(format!("{}: {e}", path.display()))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(FleetError::Config(format!("{}: {e}", path.display()))),
    }
}

pub const USAGE: &str = "[--inventory-url URL|-u URL] [--notify-url URL|-n URL] [--cycles N|-c N] [--state-dir DIR|-d DIR] [--config PATH] [--dry-run]";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliArgs {
    pub inventory_url: Option<String>,
    pub notify_url: Option<String>,
    pub cycles: Option<u32>,
    pub state_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub dry_run: bool,
}

/// Parse the process arguments. `Err` carries the text to print: the usage
/// line for `--help`, or a complaint plus usage for bad input.
pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> std::result::Result<CliArgs, String> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "fleetwatch".into());
    let usage = format!("Usage: {prog} {USAGE}");
    let mut out = CliArgs::default();

    while let Some(arg) = it.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
            _ => (arg.clone(), None),
        };
        let mut value = |name: &str| -> std::result::Result<String, String> {
            inline
                .clone()
                .or_else(|| it.next())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| format!("{name} needs a value\n{usage}"))
        };
        match flag.as_str() {
            "-h" | "--help" => return Err(usage.clone()),
            "--inventory-url" | "-u" => out.inventory_url = Some(value(&flag)?),
            "--notify-url" | "-n" => out.notify_url = Some(value(&flag)?),
            "--cycles" | "-c" => {
                let v = value(&flag)?;
                out.cycles = Some(
                    v.parse()
                        .map_err(|_| format!("--cycles expects a number, got {v:?}\n{usage}"))?,
                );
            }
            "--state-dir" | "-d" => out.state_dir = Some(PathBuf::from(value(&flag)?)),
            "--config" => out.config = Some(PathBuf::from(value(&flag)?)),
            "--dry-run" => out.dry_run = true,
            _ => return Err(format!("Unexpected argument {arg:?}. {usage}")),
        }
    }
    Ok(out)
}
