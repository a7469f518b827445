use std::time::Duration;
use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Environment variable naming an explicit settings file
pub const CONFIG_ENV: &str = "SITEMON_CONFIG";

const MIN_TIMEOUT: u64 = 1;
const MAX_TIMEOUT: u64 = 300;
const MIN_INTERVAL: u64 = 1;
const MAX_INTERVAL: u64 = 86400; // 24 hours
const MAX_PACING_DELAY_MS: u64 = 3_600_000; // 1 hour

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read settings: {0}")]
    ReadFailed(#[source] std::io::Error),
    #[error("failed to write settings: {0}")]
    WriteFailed(#[source] std::io::Error),
    #[error("failed to parse settings: {0}")]
    ParseFailed(#[source] toml::de::Error),
    #[error("failed to serialize settings: {0}")]
    SerializeFailed(#[source] toml::ser::Error),
    #[error("no config directory available")]
    ConfigPathUnavailable,
    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: Paths,
    pub schedule: Schedule,
    pub http: Http,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// JSON list of sites to check
    pub sites: path::PathBuf,
    /// JSON file holding the latest sweep
    pub state: path::PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schedule {
    /// Period between sweep starts
    pub interval_seconds: u64,
    /// Pause between consecutive checks of a sweep
    pub pacing_delay_ms: u64,
    /// Checks in flight at once; 1 keeps sweeps strictly sequential
    pub max_concurrency: usize,
    /// What to do when a sweep runs past the next tick
    pub overrun: Overrun,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Http {
    pub timeout_seconds: u64,
    pub user_agent: String,
}

/// Handling of ticks missed while a sweep was still running.
///
/// Sweeps share one task, so they never overlap either way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overrun {
    /// Drop missed ticks and wait for the next period boundary
    #[default]
    Skip,
    /// Start the next sweep right away and re-base the period on it
    Delay,
}

impl fmt::Display for Overrun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Overrun::Skip => write!(f, "skip"),
            Overrun::Delay => write!(f, "delay"),
        }
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            sites: "sites-config.json".into(),
            state: path::Path::new("data").join("monitor-state.json"),
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self { interval_seconds: 300, pacing_delay_ms: 1000, max_concurrency: 1, overrun: Overrun::Skip }
    }
}

impl Default for Http {
    fn default() -> Self {
        Self { timeout_seconds: 15, user_agent: "SiteMonitor/1.0 (Background Worker)".into() }
    }
}

impl Schedule {
    /// Sweep period, clamped to the range `validate` accepts
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.clamp(MIN_INTERVAL, MAX_INTERVAL))
    }

    /// Pause between checks, clamped to the range `validate` accepts
    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms.min(MAX_PACING_DELAY_MS))
    }
}

impl Http {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/sitemon/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("sitemon/config.toml"))
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Monitor Settings:")?;
        write_title_1(f, "Paths")?;
        write_1(f, "Sites", &self.paths.sites.display())?;
        write_1(f, "State", &self.paths.state.display())?;
        write_title_1(f, "Schedule")?;
        write_1(f, "Interval (s)", &self.schedule.interval_seconds)?;
        write_1(f, "Pacing delay (ms)", &self.schedule.pacing_delay_ms)?;
        write_1(f, "Max concurrency", &self.schedule.max_concurrency)?;
        write_1(f, "Overrun", &self.schedule.overrun)?;
        write_title_1(f, "HTTP")?;
        write_1(f, "Timeout (s)", &self.http.timeout_seconds)?;
        write_1(f, "User-Agent", &self.http.user_agent)?;

        Ok(())
    }
}

impl Settings {
    /// Generate Settings from file
    ///
    /// Creates a default settings file in ~/.config/sitemon/config.toml
    /// or the specified path if one does not exist
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let settings: Self = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path).map_err(Error::ReadFailed)?;
            toml::from_str(raw_string.as_str()).map_err(Error::ParseFailed)?
        } else {
            info!("Writing default settings to {}", config_path.display());
            let settings = Self::default();
            settings.write_config(&config_path)?;
            settings
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Settings from `$SITEMON_CONFIG` or the default location, falling
    /// back to the built-in defaults on any failure.
    pub fn load_or_default() -> Self {
        let explicit = env::var_os(CONFIG_ENV).map(path::PathBuf::from);

        match Self::from_config(explicit) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("{e}; using default settings");
                Self::default()
            }
        }
    }

    /// Serialize and write settings to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self).map_err(Error::SerializeFailed)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(Error::WriteFailed)?;
        }

        fs::write(path, config_str).map_err(Error::WriteFailed)
    }

    /// Reject values the scheduler or HTTP client cannot work with
    pub fn validate(&self) -> Result<(), Error> {
        if !(MIN_INTERVAL..=MAX_INTERVAL).contains(&self.schedule.interval_seconds) {
            return Err(Error::Invalid(format!(
                "schedule.interval_seconds must be between {MIN_INTERVAL} and {MAX_INTERVAL}, got {}",
                self.schedule.interval_seconds
            )));
        }

        if self.schedule.pacing_delay_ms > MAX_PACING_DELAY_MS {
            return Err(Error::Invalid(format!(
                "schedule.pacing_delay_ms must be at most {MAX_PACING_DELAY_MS}, got {}",
                self.schedule.pacing_delay_ms
            )));
        }

        if self.schedule.max_concurrency == 0 {
            return Err(Error::Invalid("schedule.max_concurrency must be at least 1".into()));
        }

        if !(MIN_TIMEOUT..=MAX_TIMEOUT).contains(&self.http.timeout_seconds) {
            return Err(Error::Invalid(format!(
                "http.timeout_seconds must be between {MIN_TIMEOUT} and {MAX_TIMEOUT}, got {}",
                self.http.timeout_seconds
            )));
        }

        Ok(())
    }
}
