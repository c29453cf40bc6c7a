//! Maintenance configuration.
//!
//! The whole configuration is read from one JSON document once;
//! engines receive immutable pieces of it.
//!
//! ```json
//! {
//!   "name": "site-a",
//!   "store": { "database": "primary", "timezone": "Europe/Berlin" },
//!   "backup": { "target": { "database": "backup", "host": "nas.local" } },
//!   "synchronize": { "method": "sqldump", "database": "scratch", "dump": "/srv/dump.sql" },
//!   "rotation": {
//!     "retention_period": "30d",
//!     "resolution": 15,
//!     "tables_to_trim": ["raw_events"],
//!     "resample_by_max": "all"
//!   }
//! }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use time::Duration;

use crate::error::{Error, Result};
use crate::rotate::TableSelection;

const DEFAULT_TIMEZONE: &str = "UTC";

fn default_name() -> String {
    "tsmaint".to_string()
}

fn enabled() -> bool {
    true
}

/// Connection descriptor of a time-series store.
#[derive(Clone, Default, Deserialize)]
pub struct StoreDescriptor {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Database or schema name.
    pub database: String,
    #[serde(default)]
    pub timezone: Option<String>,
    /// Local directory of a directory-backed store.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StoreDescriptor {
    pub fn named(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    /// Same server and credentials, different database.
    pub fn with_database(&self, database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            path: None,
            ..self.clone()
        }
    }

    pub fn timezone(&self) -> &str {
        self.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE)
    }
}

// Credentials stay out of logs.
impl fmt::Debug for StoreDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("timezone", &self.timezone)
            .field("path", &self.path)
            .finish()
    }
}

impl fmt::Display for StoreDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.path, &self.host) {
            (Some(path), _) => write!(f, "{}", path.display()),
            (None, Some(host)) => match self.port {
                Some(port) => write!(f, "{}@{host}:{port}", self.database),
                None => write!(f, "{}@{host}", self.database),
            },
            (None, None) => write!(f, "{}", self.database),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// Remote backup location. Required by `run_backup`.
    #[serde(default)]
    pub target: Option<StoreDescriptor>,
}

/// How `run_synchronize` obtains the data to merge into the primary store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMethod {
    /// Restore a SQL dump into a scratch database, then sync from it.
    SqlDump,
    /// Copy exported `.jsonl` table files into a scratch store directory,
    /// then sync from it.
    Directory,
}

impl SyncMethod {
    /// Parse a method name, ignoring case and punctuation (`SQL-Dump`,
    /// `mysqldump`, `dir`).
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized: String = raw
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "sqldump" | "mysqldump" => Ok(SyncMethod::SqlDump),
            "directory" | "dir" | "jsonl" => Ok(SyncMethod::Directory),
            _ => Err(Error::UnsupportedMethod(normalized)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMethod::SqlDump => "sqldump",
            SyncMethod::Directory => "directory",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SynchronizeConfig {
    pub method: String,
    /// Scratch database the dump is restored into.
    pub database: String,
    /// Dump artifact.
    pub dump: PathBuf,
}

impl SynchronizeConfig {
    pub fn method(&self) -> Result<SyncMethod> {
        SyncMethod::parse(&self.method)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RotationConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,

    /// Data younger than `now - retention_period` is never rotated.
    #[serde(deserialize_with = "deserialize_duration")]
    pub retention_period: Duration,

    /// Target grid interval in minutes.
    pub resolution: f64,

    /// Tables that are hard-deleted instead of resampled.
    #[serde(default)]
    pub tables_to_trim: TableSelection,

    /// Rewrite every eligible day per run instead of only the newest one.
    #[serde(default)]
    pub process_all_days: bool,

    #[serde(default)]
    pub resample_by_max: TableSelection,
    #[serde(default)]
    pub resample_by_last: TableSelection,
    #[serde(default)]
    pub resample_by_mean: TableSelection,
}

impl RotationConfig {
    pub fn new(retention_period: Duration, resolution_minutes: f64) -> Self {
        Self {
            enabled: true,
            retention_period,
            resolution: resolution_minutes,
            tables_to_trim: TableSelection::None,
            process_all_days: false,
            resample_by_max: TableSelection::None,
            resample_by_last: TableSelection::None,
            resample_by_mean: TableSelection::None,
        }
    }

    pub fn with_tables_to_trim(mut self, selection: TableSelection) -> Self {
        self.tables_to_trim = selection;
        self
    }

    pub fn with_process_all_days(mut self, process_all_days: bool) -> Self {
        self.process_all_days = process_all_days;
        self
    }

    /// Grid interval as a duration.
    pub fn resolution(&self) -> Result<Duration> {
        if !self.resolution.is_finite() || self.resolution <= 0.0 {
            return Err(Error::Configuration(format!(
                "rotation resolution must be a positive number of minutes, got {}",
                self.resolution
            )));
        }
        Duration::checked_seconds_f64(self.resolution * 60.0).ok_or_else(|| {
            Error::Configuration(format!(
                "rotation resolution of {} minutes is out of range",
                self.resolution
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.resolution()? < Duration::SECOND {
            return Err(Error::Configuration(
                "rotation resolution must be at least one second".to_string(),
            ));
        }
        if self.retention_period.is_negative() {
            return Err(Error::Configuration(
                "rotation retention_period must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Complete maintenance configuration, immutable after load.
#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Primary store maintained by this system.
    pub store: StoreDescriptor,
    #[serde(default)]
    pub backup: Option<BackupConfig>,
    #[serde(default)]
    pub synchronize: Option<SynchronizeConfig>,
    #[serde(default)]
    pub rotation: Option<RotationConfig>,
}

impl MaintenanceConfig {
    pub fn new(store: StoreDescriptor) -> Self {
        Self {
            name: default_name(),
            store,
            backup: None,
            synchronize: None,
            rotation: None,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::Configuration(format!("unable to read {}: {err}", path.display()))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: MaintenanceConfig = serde_json::from_str(text)
            .map_err(|err| Error::Configuration(format!("invalid configuration: {err}")))?;
        config.finalize()
    }

    /// Fill derived defaults. Section semantics are validated by the
    /// operation that uses them, so a broken rotation section does not stop
    /// backups.
    pub fn finalize(mut self) -> Result<Self> {
        let timezone = self.store.timezone().to_string();
        if let Some(target) = self
            .backup
            .as_mut()
            .and_then(|backup| backup.target.as_mut())
        {
            if target.timezone.is_none() {
                target.timezone = Some(timezone);
            }
        }
        Ok(self)
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_duration(&text).map_err(serde::de::Error::custom)
}

/// Parse durations such as `30d`, `12h`, `1d12h`, `90 min` or `1.5 hours`.
pub fn parse_duration(text: &str) -> Result<Duration> {
    let invalid = |reason: &str| Error::Configuration(format!("invalid duration {text:?}: {reason}"));

    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(invalid("empty"));
    }

    let mut total = Duration::ZERO;
    let mut rest = compact.as_str();
    while !rest.is_empty() {
        let amount_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if amount_len == 0 {
            return Err(invalid("expected a number"));
        }
        let amount: f64 = rest[..amount_len]
            .parse()
            .map_err(|_| invalid("malformed number"))?;
        rest = &rest[amount_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = rest[..unit_len].to_ascii_lowercase();
        rest = &rest[unit_len..];

        let seconds = match unit.as_str() {
            "w" | "week" | "weeks" => 604_800.0,
            "d" | "day" | "days" => 86_400.0,
            "h" | "hour" | "hours" => 3_600.0,
            "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
            "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
            "" => return Err(invalid("missing unit")),
            _ => return Err(invalid("unknown unit")),
        };
        total = Duration::checked_seconds_f64(amount * seconds)
            .and_then(|part| total.checked_add(part))
            .ok_or_else(|| invalid("out of range"))?;
    }
    Ok(total)
}
