use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::Path};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the sensor stream, the sensor ID is appended as a path segment
    #[serde(rename = "solarManagerURL")]
    pub solar_manager_url: String,
    #[serde(rename = "solarManagerSensorID")]
    pub solar_manager_sensor_id: String,
    /// Base URL of the identity service (`/oauth/login`, `/oauth/refresh`)
    #[serde(rename = "identityURL", default = "default_identity_url")]
    pub identity_url: String,
    /// Control endpoint template; `%s` or `{deviceId}` is replaced by `heatPumpID`
    #[serde(rename = "heatPumpControlURL")]
    pub heat_pump_control_url: String,
    #[serde(rename = "heatPumpID")]
    pub heat_pump_id: String,
    /// Degrees Celsius; a reading strictly above counts as a legionella-safe week
    pub temperature_threshold: f64,
    /// Sampling interval in minutes
    pub check_interval: u64,
    /// Hours between two forced heating cycles
    #[serde(default = "default_weekly_check_interval")]
    pub weekly_check_interval: u64,
    /// Minutes the heat pump stays in forced charging before it is switched off
    #[serde(default = "default_heating_duration")]
    pub heating_duration: u64,
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: String,
    pub username: String,
    pub password: String,
}

fn default_identity_url() -> String {
    "https://cloud.solar-manager.ch/v1".into()
}

fn default_weekly_check_interval() -> u64 {
    168
}

fn default_heating_duration() -> u64 {
    240
}

fn default_checkpoint_file() -> String {
    "lastCheck.txt".into()
}

/// One week, in minutes.
const MAX_CHECK_INTERVAL_MINUTES: u64 = 7 * 24 * 60;
/// One leap year, in hours.
const MAX_WEEKLY_INTERVAL_HOURS: u64 = 366 * 24;
/// One day, in minutes.
const MAX_HEATING_DURATION_MINUTES: u64 = 24 * 60;

fn check_range(key: &str, value: u64, max: u64) -> Result<(), AppError> {
    if value == 0 {
        return Err(AppError::Config(format!("{} must be positive", key)));
    }
    if value > max {
        return Err(AppError::Config(format!(
            "{} must be at most {}, got {}",
            key, max, value
        )));
    }
    Ok(())
}

impl Config {
    /// Load YAML or JSON from disk, substitute $(VAR)/${VAR} with env vars, then parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let expanded = expand_env_placeholders(raw)?;
        let cfg: Self = serde_yaml::from_str(&expanded)
            .map_err(|e| AppError::Config(format!("failed to parse config: {}", e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), AppError> {
        check_range("checkInterval", self.check_interval, MAX_CHECK_INTERVAL_MINUTES)?;
        check_range(
            "weeklyCheckInterval",
            self.weekly_check_interval,
            MAX_WEEKLY_INTERVAL_HOURS,
        )?;
        check_range(
            "heatingDuration",
            self.heating_duration,
            MAX_HEATING_DURATION_MINUTES,
        )?;
        if !self.temperature_threshold.is_finite() {
            return Err(AppError::Config(
                "temperatureThreshold must be a finite number".into(),
            ));
        }
        if self.username.is_empty() || self.password.is_empty() {
            return Err(AppError::Config(
                "username and password must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval * 60)
    }

    pub fn weekly_interval(&self) -> chrono::Duration {
        chrono::Duration::hours(self.weekly_check_interval as i64)
    }

    pub fn heating_duration(&self) -> Duration {
        Duration::from_secs(self.heating_duration * 60)
    }

    pub fn sensor_url(&self) -> String {
        format!(
            "{}/{}",
            self.solar_manager_url.trim_end_matches('/'),
            self.solar_manager_sensor_id
        )
    }

    pub fn heat_pump_url(&self) -> String {
        self.heat_pump_control_url
            .replace("%s", &self.heat_pump_id)
            .replace("{deviceId}", &self.heat_pump_id)
    }
}

/// Expand $(VAR) and ${VAR} placeholders using environment variables.
/// "$$" becomes a literal "$".
fn expand_env_placeholders(input: &str) -> Result<String, AppError> {
    let mut out = String::with_capacity(input.len());
    let mut it = input.chars().peekable();

    while let Some(c) = it.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let close = match it.peek().copied() {
            Some('$') => {
                it.next();
                out.push('$');
                continue;
            }
            Some('(') => ')',
            Some('{') => '}',
            _ => {
                out.push('$');
                continue;
            }
        };
        it.next();
        let var = read_until(&mut it, close).ok_or_else(|| {
            AppError::Config(format!("unterminated env placeholder: missing '{}'", close))
        })?;
        let val = std::env::var(&var)
            .map_err(|_| AppError::Config(format!("missing environment variable: {}", var)))?;
        out.push_str(&val);
    }

    Ok(out)
}

/// Read characters until we hit `end`, consuming the closing delimiter.
fn read_until<I>(it: &mut std::iter::Peekable<I>, end: char) -> Option<String>
where
    I: Iterator<Item = char>,
{
    let mut buf = String::new();
    for ch in it.by_ref() {
        if ch == end {
            return Some(buf);
        }
        buf.push(ch);
    }
    None
}
