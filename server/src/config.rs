use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use tokio::time::Duration;

use crate::recorder::RecorderSettings;
use crate::replay::DEFAULT_PROTOCOL_VERSION;
use crate::storage::directory::default_data_directory;
use crate::tracker::TrackerSettings;

const PREFIX: &str = "SPECREC_";

/// Postgres connection for the subject store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: String,
    pub user: String,
    pub pass: String,
    pub name: String,
}

impl DbConfig {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.pass, self.host, self.port, self.name
        )
    }
}

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub api_addr: String,
    pub api_key: Option<String>,
    pub platform_api_base: String,
    pub record_matches: bool,
    pub tracker: TrackerSettings,
    pub recorder: RecorderSettings,
    pub data_dir: PathBuf,
    pub protocol_version: String,
    pub compress_responses: bool,
    pub db: Option<DbConfig>,
}

impl RecorderConfig {
    /// Reads `SPECREC_*` variables from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(&format!("{}{}", PREFIX, name)).filter(|v| !v.trim().is_empty());

        let parse = |name: &str, default: u64| -> Result<u64> {
            parse_or(var(name), default).with_context(|| format!("{}{} must be a non-negative integer", PREFIX, name))
        };

        let record_matches = parse_or(var("RECORD_MATCHES"), true)
            .with_context(|| format!("{}RECORD_MATCHES must be true or false", PREFIX))?;
        let compress_responses = parse_or(var("COMPRESS_RESPONSES"), false)
            .with_context(|| format!("{}COMPRESS_RESPONSES must be true or false", PREFIX))?;

        let api_key = var("API_KEY");
        if record_matches && api_key.is_none() {
            bail!("{}API_KEY must be set when recording is enabled", PREFIX);
        }

        let tracker = TrackerSettings {
            tick_interval: Duration::from_secs(parse("TRACKER_TICK_SECS", 10)?.max(1)),
            subjects_per_tick: parse("SUBJECTS_PER_TICK", 10)? as usize,
            check_interval: seconds(parse("SUBJECT_CHECK_INTERVAL_SECS", 300)?),
            found_cooldown: seconds(parse("FOUND_COOLDOWN_SECS", 1800)?),
            region_outage: seconds(parse("REGION_OUTAGE_SECS", 600)?),
        };

        let recorder = RecorderSettings {
            poll_interval: Duration::from_secs(parse("RECORDER_POLL_SECS", 30)?.max(1)),
            max_persist_attempts: parse("MAX_PERSIST_ATTEMPTS", 3)?.clamp(1, u64::from(u32::MAX)) as u32,
        };

        let db = match var("DB_HOST") {
            Some(host) => {
                let required = |name: &str| {
                    var(name).with_context(|| format!("{}{} must be set when {}DB_HOST is set", PREFIX, name, PREFIX))
                };
                Some(DbConfig {
                    host,
                    port: var("DB_PORT").unwrap_or_else(|| "5432".to_string()),
                    user: required("DB_USER")?,
                    pass: required("DB_PASS")?,
                    name: required("DB_NAME")?,
                })
            }
            None => None,
        };

        Ok(Self {
            api_addr: var("API_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            api_key,
            platform_api_base: var("PLATFORM_API_BASE").unwrap_or_else(|| "https://{region}.api.pvp.net".to_string()),
            record_matches,
            tracker,
            recorder,
            data_dir: var("DATA_DIR").map(PathBuf::from).unwrap_or_else(default_data_directory),
            protocol_version: var("PROTOCOL_VERSION").unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string()),
            compress_responses,
            db,
        })
    }
}

fn parse_or<T>(raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => Ok(raw.trim().parse::<T>()?),
        None => Ok(default),
    }
}

fn seconds(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(i64::MAX as u64) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RecorderConfig::from_lookup(lookup(&[("SPECREC_API_KEY", "k")])).unwrap();
        assert_eq!(config.api_addr, "0.0.0.0:8080");
        assert!(config.record_matches);
        assert!(!config.compress_responses);
        assert_eq!(config.tracker.subjects_per_tick, 10);
        assert_eq!(config.tracker.found_cooldown, chrono::Duration::seconds(1800));
        assert_eq!(config.recorder.poll_interval, Duration::from_secs(30));
        assert_eq!(config.recorder.max_persist_attempts, 3);
        assert_eq!(config.protocol_version, "1.82.80");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/spectator_recordings"));
        assert!(config.db.is_none());
    }

    #[test]
    fn test_api_key_required_only_when_recording() {
        assert!(RecorderConfig::from_lookup(lookup(&[])).is_err());

        let replay_only = RecorderConfig::from_lookup(lookup(&[("SPECREC_RECORD_MATCHES", "false")])).unwrap();
        assert!(!replay_only.record_matches);
        assert!(replay_only.api_key.is_none());
    }

    #[test]
    fn test_overrides_and_database() {
        let config = RecorderConfig::from_lookup(lookup(&[
            ("SPECREC_API_KEY", "k"),
            ("SPECREC_TRACKER_TICK_SECS", "3"),
            ("SPECREC_REGION_OUTAGE_SECS", "60"),
            ("SPECREC_COMPRESS_RESPONSES", "true"),
            ("SPECREC_DB_HOST", "db"),
            ("SPECREC_DB_USER", "rec"),
            ("SPECREC_DB_PASS", "pw"),
            ("SPECREC_DB_NAME", "recordings"),
        ]))
        .unwrap();

        assert_eq!(config.tracker.tick_interval, Duration::from_secs(3));
        assert_eq!(config.tracker.region_outage, chrono::Duration::seconds(60));
        assert!(config.compress_responses);
        assert_eq!(config.db.unwrap().url(), "postgres://rec:pw@db:5432/recordings");
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = RecorderConfig::from_lookup(lookup(&[("SPECREC_API_KEY", "k"), ("SPECREC_SUBJECTS_PER_TICK", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("SPECREC_SUBJECTS_PER_TICK"));

        let missing_user = RecorderConfig::from_lookup(lookup(&[("SPECREC_API_KEY", "k"), ("SPECREC_DB_HOST", "db")]));
        assert!(missing_user.is_err());
    }
}
