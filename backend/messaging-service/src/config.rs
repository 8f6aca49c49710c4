use crate::error::AppError;
use crate::services::retention_config::{RetentionSettings, MAX_RETENTION_COUNT, MIN_RETENTION_COUNT};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageStoreBackend {
    Postgres { database_url: String, max_connections: u32 },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaBackend {
    Local { root: PathBuf },
    S3 { bucket: String },
}

/// Timer settings for the three retention sweep triggers
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub hourly_interval: Duration,
    /// Hour of day (UTC) for the daily full sweep
    pub daily_hour_utc: u32,
    /// Hour of day (UTC) on Sundays for the weekly deep sweep
    pub weekly_hour_utc: u32,
    /// Wall-clock budget per run; a run past this is abandoned for the cycle
    pub run_budget: Duration,
    pub sweep_concurrency: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            hourly_interval: Duration::from_secs(60 * 60),
            daily_hour_utc: 2,
            weekly_hour_utc: 3,
            run_budget: Duration::from_secs(15 * 60),
            sweep_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub store: MessageStoreBackend,
    pub media: MediaBackend,
    pub store_timeout: Duration,
    pub retention: RetentionSettings,
    pub schedule: ScheduleConfig,
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{name} has an invalid value: {raw}"))),
        _ => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let port = parse_var("PORT", 8080u16)?;

        let store = match env::var("MESSAGE_STORE")
            .unwrap_or_else(|_| "postgres".into())
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => MessageStoreBackend::Memory,
            "postgres" => {
                let database_url = env::var("DATABASE_URL")
                    .map_err(|_| AppError::Config("DATABASE_URL missing".into()))?;
                MessageStoreBackend::Postgres {
                    database_url,
                    max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10u32)?,
                }
            }
            other => {
                return Err(AppError::Config(format!(
                    "MESSAGE_STORE must be 'postgres' or 'memory', got '{other}'"
                )))
            }
        };

        let media = match env::var("MEDIA_BACKEND")
            .unwrap_or_else(|_| "local".into())
            .to_ascii_lowercase()
            .as_str()
        {
            "local" => MediaBackend::Local {
                root: PathBuf::from(env::var("MEDIA_ROOT").unwrap_or_else(|_| "./uploads".into())),
            },
            "s3" => {
                let bucket = env::var("S3_BUCKET")
                    .map_err(|_| AppError::Config("S3_BUCKET missing".into()))?;
                MediaBackend::S3 { bucket }
            }
            other => {
                return Err(AppError::Config(format!(
                    "MEDIA_BACKEND must be 'local' or 's3', got '{other}'"
                )))
            }
        };

        let store_timeout = Duration::from_millis(parse_var("STORE_TIMEOUT_MS", 5_000u64)?);
        if store_timeout.is_zero() {
            return Err(AppError::Config("STORE_TIMEOUT_MS must be positive".into()));
        }

        let count = parse_var("RETENTION_COUNT", 3u32)?;
        if !(MIN_RETENTION_COUNT..=MAX_RETENTION_COUNT).contains(&count) {
            return Err(AppError::Config(format!(
                "RETENTION_COUNT must be between {MIN_RETENTION_COUNT} and {MAX_RETENTION_COUNT}"
            )));
        }
        let retention = RetentionSettings {
            count,
            enabled: parse_var("RETENTION_ENABLED", true)?,
        };

        let schedule = ScheduleConfig {
            hourly_interval: Duration::from_secs(parse_var(
                "RETENTION_HOURLY_INTERVAL_SECS",
                3_600u64,
            )?),
            daily_hour_utc: parse_var("RETENTION_DAILY_HOUR_UTC", 2u32)?,
            weekly_hour_utc: parse_var("RETENTION_WEEKLY_HOUR_UTC", 3u32)?,
            run_budget: Duration::from_secs(parse_var("RETENTION_RUN_BUDGET_SECS", 900u64)?),
            sweep_concurrency: parse_var("RETENTION_SWEEP_CONCURRENCY", 4usize)?,
        };
        schedule.validate()?;

        Ok(Self {
            port,
            store,
            media,
            store_timeout,
            retention,
            schedule,
        })
    }

    pub fn test_defaults() -> Self {
        Self {
            port: 8080,
            store: MessageStoreBackend::Memory,
            media: MediaBackend::Local {
                root: PathBuf::from("./uploads"),
            },
            store_timeout: Duration::from_secs(5),
            retention: RetentionSettings::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.hourly_interval.is_zero() {
            return Err(AppError::Config(
                "RETENTION_HOURLY_INTERVAL_SECS must be positive".into(),
            ));
        }
        if self.daily_hour_utc > 23 || self.weekly_hour_utc > 23 {
            return Err(AppError::Config("retention sweep hours must be 0-23".into()));
        }
        if self.run_budget.is_zero() {
            return Err(AppError::Config("RETENTION_RUN_BUDGET_SECS must be positive".into()));
        }
        if self.sweep_concurrency == 0 {
            return Err(AppError::Config(
                "RETENTION_SWEEP_CONCURRENCY must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
