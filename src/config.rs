//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::LlmConfig;

/// Timings of the simulated visa and booking procedures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Interval between visa progress ticks.
    pub visa_tick: Duration,
    /// Progress added per tick (percent).
    pub visa_step: u8,
    /// Pause between reaching 100% and the visa being granted.
    pub visa_settle: Duration,
    /// Time a booking request takes to confirm.
    pub booking_delay: Duration,
    /// Time the booking screen shows success before returning to the hub.
    pub booking_rearm: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            visa_tick: Duration::from_millis(400),
            visa_step: 10,
            visa_settle: Duration::from_millis(1000),
            booking_delay: Duration::from_millis(2000),
            booking_rearm: Duration::from_millis(1500),
        }
    }
}

/// Application configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Namespace of the remote document layout.
    pub app_id: String,
    /// libSQL database file holding journey documents.
    pub db_path: PathBuf,
    /// Content generation; `None` disables summaries and discovery.
    pub llm: Option<LlmConfig>,
    /// Host-issued sign-in token; anonymous sign-in when unset.
    pub auth_token: Option<SecretString>,
    /// Pinned anonymous device id; otherwise the one stored in the database.
    pub device_id: Option<String>,
    /// Directory for rolling log files; stderr when unset.
    pub log_dir: Option<PathBuf>,
    pub simulation: SimulationConfig,
}

pub const DEFAULT_APP_ID: &str = "holigo-app-v5";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-09-2025";

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let llm = get("GEMINI_API_KEY").map(|key| LlmConfig {
            api_key: SecretString::from(key),
            model: get("HOLIGO_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        });

        let defaults = SimulationConfig::default();
        let simulation = SimulationConfig {
            visa_tick: millis(&get, "HOLIGO_VISA_TICK_MS", defaults.visa_tick)?,
            visa_step: defaults.visa_step,
            visa_settle: millis(&get, "HOLIGO_VISA_SETTLE_MS", defaults.visa_settle)?,
            booking_delay: millis(&get, "HOLIGO_BOOKING_DELAY_MS", defaults.booking_delay)?,
            booking_rearm: millis(&get, "HOLIGO_BOOKING_REARM_MS", defaults.booking_rearm)?,
        };
        if simulation.visa_tick.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "HOLIGO_VISA_TICK_MS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            app_id: get("HOLIGO_APP_ID").unwrap_or_else(|| DEFAULT_APP_ID.to_string()),
            db_path: get("HOLIGO_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/holigo.db")),
            llm,
            auth_token: get("HOLIGO_AUTH_TOKEN").map(SecretString::from),
            device_id: get("HOLIGO_DEVICE_ID"),
            log_dir: get("HOLIGO_LOG_DIR").map(PathBuf::from),
            simulation,
        })
    }
}

fn millis<G>(get: &G, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected milliseconds, got '{raw}': {e}"),
            }),
    }
}
