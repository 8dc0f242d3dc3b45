//! Engine configuration: retry rule strings, timer thresholds, feature flags.
//!
//! Loaded from `~/.config/relink/config.toml`, created with defaults on first
//! run. Rule strings are only validated when installed into the scheduler; an
//! invalid set is rejected wholesale and the previously installed set stays
//! active.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Delays at or above this threshold are armed on the OS wake alarm so the
/// retry survives deep sleep.
pub const DEFAULT_LONG_RETRY_TIMER_THRESHOLD_MS: u64 = 60_000;

/// Global configuration loaded from `~/.config/relink/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelinkConfig {
    /// Ordered data setup retry rules; list order is the match priority.
    #[serde(default = "default_setup_retry_rules")]
    pub setup_retry_rules: Vec<String>,
    /// Ordered handover retry rules.
    #[serde(default = "default_handover_retry_rules")]
    pub handover_retry_rules: Vec<String>,
    /// Delays at or above this go to the wake alarm instead of the in-process queue.
    #[serde(default = "default_long_timer_threshold")]
    pub long_retry_timer_threshold_millis: u64,
    /// Arm every retry on the wake alarm, not only long delays.
    #[serde(default)]
    pub prefer_wake_alarms: bool,
    /// Restrict profile unthrottle to the transport the modem reported.
    #[serde(default = "default_true")]
    pub unthrottle_check_transport: bool,
    /// Also reset all throttling when the tracking area changes.
    #[serde(default)]
    pub reset_throttling_on_tac_change: bool,
}

fn default_true() -> bool {
    true
}

fn default_long_timer_threshold() -> u64 {
    DEFAULT_LONG_RETRY_TIMER_THRESHOLD_MS
}

fn default_setup_retry_rules() -> Vec<String> {
    [
        "capabilities=eims, retry_interval=1000, maximum_retries=20",
        "fail_causes=8|27|28|29|30|32|33|35|50|51|111|-5|-6|65537|65538|-3|2253|2254, \
         maximum_retries=0",
        "capabilities=mms|supl|cbs|rcs, retry_interval=2000",
        "capabilities=internet|enterprise|dun|ims|fota|xcap|mcx, \
         retry_interval=2500|3000|5000|10000|15000|20000|40000|60000|120000|240000|600000|\
         1200000|1800000, maximum_retries=20",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_handover_retry_rules() -> Vec<String> {
    vec!["retry_interval=1000|2000|4000|8000|16000, maximum_retries=5".to_string()]
}

impl Default for RelinkConfig {
    fn default() -> Self {
        Self {
            setup_retry_rules: default_setup_retry_rules(),
            handover_retry_rules: default_handover_retry_rules(),
            long_retry_timer_threshold_millis: DEFAULT_LONG_RETRY_TIMER_THRESHOLD_MS,
            prefer_wake_alarms: false,
            unthrottle_check_transport: true,
            reset_throttling_on_tac_change: false,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("relink")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RelinkConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = RelinkConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: RelinkConfig = toml::from_str(&data)?;
    Ok(cfg)
}
