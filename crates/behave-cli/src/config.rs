//! Configuration Vault – reads/writes `~/.behave/config.toml`.

use behave_runtime::{BehaviorOverride, ControlLoopConfig};
use behave_types::{PriorityBand, SPEED_MAX, Speed};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Simulated base settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Motor speed limit, mm/s.
    #[serde(default = "default_max_speed")]
    pub max_speed: Speed,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_speed: default_max_speed(),
        }
    }
}

/// Persisted user configuration stored in `~/.behave/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Control period in milliseconds.
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,

    /// Consecutive motionless ticks that count as a stall.
    #[serde(default = "default_stall_threshold")]
    pub stall_threshold: u32,

    /// Priority range the operator may switch and `/reset` clears.
    #[serde(default)]
    pub visible_band: PriorityBand,

    #[serde(default)]
    pub sim: SimConfig,

    /// Start-up overrides, e.g. `[behaviors.patrol] active = true`.
    #[serde(default)]
    pub behaviors: HashMap<String, BehaviorOverride>,
}

fn default_tick_period_ms() -> u64 {
    10
}
fn default_stall_threshold() -> u32 {
    50
}
fn default_max_speed() -> Speed {
    SPEED_MAX
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_period_ms: default_tick_period_ms(),
            stall_threshold: default_stall_threshold(),
            visible_band: PriorityBand::default(),
            sim: SimConfig::default(),
            behaviors: HashMap::new(),
        }
    }
}

impl Config {
    /// Convert into the runtime's control loop settings.
    pub fn to_loop_config(&self) -> ControlLoopConfig {
        ControlLoopConfig {
            tick_period: Duration::from_millis(self.tick_period_ms),
            stall_threshold: self.stall_threshold,
            visible_band: self.visible_band,
            max_speed: self.sim.max_speed,
            overrides: self.behaviors.clone(),
        }
    }
}

/// Return the path to `~/.behave/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".behave").join("config.toml")
}

/// Load the config from disk and apply `BEHAVE_*` overrides.  Returns
/// `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    let Some(mut cfg) = load_from(&config_path())? else {
        return Ok(None);
    };
    apply_env_overrides(&mut cfg);
    validate(&cfg)?;
    Ok(Some(cfg))
}

/// Load the config from a specific path, without environment overrides.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    validate(&cfg)?;
    Ok(Some(cfg))
}

fn validate(cfg: &Config) -> Result<(), String> {
    if cfg.visible_band.min > cfg.visible_band.max {
        return Err(format!(
            "Invalid visible band: min {} is above max {}",
            cfg.visible_band.min, cfg.visible_band.max
        ));
    }
    Ok(())
}

/// Apply `BEHAVE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `BEHAVE_TICK_MS` | `tick_period_ms` |
/// | `BEHAVE_STALL_TICKS` | `stall_threshold` |
/// | `BEHAVE_VISIBLE_MIN` | `visible_band.min` |
/// | `BEHAVE_VISIBLE_MAX` | `visible_band.max` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("BEHAVE_TICK_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.tick_period_ms = ms;
    }
    if let Ok(v) = std::env::var("BEHAVE_STALL_TICKS")
        && let Ok(ticks) = v.parse::<u32>()
    {
        cfg.stall_threshold = ticks;
    }
    if let Ok(v) = std::env::var("BEHAVE_VISIBLE_MIN")
        && let Ok(min) = v.parse::<u8>()
    {
        cfg.visible_band.min = min;
    }
    if let Ok(v) = std::env::var("BEHAVE_VISIBLE_MAX")
        && let Ok(max) = v.parse::<u8>()
    {
        cfg.visible_band.max = max;
    }
}

/// Save the config to disk, creating `~/.behave/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
