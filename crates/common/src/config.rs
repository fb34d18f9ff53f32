//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{SpliceError, SpliceResult};

/// Global engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Playback clock and buffering settings.
    pub playback: PlaybackDefaults,

    /// Per-frame compositing settings.
    pub compositing: CompositingConfig,

    /// Overlay gesture snapping.
    pub snapping: SnappingConfig,

    /// Legacy transform migration.
    pub migration: MigrationConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default playback parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackDefaults {
    /// Frame rate used when a project carries no usable one.
    pub fps: f64,

    /// Playback rate multiplier (1.0 = realtime).
    pub playback_rate: f64,

    /// How far ahead (wall milliseconds) upcoming sources are preloaded.
    pub lookahead_ms: f64,

    /// Stall monitor poll interval.
    pub stall_poll_interval_ms: f64,

    /// Element time drift tolerated before a corrective seek.
    pub drift_tolerance_ms: f64,
}

/// Compositing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositingConfig {
    /// Background (non-topmost) video layers refresh every N-th frame.
    pub background_refresh_divisor: u32,
}

/// Snapping parameters. Tolerances are in video-space pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnappingConfig {
    /// Tolerance with the strict modifier (Ctrl).
    pub strict_tolerance_px: f64,

    /// Tolerance with the soft modifier (Shift).
    pub soft_tolerance_px: f64,

    /// Rotation snap increment in degrees.
    pub rotation_step_deg: f64,

    /// Screen pixels of pointer travel before a pending gesture activates.
    pub activation_threshold_px: f64,
}

/// Legacy pixel-space transform migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Reference width used when a project has no usable video size.
    pub fallback_width: u32,

    /// Reference height used when a project has no usable video size.
    pub fallback_height: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "splice=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            playback: PlaybackDefaults::default(),
            compositing: CompositingConfig::default(),
            snapping: SnappingConfig::default(),
            migration: MigrationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PlaybackDefaults {
    fn default() -> Self {
        Self {
            fps: 30.0,
            playback_rate: 1.0,
            lookahead_ms: 1500.0,
            stall_poll_interval_ms: 100.0,
            drift_tolerance_ms: 250.0,
        }
    }
}

impl Default for CompositingConfig {
    fn default() -> Self {
        Self {
            background_refresh_divisor: 2,
        }
    }
}

impl Default for SnappingConfig {
    fn default() -> Self {
        Self {
            strict_tolerance_px: 2.0,
            soft_tolerance_px: 10.0,
            rotation_step_deg: 15.0,
            activation_threshold_px: 3.0,
        }
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            fallback_width: 1920,
            fallback_height: 1080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl EngineConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str::<EngineConfig>(&content) {
                    Ok(config) => match config.validate() {
                        Ok(()) => return config,
                        Err(e) => {
                            tracing::warn!("Ignoring invalid config at {:?}: {}", config_path, e);
                        }
                    },
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Reject values the clock and compositor cannot work with.
    pub fn validate(&self) -> SpliceResult<()> {
        let p = &self.playback;
        if !(p.fps.is_finite() && p.fps > 0.0) {
            return Err(SpliceError::config(format!("fps must be > 0, got {}", p.fps)));
        }
        if !(p.playback_rate.is_finite() && p.playback_rate > 0.0) {
            return Err(SpliceError::config(format!(
                "playback_rate must be > 0, got {}",
                p.playback_rate
            )));
        }
        if p.lookahead_ms < 0.0 || p.stall_poll_interval_ms <= 0.0 {
            return Err(SpliceError::config(
                "lookahead_ms must be >= 0 and stall_poll_interval_ms > 0",
            ));
        }
        if self.compositing.background_refresh_divisor == 0 {
            return Err(SpliceError::config(
                "background_refresh_divisor must be at least 1",
            ));
        }
        if self.snapping.strict_tolerance_px < 0.0 || self.snapping.soft_tolerance_px < 0.0 {
            return Err(SpliceError::config("snap tolerances must be >= 0"));
        }
        Ok(())
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("splice").join("config.json")
}
