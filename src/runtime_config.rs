// =============================================================================
// Runtime Configuration — board settings with atomic save
// =============================================================================
//
// Every tunable of the board service lives here: where the POS backend is,
// how often to poll it, how fast the TV rotates through products, and the
// presentation constants of the forecast overlay. The forecast constants
// (momentum multiplier, step count, step length, stale-anchor window) have no
// statistical derivation; they are display tuning and are kept as named
// configuration rather than buried literals.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_api_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_rotation_interval_secs() -> u64 {
    6
}

fn default_stale_anchor_ms() -> i64 {
    55_000
}

fn default_momentum_multiplier() -> f64 {
    1.35
}

fn default_forecast_steps() -> usize {
    6
}

fn default_forecast_step_minutes() -> i64 {
    10
}

fn default_preferred_categories() -> Vec<String> {
    vec![
        "COCKTAILS".to_string(),
        "SHOTS".to_string(),
        "BEERS".to_string(),
        "BEVERAGES".to_string(),
    ]
}

fn default_movers_limit() -> usize {
    12
}

// =============================================================================
// ForecastParams
// =============================================================================

/// Presentation constants of the forecast overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastParams {
    /// Amplifies the momentum drift's influence on the forecast target so the
    /// projected line is visible on a TV. Not a statistical claim.
    #[serde(default = "default_momentum_multiplier")]
    pub momentum_multiplier: f64,

    /// Number of forecast points appended after the last observed point.
    #[serde(default = "default_forecast_steps")]
    pub steps: usize,

    /// Spacing between forecast points, in minutes.
    #[serde(default = "default_forecast_step_minutes")]
    pub step_minutes: i64,
}

impl Default for ForecastParams {
    fn default() -> Self {
        Self {
            momentum_multiplier: default_momentum_multiplier(),
            steps: default_forecast_steps(),
            step_minutes: default_forecast_step_minutes(),
        }
    }
}

impl ForecastParams {
    /// Spacing between forecast points, in milliseconds.
    pub fn step_ms(&self) -> i64 {
        self.step_minutes * 60_000
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for the board service.
///
/// Every field has a serde default so that older JSON files missing new
/// fields will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Upstream POS backend ------------------------------------------------

    /// Base URL of the POS REST backend.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Seconds between snapshot polls of the backend.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    // --- TV rotation ---------------------------------------------------------

    /// Seconds between automatic product rotations in Auto mode.
    #[serde(default = "default_rotation_interval_secs")]
    pub rotation_interval_secs: u64,

    // --- Series / forecast ---------------------------------------------------

    /// A product whose newest observed point is older than this window gets a
    /// synthetic current-price anchor appended to its series.
    #[serde(default = "default_stale_anchor_ms")]
    pub stale_anchor_ms: i64,

    /// Forecast overlay presentation constants.
    #[serde(default)]
    pub forecast: ForecastParams,

    // --- Board / ticker ------------------------------------------------------

    /// Category labels pinned to the top of the grouped board, in order.
    /// Compared against upper-cased category labels.
    #[serde(default = "default_preferred_categories")]
    pub preferred_categories: Vec<String>,

    /// Maximum number of entries in the movers ticker.
    #[serde(default = "default_movers_limit")]
    pub movers_limit: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            poll_interval_secs: default_poll_interval_secs(),
            rotation_interval_secs: default_rotation_interval_secs(),
            stale_anchor_ms: default_stale_anchor_ms(),
            forecast: ForecastParams::default(),
            preferred_categories: default_preferred_categories(),
            movers_limit: default_movers_limit(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read board config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse board config from {}", path.display()))?;

        info!(
            path = %path.display(),
            api_base_url = %config.api_base_url,
            poll_interval_secs = config.poll_interval_secs,
            "board config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise board config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "board config saved (atomic)");
        Ok(())
    }
}
