//! Configuration file support for leverlog
//!
//! Reads from .leverlog/config.toml. Every threshold the validators,
//! ledger and impact estimator use lives here, with defaults matching the
//! account's standing rules.

use crate::error::{LedgerError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Name of the per-project directory holding config and ledger files
pub const DATA_DIR_NAME: &str = ".leverlog";

/// Environment variable that overrides the data directory
pub const DATA_DIR_ENV: &str = "LEVERLOG_DATA_DIR";

/// Configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "RangeLimits::budget", deserialize_with = "budget_limits")]
    pub budget: RangeLimits,

    #[serde(default = "RangeLimits::tcpa", deserialize_with = "tcpa_limits")]
    pub tcpa: RangeLimits,

    #[serde(default)]
    pub assets: AssetRequirements,

    #[serde(default)]
    pub url_exclusions: UrlExclusionConfig,

    #[serde(default)]
    pub geo: GeoRequirements,

    #[serde(default)]
    pub naming: NamingConventions,

    #[serde(default)]
    pub stop_loss: StopLossLimits,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub impact: ImpactConfig,

    #[serde(default)]
    pub gates: GateLimits,

    #[serde(default)]
    pub phases: PhaseRequirements,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            budget: RangeLimits::budget(),
            tcpa: RangeLimits::tcpa(),
            assets: AssetRequirements::default(),
            url_exclusions: UrlExclusionConfig::default(),
            geo: GeoRequirements::default(),
            naming: NamingConventions::default(),
            stop_loss: StopLossLimits::default(),
            retention: RetentionConfig::default(),
            impact: ImpactConfig::default(),
            gates: GateLimits::default(),
            phases: PhaseRequirements::default(),
        }
    }
}

/// Hard bounds, soft bounds and the recommended step for a numeric lever.
///
/// Values outside `[min, max]` fail validation. Values outside
/// `[soft_min, soft_max]` pass with a warning.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RangeLimits {
    pub min: f64,
    pub max: f64,
    pub soft_min: f64,
    pub soft_max: f64,
    /// Largest single adjustment, in percent, before a warning is raised
    pub max_step_percent: f64,
}

impl RangeLimits {
    /// Daily budget rules: $30-$100, comfortable between $50 and $80
    pub fn budget() -> Self {
        Self {
            min: 30.0,
            max: 100.0,
            soft_min: 50.0,
            soft_max: 80.0,
            max_step_percent: 30.0,
        }
    }

    /// Target CPA rules: $80-$200, comfortable between $100 and $150
    pub fn tcpa() -> Self {
        Self {
            min: 80.0,
            max: 200.0,
            soft_min: 100.0,
            soft_max: 150.0,
            max_step_percent: 15.0,
        }
    }
}

/// A `[budget]` or `[tcpa]` table where every key is optional
#[derive(Debug, Default, Deserialize)]
struct RangeOverrides {
    min: Option<f64>,
    max: Option<f64>,
    soft_min: Option<f64>,
    soft_max: Option<f64>,
    max_step_percent: Option<f64>,
}

impl RangeOverrides {
    fn over(self, base: RangeLimits) -> RangeLimits {
        RangeLimits {
            min: self.min.unwrap_or(base.min),
            max: self.max.unwrap_or(base.max),
            soft_min: self.soft_min.unwrap_or(base.soft_min),
            soft_max: self.soft_max.unwrap_or(base.soft_max),
            max_step_percent: self.max_step_percent.unwrap_or(base.max_step_percent),
        }
    }
}

fn budget_limits<'de, D>(deserializer: D) -> std::result::Result<RangeLimits, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(RangeOverrides::deserialize(deserializer)?.over(RangeLimits::budget()))
}

fn tcpa_limits<'de, D>(deserializer: D) -> std::result::Result<RangeLimits, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(RangeOverrides::deserialize(deserializer)?.over(RangeLimits::tcpa()))
}

impl Default for RangeLimits {
    fn default() -> Self {
        Self::budget()
    }
}

/// Min/max for one asset category
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AssetRule {
    /// Key looked up in the asset count map
    pub category: String,
    /// Human label used in verdict messages
    pub label: String,
    pub min: u32,
    /// No upper bound when absent
    #[serde(default)]
    pub max: Option<u32>,
}

impl AssetRule {
    fn new(category: &str, label: &str, min: u32, max: Option<u32>) -> Self {
        Self {
            category: category.to_string(),
            label: label.to_string(),
            min,
            max,
        }
    }
}

/// Asset group minimums for Performance Max
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AssetRequirements {
    #[serde(default = "default_asset_rules")]
    pub rules: Vec<AssetRule>,

    /// Count key that also satisfies the `videos` rule when non-zero
    #[serde(default = "default_auto_video_key")]
    pub auto_generated_video_key: String,
}

fn default_asset_rules() -> Vec<AssetRule> {
    vec![
        AssetRule::new("headlines", "headlines", 5, Some(15)),
        AssetRule::new("long_headlines", "long headlines", 1, Some(5)),
        AssetRule::new("descriptions", "descriptions", 2, Some(5)),
        AssetRule::new("business_name", "business name", 1, None),
        AssetRule::new("logos_1_1", "1:1 logos", 1, Some(5)),
        AssetRule::new("logos_4_1", "4:1 logos", 1, Some(5)),
        AssetRule::new("images_1_91_1", "1.91:1 images", 3, Some(20)),
        AssetRule::new("images_1_1", "1:1 images", 3, Some(20)),
        AssetRule::new("images_4_3", "4:3 images", 1, Some(20)),
        AssetRule::new("videos", "videos", 1, Some(10)),
    ]
}

fn default_auto_video_key() -> String {
    "auto_gen_videos".to_string()
}

impl Default for AssetRequirements {
    fn default() -> Self {
        Self {
            rules: default_asset_rules(),
            auto_generated_video_key: default_auto_video_key(),
        }
    }
}

/// URL path globs that must be excluded from final URL expansion
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct UrlExclusionConfig {
    #[serde(default = "default_required_exclusions")]
    pub required: Vec<String>,
}

fn default_required_exclusions() -> Vec<String> {
    [
        "/buyers/*",
        "/sellers/*",
        "/blog/*",
        "/admin/*",
        "/login/*",
        "/register/*",
        "/checkout/*",
        "/cart/*",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for UrlExclusionConfig {
    fn default() -> Self {
        Self {
            required: default_required_exclusions(),
        }
    }
}

/// Geo-targeting requirements
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct GeoRequirements {
    #[serde(default = "default_true")]
    pub presence_only: bool,

    #[serde(default = "default_allowed_countries")]
    pub allowed_countries: Vec<String>,

    /// Locations already excluded account-wide
    #[serde(default)]
    pub global_exclusions: Vec<String>,
}

fn default_allowed_countries() -> Vec<String> {
    vec!["US".to_string()]
}

fn default_true() -> bool {
    true
}

impl Default for GeoRequirements {
    fn default() -> Self {
        Self {
            presence_only: true,
            allowed_countries: default_allowed_countries(),
            global_exclusions: Vec::new(),
        }
    }
}

/// Campaign naming convention, e.g. "L.R - PMax - General"
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct NamingConventions {
    pub prefix: String,
    pub campaign_type: String,
    pub separator: String,
    pub audience_keywords: Vec<String>,
}

impl Default for NamingConventions {
    fn default() -> Self {
        Self {
            prefix: "L.R".to_string(),
            campaign_type: "PMax".to_string(),
            separator: " - ".to_string(),
            audience_keywords: ["general", "specific", "audience", "target"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Stop-loss triggers
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct StopLossLimits {
    /// Seven-day spend above `daily_budget * spend_multiplier` with no conversions
    pub spend_multiplier: f64,
    /// Days without a conversion before all changes freeze
    pub conversion_dry_spell_days: u32,
}

impl Default for StopLossLimits {
    fn default() -> Self {
        Self {
            spend_multiplier: 2.0,
            conversion_dry_spell_days: 14,
        }
    }
}

/// Retention and cadence windows.
///
/// The lever ledger is bounded by age and the snapshot ledger by count.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RetentionConfig {
    /// Lever pulls older than this are dropped on every write
    pub lever_days: i64,
    /// Only the most recent N weekly snapshots are kept
    pub snapshot_limit: usize,
    /// One lever per campaign within this many days
    pub cadence_days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            lever_days: 28,
            snapshot_limit: 4,
            cadence_days: 7,
        }
    }
}

/// Impact estimation windows and thresholds
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ImpactConfig {
    pub days_before: i64,
    pub days_after: i64,
    /// Changes within +/- this percent count as neutral
    pub dead_band_percent: f64,
    /// Changes beyond this percent count toward significance
    pub significance_percent: f64,
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            days_before: 7,
            days_after: 14,
            dead_band_percent: 5.0,
            significance_percent: 10.0,
        }
    }
}

/// Per-lever change gates applied before a pull is approved
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct GateLimits {
    /// Minimum days between two budget pulls on a campaign
    pub budget_frequency_days: i64,
    /// Minimum days between two tCPA pulls on a campaign
    pub tcpa_frequency_days: i64,
    /// tCPA may only change once the campaign has this many conversions
    pub tcpa_min_conversions: u32,
    /// Geo-targeting pulls allowed per `geo_period_days`
    pub geo_max_changes: usize,
    pub geo_period_days: i64,
    /// Approved changes wait this long before they are applied
    pub change_window_hours: i64,
}

impl Default for GateLimits {
    fn default() -> Self {
        Self {
            budget_frequency_days: 7,
            tcpa_frequency_days: 14,
            tcpa_min_conversions: 30,
            geo_max_changes: 1,
            geo_period_days: 21,
            change_window_hours: 2,
        }
    }
}

/// Expected and maximum days a campaign should spend in one phase
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct PhaseTimeline {
    pub expected_days: i64,
    pub max_days: i64,
}

/// Gates for moving a campaign from one phase to the next
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PhaseRequirements {
    /// Phase 1 -> 2: primary conversions
    pub min_conversions: u32,
    /// Phase 1 -> 2: campaign age in days
    pub min_days: u32,
    /// Phase 1 -> 2: largest allowed gap between 7-day and 30-day CPL, in percent
    pub cpl_stability_percent: f64,
    /// Phase 1 -> 2: days without a lever pull
    pub no_changes_days: u32,
    /// Phase 1 -> 2 alternative path for slow accounts
    pub time_based_min_age_days: u32,
    pub time_based_min_conversions: u32,
    /// Phase 2 -> 3: days under tCPA bidding
    pub min_tcpa_days: u32,
    /// Phase 2 -> 3: acceptable CPL range
    pub cpl_min: f64,
    pub cpl_max: f64,
    /// Phase 2 -> 3: share of leads tagged serious, in percent
    pub lead_quality_percent: f64,
    /// Phase 2 -> 3: budget pacing as a fraction; lower means constrained
    pub pacing_threshold: f64,
    /// Only these conversion actions may be marked primary
    pub allowed_primary_conversions: Vec<String>,
    /// Days past `expected_days` before a phase counts as lagging
    pub grace_period_days: i64,
    pub phase_1: PhaseTimeline,
    pub phase_2: PhaseTimeline,
    pub phase_3: PhaseTimeline,
}

impl Default for PhaseRequirements {
    fn default() -> Self {
        Self {
            min_conversions: 30,
            min_days: 14,
            cpl_stability_percent: 20.0,
            no_changes_days: 7,
            time_based_min_age_days: 60,
            time_based_min_conversions: 15,
            min_tcpa_days: 30,
            cpl_min: 80.0,
            cpl_max: 150.0,
            lead_quality_percent: 5.0,
            pacing_threshold: 0.8,
            allowed_primary_conversions: vec!["Lead Form Submission".to_string()],
            grace_period_days: 3,
            phase_1: PhaseTimeline {
                expected_days: 21,
                max_days: 35,
            },
            phase_2: PhaseTimeline {
                expected_days: 45,
                max_days: 70,
            },
            phase_3: PhaseTimeline {
                expected_days: 90,
                max_days: 365,
            },
        }
    }
}

impl Config {
    /// Load config from .leverlog/config.toml
    /// Returns default config if the file doesn't exist or can't be parsed
    pub fn load() -> Self {
        let Some(path) = Self::find_config_path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "falling back to default config");
                Self::default()
            }
        }
    }

    /// Load config from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| LedgerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| LedgerError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Find config.toml by walking up directory tree
    fn find_config_path() -> Option<PathBuf> {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            let path = PathBuf::from(dir).join("config.toml");
            return path.exists().then_some(path);
        }

        let path = find_data_dir()?.join("config.toml");
        path.exists().then_some(path)
    }
}

/// Walk up directory tree to find .leverlog folder (like git finds .git)
fn find_data_dir() -> Option<PathBuf> {
    let current_dir = std::env::current_dir().ok()?;
    let mut dir = current_dir.as_path();

    loop {
        let candidate = dir.join(DATA_DIR_NAME);
        if candidate.is_dir() {
            return Some(candidate);
        }

        match dir.parent() {
            Some(parent) => dir = parent,
            None => break,
        }
    }
    None
}

/// Resolve the directory holding the ledger files.
///
/// `LEVERLOG_DATA_DIR` takes priority, then the nearest `.leverlog`
/// directory, then `./.leverlog` (created on first write).
pub fn data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(path);
    }
    find_data_dir().unwrap_or_else(|| PathBuf::from(DATA_DIR_NAME))
}
