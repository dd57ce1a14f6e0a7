//! Business-rule validation for proposed campaign configuration
//!
//! Every check is pure and total. Hard failures go into `Verdict::missing`
//! and soft-threshold breaches into `Verdict::warnings`; nothing here returns
//! an error, so callers can run every rule and aggregate the results.

use crate::config::{Config, RangeLimits};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Asset counts keyed by category (`headlines`, `logos_1_1`, ...)
pub type AssetCounts = HashMap<String, u32>;

/// Structured pass/fail result of one rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub valid: bool,
    /// Unmet hard requirements
    pub missing: Vec<String>,
    /// Soft-threshold breaches; never affect `valid`
    pub warnings: Vec<String>,
    /// Requirements that were satisfied
    #[serde(default)]
    pub present: Vec<String>,
}

impl Verdict {
    fn from_parts(missing: Vec<String>, warnings: Vec<String>, present: Vec<String>) -> Self {
        Self {
            valid: missing.is_empty(),
            missing,
            warnings,
            present,
        }
    }
}

/// Geo-targeting settings as read from the campaign
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoSettings {
    #[serde(default)]
    pub presence_only: bool,
    #[serde(default)]
    pub targeted_countries: Vec<String>,
    #[serde(default)]
    pub excluded_locations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetSettings {
    #[serde(default)]
    pub daily_budget: f64,
    #[serde(default)]
    pub budget_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TcpaSettings {
    #[serde(default)]
    pub tcpa_value: f64,
    #[serde(default)]
    pub tcpa_enabled: bool,
}

/// Full campaign configuration checked by [`RuleValidator::validate_structure`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignConfig {
    #[serde(default)]
    pub campaign_name: String,
    #[serde(default)]
    pub url_exclusions: Vec<String>,
    #[serde(default)]
    pub geo_targeting: GeoSettings,
    #[serde(default)]
    pub asset_counts: AssetCounts,
    #[serde(default)]
    pub budget_settings: BudgetSettings,
    #[serde(default)]
    pub tcpa_settings: TcpaSettings,
}

/// One named sub-check of a structure validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub category: String,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSummary {
    pub total_checks: usize,
    pub passed_checks: usize,
    pub failed_checks: usize,
}

/// Aggregate of every sub-check, with category-prefixed messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureReport {
    pub valid: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub details: Vec<CheckResult>,
    pub summary: CheckSummary,
}

/// Snapshot of recent spend used for stop-loss detection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignState {
    #[serde(default)]
    pub daily_budget: f64,
    #[serde(default)]
    pub recent_7d_spend: f64,
    #[serde(default)]
    pub recent_7d_conversions: u32,
    #[serde(default)]
    pub days_since_last_conversion: u32,
    /// Lifetime conversions; tCPA changes need a minimum
    #[serde(default)]
    pub total_conversions: u32,
}

/// Stop-loss condition detected on a campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopLoss {
    /// Overspend with nothing to show for it; propose a pause
    Pause { spend: f64, threshold: f64 },
    /// Conversion drought; freeze all changes
    Freeze { days: u32 },
}

impl StopLoss {
    /// Whether all lever pulls should be blocked
    pub fn freezes_changes(&self) -> bool {
        matches!(self, StopLoss::Freeze { .. })
    }

    pub fn message(&self) -> String {
        match self {
            StopLoss::Pause { spend, threshold } => format!(
                "STOP-LOSS: Spend ${:.2} exceeds ${:.2} with 0 conversions - propose pause",
                spend, threshold
            ),
            StopLoss::Freeze { days } => {
                format!("STOP-LOSS: No conversions in {} days - freeze all changes", days)
            }
        }
    }
}

/// Evaluates campaign rules against the configured thresholds
#[derive(Debug, Clone, Default)]
pub struct RuleValidator {
    config: Config,
}

impl RuleValidator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check a proposed daily budget
    pub fn validate_budget(&self, old: f64, new: f64) -> Verdict {
        check_range("Budget", &self.config.budget, old, new)
    }

    /// Check a proposed target CPA
    pub fn validate_tcpa(&self, old: f64, new: f64) -> Verdict {
        check_range("tCPA", &self.config.tcpa, old, new)
    }

    /// Check asset counts against per-category minimums and maximums.
    /// Categories absent from `counts` are evaluated as zero.
    pub fn validate_asset_counts(&self, counts: &AssetCounts) -> Verdict {
        let rules = &self.config.assets;
        let auto_videos = counts
            .get(&rules.auto_generated_video_key)
            .copied()
            .unwrap_or(0);

        let mut missing = Vec::new();
        let mut warnings = Vec::new();
        let mut present = Vec::new();

        for rule in &rules.rules {
            let count = counts.get(&rule.category).copied().unwrap_or(0);

            if rule.category == "videos" && count < rule.min && auto_videos > 0 {
                present.push(format!("{} (auto-generated: {})", rule.label, auto_videos));
                continue;
            }

            if count < rule.min {
                missing.push(format!("{} ({}/{})", rule.label, count, rule.min));
            } else if let Some(max) = rule.max.filter(|max| count > *max) {
                warnings.push(format!("Too many {} ({}/{})", rule.label, count, max));
            } else {
                present.push(format!("{} ({})", rule.label, count));
            }
        }

        Verdict::from_parts(missing, warnings, present)
    }

    /// Check that every required exclusion glob matches at least one
    /// configured exclusion. `*` matches any run of characters and the
    /// match is anchored at the start of the candidate only.
    pub fn validate_url_exclusions(&self, current: &[String]) -> Verdict {
        let mut missing = Vec::new();
        let mut warnings = Vec::new();
        let mut present = Vec::new();

        for required in &self.config.url_exclusions.required {
            let regex = match glob_to_regex(required) {
                Ok(regex) => regex,
                Err(e) => {
                    warnings.push(format!("Invalid exclusion pattern '{}': {}", required, e));
                    missing.push(required.clone());
                    continue;
                }
            };

            match current.iter().find(|candidate| regex.is_match(candidate)) {
                Some(candidate) => present.push(candidate.clone()),
                None => missing.push(required.clone()),
            }
        }

        Verdict::from_parts(missing, warnings, present)
    }

    pub fn validate_geo_targeting(&self, settings: &GeoSettings) -> Verdict {
        let geo = &self.config.geo;
        let mut missing = Vec::new();
        let mut warnings = Vec::new();

        if geo.presence_only && !settings.presence_only {
            missing.push("Geo-targeting must be set to PRESENCE_ONLY".to_string());
        }

        for country in &settings.targeted_countries {
            if !geo.allowed_countries.contains(country) {
                warnings.push(format!("Country '{}' may not be optimal for targeting", country));
            }
        }

        for location in &settings.excluded_locations {
            if geo.global_exclusions.contains(location) {
                warnings.push(format!("Location '{}' is already in global exclusions", location));
            }
        }

        Verdict::from_parts(missing, warnings, Vec::new())
    }

    pub fn validate_naming(&self, name: &str) -> Verdict {
        let naming = &self.config.naming;
        let mut missing = Vec::new();
        let mut warnings = Vec::new();

        if !name.starts_with(&naming.prefix) {
            missing.push(format!("Campaign name must start with '{}'", naming.prefix));
        }

        if !name.contains(&naming.campaign_type) {
            missing.push(format!("Campaign name must include '{}'", naming.campaign_type));
        }

        if !name.contains(&naming.separator) {
            warnings.push(format!("Consider using '{}' as separator", naming.separator));
        }

        let lower = name.to_lowercase();
        if !naming
            .audience_keywords
            .iter()
            .any(|keyword| lower.contains(&keyword.to_lowercase()))
        {
            warnings.push("Consider adding audience identifier to campaign name".to_string());
        }

        Verdict::from_parts(missing, warnings, Vec::new())
    }

    /// Run every rule against a full campaign configuration
    pub fn validate_structure(&self, campaign: &CampaignConfig) -> StructureReport {
        let details = vec![
            CheckResult {
                category: "url_exclusions".to_string(),
                verdict: self.validate_url_exclusions(&campaign.url_exclusions),
            },
            CheckResult {
                category: "geo_targeting".to_string(),
                verdict: self.validate_geo_targeting(&campaign.geo_targeting),
            },
            CheckResult {
                category: "asset_requirements".to_string(),
                verdict: self.validate_asset_counts(&campaign.asset_counts),
            },
            CheckResult {
                category: "campaign_naming".to_string(),
                verdict: self.validate_naming(&campaign.campaign_name),
            },
            CheckResult {
                category: "budget_settings".to_string(),
                verdict: self.validate_budget_settings(&campaign.budget_settings),
            },
            CheckResult {
                category: "tcpa_settings".to_string(),
                verdict: self.validate_tcpa_settings(&campaign.tcpa_settings),
            },
        ];

        let mut issues = Vec::new();
        let mut warnings = Vec::new();
        for check in &details {
            issues.extend(
                check
                    .verdict
                    .missing
                    .iter()
                    .map(|issue| format!("{}: {}", check.category, issue)),
            );
            warnings.extend(
                check
                    .verdict
                    .warnings
                    .iter()
                    .map(|warning| format!("{}: {}", check.category, warning)),
            );
        }

        let passed_checks = details.iter().filter(|c| c.verdict.valid).count();
        let summary = CheckSummary {
            total_checks: details.len(),
            passed_checks,
            failed_checks: details.len() - passed_checks,
        };

        StructureReport {
            valid: passed_checks == details.len(),
            issues,
            warnings,
            details,
            summary,
        }
    }

    fn validate_budget_settings(&self, settings: &BudgetSettings) -> Verdict {
        let mut verdict = self.validate_budget(settings.daily_budget, settings.daily_budget);
        if settings.budget_type != "DAILY" {
            verdict.missing.push(format!(
                "Budget type must be 'DAILY', not '{}'",
                settings.budget_type
            ));
            verdict.valid = false;
        }
        verdict
    }

    fn validate_tcpa_settings(&self, settings: &TcpaSettings) -> Verdict {
        let mut verdict = self.validate_tcpa(settings.tcpa_value, settings.tcpa_value);
        if !settings.tcpa_enabled {
            verdict
                .warnings
                .push("tCPA is not enabled, consider enabling for better performance".to_string());
        }
        verdict
    }

    /// Detect overspend or a conversion drought. Advisory only.
    pub fn check_stop_loss(&self, state: &CampaignState) -> Option<StopLoss> {
        let limits = &self.config.stop_loss;

        if state.daily_budget > 0.0 {
            let threshold = state.daily_budget * limits.spend_multiplier;
            if state.recent_7d_spend > threshold && state.recent_7d_conversions == 0 {
                return Some(StopLoss::Pause {
                    spend: state.recent_7d_spend,
                    threshold,
                });
            }
        }

        if state.days_since_last_conversion >= limits.conversion_dry_spell_days {
            return Some(StopLoss::Freeze {
                days: state.days_since_last_conversion,
            });
        }

        None
    }
}

fn check_range(label: &str, limits: &RangeLimits, old: f64, new: f64) -> Verdict {
    let mut missing = Vec::new();
    let mut warnings = Vec::new();

    // NaN compares false against every bound
    if !new.is_finite() {
        missing.push(format!("{} {} is not a finite number", label, new));
        return Verdict::from_parts(missing, warnings, Vec::new());
    }

    if new < limits.min {
        missing.push(format!(
            "{} ${:.2} is below minimum of ${:.2}",
            label, new, limits.min
        ));
    } else if new < limits.soft_min {
        warnings.push(format!(
            "{} ${:.2} is low, consider increasing to ${:.2}+",
            label, new, limits.soft_min
        ));
    }

    if new > limits.max {
        missing.push(format!(
            "{} ${:.2} exceeds maximum of ${:.2}",
            label, new, limits.max
        ));
    } else if new > limits.soft_max {
        warnings.push(format!(
            "{} ${:.2} is high, monitor performance closely",
            label, new
        ));
    }

    if old > 0.0 {
        let step = ((new - old) / old * 100.0).abs();
        if step > limits.max_step_percent {
            warnings.push(format!(
                "{} adjustment {:.1}% exceeds recommended step of {:.0}%",
                label, step, limits.max_step_percent
            ));
        }
    }

    Verdict::from_parts(missing, warnings, Vec::new())
}

/// Translate a path glob into a start-anchored regex
fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{}", body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn validator() -> RuleValidator {
        RuleValidator::default()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_budget_bounds() {
        let v = validator();

        let low = v.validate_budget(40.0, 25.0);
        assert!(!low.valid);
        assert!(low.missing[0].contains("below minimum"));

        let high = v.validate_budget(90.0, 120.0);
        assert!(!high.valid);
        assert!(high.missing[0].contains("exceeds maximum"));

        let ok = v.validate_budget(60.0, 65.0);
        assert!(ok.valid);
        assert!(ok.warnings.is_empty());
    }

    #[test]
    fn test_budget_soft_warnings_keep_verdict_valid() {
        let v = validator();

        let low = v.validate_budget(45.0, 45.0);
        assert!(low.valid);
        assert_eq!(low.warnings.len(), 1);
        assert!(low.warnings[0].contains("is low"));

        let high = v.validate_budget(85.0, 90.0);
        assert!(high.valid);
        assert!(high.warnings[0].contains("is high"));
    }

    #[test]
    fn test_budget_large_step_warns() {
        let verdict = validator().validate_budget(40.0, 60.0);
        assert!(verdict.valid);
        assert!(verdict.warnings.iter().any(|w| w.contains("adjustment 50.0%")));
    }

    #[test]
    fn test_tcpa_bounds() {
        let v = validator();
        assert!(!v.validate_tcpa(100.0, 79.99).valid);
        assert!(!v.validate_tcpa(100.0, 200.01).valid);
        assert!(v.validate_tcpa(120.0, 120.0).valid);

        let soft = v.validate_tcpa(90.0, 90.0);
        assert!(soft.valid);
        assert!(soft.warnings[0].contains("is low"));
    }

    #[test]
    fn test_non_finite_values_are_rejected() {
        let v = validator();
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let budget = v.validate_budget(50.0, bad);
            assert!(!budget.valid, "budget {} accepted", bad);
            assert!(budget.missing[0].contains("is not a finite number"));

            let tcpa = v.validate_tcpa(120.0, bad);
            assert!(!tcpa.valid, "tCPA {} accepted", bad);
        }
        // A non-finite old value only disables the step check
        assert!(v.validate_budget(f64::NAN, 60.0).valid);
    }

    #[test]
    fn test_asset_counts_report_every_missing_category_once() {
        let mut counts = AssetCounts::new();
        counts.insert("headlines".to_string(), 3);

        let verdict = validator().validate_asset_counts(&counts);
        assert!(!verdict.valid);
        assert_eq!(
            verdict.missing,
            strings(&[
                "headlines (3/5)",
                "long headlines (0/1)",
                "descriptions (0/2)",
                "business name (0/1)",
                "1:1 logos (0/1)",
                "4:1 logos (0/1)",
                "1.91:1 images (0/3)",
                "1:1 images (0/3)",
                "4:3 images (0/1)",
                "videos (0/1)",
            ])
        );
    }

    #[test]
    fn test_auto_generated_videos_satisfy_video_rule() {
        let counts: AssetCounts = [
            ("headlines", 7),
            ("long_headlines", 1),
            ("descriptions", 3),
            ("business_name", 1),
            ("logos_1_1", 1),
            ("logos_4_1", 1),
            ("images_1_91_1", 3),
            ("images_1_1", 3),
            ("images_4_3", 1),
            ("auto_gen_videos", 2),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect();

        let verdict = validator().validate_asset_counts(&counts);
        assert!(verdict.valid, "missing: {:?}", verdict.missing);
        assert!(verdict.present.iter().any(|p| p.contains("auto-generated")));
    }

    #[test]
    fn test_asset_counts_above_max_warn() {
        let mut counts = AssetCounts::new();
        counts.insert("headlines".to_string(), 16);

        let verdict = validator().validate_asset_counts(&counts);
        assert!(verdict.warnings.contains(&"Too many headlines (16/15)".to_string()));
        assert!(!verdict.missing.iter().any(|m| m.starts_with("headlines")));
    }

    #[test]
    fn test_url_exclusions() {
        let current = strings(&["/buyers/*", "/sellers/homes", "/blog/", "/admin/panel"]);
        let verdict = validator().validate_url_exclusions(&current);

        assert!(!verdict.valid);
        assert_eq!(
            verdict.missing,
            strings(&["/login/*", "/register/*", "/checkout/*", "/cart/*"])
        );
        assert_eq!(verdict.present.len(), 4);
    }

    #[test]
    fn test_url_glob_is_anchored_and_literal() {
        let regex = glob_to_regex("/cart/*").unwrap();
        assert!(regex.is_match("/cart/"));
        assert!(regex.is_match("/cart/items/42"));
        assert!(!regex.is_match("/shop/cart/"));
        assert!(!regex.is_match("/cart"));

        let dotted = glob_to_regex("/a.b/*").unwrap();
        assert!(!dotted.is_match("/axb/"));
    }

    #[test]
    fn test_geo_targeting() {
        let config = Config {
            geo: crate::config::GeoRequirements {
                global_exclusions: strings(&["Alaska"]),
                ..Default::default()
            },
            ..Config::default()
        };
        let v = RuleValidator::new(config);

        let settings = GeoSettings {
            presence_only: false,
            targeted_countries: strings(&["US", "CA"]),
            excluded_locations: strings(&["Alaska"]),
        };
        let verdict = v.validate_geo_targeting(&settings);
        assert!(!verdict.valid);
        assert_eq!(verdict.missing.len(), 1);
        assert_eq!(verdict.warnings.len(), 2);

        let ok = v.validate_geo_targeting(&GeoSettings {
            presence_only: true,
            ..Default::default()
        });
        assert!(ok.valid);
    }

    #[test]
    fn test_naming() {
        let v = validator();
        let good = v.validate_naming("L.R - PMax - General");
        assert!(good.valid);
        assert!(good.warnings.is_empty());

        let bad = v.validate_naming("Search_Brand");
        assert!(!bad.valid);
        assert_eq!(bad.missing.len(), 2);
        assert_eq!(bad.warnings.len(), 2);
    }

    #[test]
    fn test_structure_aggregates_with_category_prefix() {
        let campaign = CampaignConfig {
            campaign_name: "L.R - PMax - General".to_string(),
            url_exclusions: strings(&[
                "/buyers/", "/sellers/", "/blog/", "/admin/", "/login/", "/register/",
                "/checkout/", "/cart/",
            ]),
            geo_targeting: GeoSettings {
                presence_only: true,
                ..Default::default()
            },
            asset_counts: AssetCounts::new(),
            budget_settings: BudgetSettings {
                daily_budget: 60.0,
                budget_type: "DAILY".to_string(),
            },
            tcpa_settings: TcpaSettings {
                tcpa_value: 120.0,
                tcpa_enabled: false,
            },
        };

        let report = validator().validate_structure(&campaign);
        assert!(!report.valid);
        assert_eq!(report.summary.total_checks, 6);
        assert_eq!(report.summary.passed_checks, 5);
        assert_eq!(report.summary.failed_checks, 1);
        assert!(report
            .issues
            .iter()
            .all(|issue| issue.starts_with("asset_requirements: ")));
        assert!(report
            .warnings
            .contains(&"tcpa_settings: tCPA is not enabled, consider enabling for better performance".to_string()));
    }

    #[test]
    fn test_structure_rejects_non_daily_budget() {
        let campaign = CampaignConfig {
            budget_settings: BudgetSettings {
                daily_budget: 60.0,
                budget_type: "SHARED".to_string(),
            },
            ..Default::default()
        };
        let report = validator().validate_structure(&campaign);
        assert!(report
            .issues
            .contains(&"budget_settings: Budget type must be 'DAILY', not 'SHARED'".to_string()));
    }

    #[test]
    fn test_stop_loss() {
        let v = validator();

        let overspend = CampaignState {
            daily_budget: 50.0,
            recent_7d_spend: 120.0,
            recent_7d_conversions: 0,
            days_since_last_conversion: 3,
            total_conversions: 12,
        };
        let stop = v.check_stop_loss(&overspend).unwrap();
        assert!(!stop.freezes_changes());
        assert!(stop.message().contains("propose pause"));

        let drought = CampaignState {
            daily_budget: 50.0,
            recent_7d_spend: 40.0,
            recent_7d_conversions: 0,
            days_since_last_conversion: 14,
            total_conversions: 12,
        };
        assert_eq!(v.check_stop_loss(&drought), Some(StopLoss::Freeze { days: 14 }));

        let healthy = CampaignState {
            daily_budget: 50.0,
            recent_7d_spend: 300.0,
            recent_7d_conversions: 4,
            days_since_last_conversion: 1,
            total_conversions: 40,
        };
        assert_eq!(v.check_stop_loss(&healthy), None);
    }

    const EXCLUSION_POOL: &[&str] = &[
        "/buyers/", "/sellers/x", "/blog/post", "/admin/", "/login/", "/register/",
        "/checkout/", "/cart/", "/about/", "/contact", "/idx/",
    ];

    proptest! {
        #[test]
        fn prop_budget_below_min_is_invalid(new in 0.0f64..29.99) {
            let verdict = validator().validate_budget(50.0, new);
            prop_assert!(!verdict.valid);
            prop_assert!(verdict.missing.iter().any(|m| m.contains("below minimum")));
        }

        #[test]
        fn prop_budget_above_max_is_invalid(new in 100.01f64..10_000.0) {
            let verdict = validator().validate_budget(50.0, new);
            prop_assert!(!verdict.valid);
            prop_assert!(verdict.missing.iter().any(|m| m.contains("exceeds maximum")));
        }

        #[test]
        fn prop_budget_in_range_is_valid(old in 0.0f64..500.0, new in 30.0f64..=100.0) {
            prop_assert!(validator().validate_budget(old, new).valid);
        }

        #[test]
        fn prop_verdict_valid_only_for_finite_in_range(new in proptest::num::f64::ANY) {
            let verdict = validator().validate_budget(50.0, new);
            prop_assert_eq!(verdict.valid, new.is_finite() && (30.0..=100.0).contains(&new));
        }

        #[test]
        fn prop_tcpa_validity_matches_range(new in 0.0f64..400.0) {
            let verdict = validator().validate_tcpa(100.0, new);
            prop_assert_eq!(verdict.valid, (80.0..=200.0).contains(&new));
        }

        #[test]
        fn prop_url_exclusions_monotonic(
            current in proptest::collection::vec(proptest::sample::select(EXCLUSION_POOL), 0..8),
            extra in proptest::sample::select(EXCLUSION_POOL),
        ) {
            let v = validator();
            let before: Vec<String> = current.iter().map(|s| s.to_string()).collect();
            let mut after = before.clone();
            after.push(extra.to_string());

            let missing_before = v.validate_url_exclusions(&before).missing;
            let missing_after = v.validate_url_exclusions(&after).missing;
            for pattern in &missing_after {
                prop_assert!(missing_before.contains(pattern));
            }
        }
    }
}
