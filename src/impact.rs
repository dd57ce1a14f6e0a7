//! Before/after comparison of snapshot metrics around a lever pull
//!
//! For a lever pulled at `T` the pre-window is `[T-7d, T-1d]` and the
//! post-window `[T+1d, T+days_after]`, both inclusive, so the pull day
//! itself belongs to neither. Snapshots in each window are averaged with a
//! plain mean. This is correlation only: there is no control group and no
//! seasonality adjustment.

use crate::config::ImpactConfig;
use crate::error::Result;
use crate::ledger::{shift_days, LeverPull, SnapshotMetrics, WeeklySnapshot};
use crate::store;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const IMPACT_FILE: &str = "impact_analysis.json";

/// Metrics compared by the estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Sessions,
    Users,
    BounceRate,
    SessionDuration,
    Roas,
    ConversionRate,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Sessions,
        Metric::Users,
        Metric::BounceRate,
        Metric::SessionDuration,
        Metric::Roas,
        Metric::ConversionRate,
    ];

    fn value(&self, metrics: &SnapshotMetrics) -> f64 {
        match self {
            Metric::Sessions => metrics.sessions as f64,
            Metric::Users => metrics.users as f64,
            Metric::BounceRate => metrics.bounce_rate,
            Metric::SessionDuration => metrics.session_duration,
            Metric::Roas => metrics.roas,
            Metric::ConversionRate => metrics.conversion_rate,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Sessions => "Sessions",
            Metric::Users => "Users",
            Metric::BounceRate => "Bounce Rate",
            Metric::SessionDuration => "Session Duration",
            Metric::Roas => "ROAS",
            Metric::ConversionRate => "Conversion Rate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    Positive,
    Negative,
    Mixed,
    Minimal,
    InsufficientData,
}

impl fmt::Display for Significance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Significance::Positive => "positive",
            Significance::Negative => "negative",
            Significance::Mixed => "mixed",
            Significance::Minimal => "minimal",
            Significance::InsufficientData => "insufficient_data",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricImpact {
    pub metric: Metric,
    pub before: f64,
    pub after: f64,
    /// Zero when the pre-window average is zero
    pub change_pct: f64,
    pub change_abs: f64,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub snapshots: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    pub lever: LeverPull,
    pub before: Window,
    pub after: Window,
    /// Empty when either window had no snapshots
    pub impact: Vec<MetricImpact>,
    pub significance: Significance,
    pub recommendation: String,
}

/// Scores lever pulls against a snapshot history
pub struct ImpactEstimator<'a> {
    snapshots: &'a [WeeklySnapshot],
    config: ImpactConfig,
}

impl<'a> ImpactEstimator<'a> {
    pub fn new(snapshots: &'a [WeeklySnapshot], config: ImpactConfig) -> Self {
        Self { snapshots, config }
    }

    /// Analyze with the configured post-window length
    pub fn analyze(&self, lever: &LeverPull) -> ImpactAnalysis {
        self.analyze_with(lever, self.config.days_after)
    }

    pub fn analyze_with(&self, lever: &LeverPull, days_after: i64) -> ImpactAnalysis {
        let t = lever.timestamp;
        let (before, before_avg) = self.window(t, self.config.days_before.saturating_neg(), -1);
        let (after, after_avg) = self.window(t, 1, days_after);

        let (Some(before_avg), Some(after_avg)) = (before_avg, after_avg) else {
            return ImpactAnalysis {
                lever: lever.clone(),
                before,
                after,
                impact: Vec::new(),
                significance: Significance::InsufficientData,
                recommendation: "Insufficient data to analyze impact.".to_string(),
            };
        };

        let impact: Vec<MetricImpact> = Metric::ALL
            .iter()
            .zip(before_avg.iter().zip(after_avg.iter()))
            .map(|(metric, (&pre, &post))| self.compare(*metric, pre, post))
            .collect();
        let significance = self.assess(&impact);

        ImpactAnalysis {
            recommendation: recommendation(lever, significance),
            lever: lever.clone(),
            before,
            after,
            impact,
            significance,
        }
    }

    /// Analyze every lever in order
    pub fn analyze_all(&self, levers: &[LeverPull]) -> Vec<ImpactAnalysis> {
        levers.iter().map(|lever| self.analyze(lever)).collect()
    }

    /// Mean of each metric over snapshots inside `[t+from, t+to]` days.
    /// A bound past the calendar range collapses the window to `t` with no
    /// snapshots.
    fn window(&self, t: DateTime<Local>, from: i64, to: i64) -> (Window, Option<[f64; 6]>) {
        let (start, end) = match (shift_days(t, from), shift_days(t, to)) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                tracing::debug!(from, to, "impact window out of range");
                let empty = Window {
                    start: t,
                    end: t,
                    snapshots: 0,
                };
                return (empty, None);
            }
        };

        let inside: Vec<&WeeklySnapshot> = self
            .snapshots
            .iter()
            .filter(|s| s.timestamp >= start && s.timestamp <= end)
            .collect();

        let window = Window {
            start,
            end,
            snapshots: inside.len(),
        };
        if inside.is_empty() {
            return (window, None);
        }

        let n = inside.len() as f64;
        let mut averages = [0.0; 6];
        for (slot, metric) in averages.iter_mut().zip(Metric::ALL.iter()) {
            *slot = inside.iter().map(|s| metric.value(&s.metrics)).sum::<f64>() / n;
        }
        (window, Some(averages))
    }

    fn compare(&self, metric: Metric, before: f64, after: f64) -> MetricImpact {
        let change_abs = after - before;
        let change_pct = if before == 0.0 {
            0.0
        } else {
            change_abs / before * 100.0
        };

        let band = self.config.dead_band_percent;
        let direction = if change_pct > band {
            Direction::Positive
        } else if change_pct < -band {
            Direction::Negative
        } else {
            Direction::Neutral
        };

        MetricImpact {
            metric,
            before,
            after,
            change_pct,
            change_abs,
            direction,
        }
    }

    fn assess(&self, impact: &[MetricImpact]) -> Significance {
        let significant: Vec<&MetricImpact> = impact
            .iter()
            .filter(|m| m.change_pct.abs() > self.config.significance_percent)
            .collect();
        if significant.is_empty() {
            return Significance::Minimal;
        }

        let positive = significant
            .iter()
            .filter(|m| m.direction == Direction::Positive)
            .count();
        let negative = significant
            .iter()
            .filter(|m| m.direction == Direction::Negative)
            .count();

        match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => Significance::Positive,
            std::cmp::Ordering::Less => Significance::Negative,
            std::cmp::Ordering::Equal => Significance::Mixed,
        }
    }
}

fn recommendation(lever: &LeverPull, significance: Significance) -> String {
    let label = lever.lever_type.label();
    match significance {
        Significance::Positive => {
            format!("{} change was successful. Consider similar adjustments.", label)
        }
        Significance::Negative => format!(
            "{} change had negative impact. Consider reverting or adjusting.",
            label
        ),
        Significance::Mixed => format!("{} change had mixed results. Monitor closely.", label),
        Significance::Minimal => format!(
            "{} change had minimal impact. May need time to see results.",
            label
        ),
        Significance::InsufficientData => "Insufficient data to analyze impact.".to_string(),
    }
}

/// Analyze every lever and write the results to `impact_analysis.json`
pub fn analyze_and_save(
    dir: &Path,
    levers: &[LeverPull],
    snapshots: &[WeeklySnapshot],
    config: &ImpactConfig,
) -> Result<Vec<ImpactAnalysis>> {
    let analyses = ImpactEstimator::new(snapshots, config.clone()).analyze_all(levers);
    store::save(&dir.join(IMPACT_FILE), "impact analysis", &analyses)?;
    tracing::info!(levers = analyses.len(), "impact analysis written");
    Ok(analyses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{compute_change, week_bounds, LeverStatus, LeverType, LeverValue};
    use chrono::{Duration, TimeZone};

    fn pull_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 9, 15, 12, 0, 0).unwrap()
    }

    fn lever(lever_type: LeverType) -> LeverPull {
        let old = LeverValue::Number(40.0);
        let new = LeverValue::Number(50.0);
        LeverPull {
            change_id: "test-change".to_string(),
            timestamp: pull_time(),
            campaign_id: "L.R - PMax - General".to_string(),
            lever_type,
            change: compute_change(&old, &new),
            old_value: old,
            new_value: new,
            reason: String::new(),
            impact_note: String::new(),
            status: LeverStatus::Completed,
        }
    }

    fn snapshot(days_from_pull: i64, metrics: SnapshotMetrics) -> WeeklySnapshot {
        let timestamp = pull_time() + Duration::days(days_from_pull);
        let (week_start, week_end) = week_bounds(timestamp);
        WeeklySnapshot {
            week_start,
            week_end,
            timestamp,
            metrics,
            top_traffic_sources: Vec::new(),
            top_pages: Vec::new(),
            detected_changes: Vec::new(),
        }
    }

    fn metrics(sessions: u64, users: u64, bounce: f64, duration: f64, roas: f64, cr: f64) -> SnapshotMetrics {
        SnapshotMetrics {
            sessions,
            users,
            bounce_rate: bounce,
            session_duration: duration,
            roas,
            conversion_rate: cr,
            ..Default::default()
        }
    }

    fn estimator(snapshots: &[WeeklySnapshot]) -> ImpactEstimator<'_> {
        ImpactEstimator::new(snapshots, ImpactConfig::default())
    }

    #[test]
    fn test_insufficient_data_without_pre_window() {
        let snapshots = vec![snapshot(3, metrics(50, 40, 40.0, 2.0, 3.0, 2.0))];
        let analysis = estimator(&snapshots).analyze(&lever(LeverType::Budget));

        assert_eq!(analysis.significance, Significance::InsufficientData);
        assert!(analysis.impact.is_empty());
        assert_eq!(analysis.before.snapshots, 0);
        assert_eq!(analysis.after.snapshots, 1);
    }

    #[test]
    fn test_pull_day_belongs_to_neither_window() {
        let snapshots = vec![
            snapshot(0, metrics(50, 40, 40.0, 2.0, 3.0, 2.0)),
            snapshot(-8, metrics(50, 40, 40.0, 2.0, 3.0, 2.0)),
            snapshot(15, metrics(50, 40, 40.0, 2.0, 3.0, 2.0)),
        ];
        let analysis = estimator(&snapshots).analyze(&lever(LeverType::Budget));
        assert_eq!(analysis.significance, Significance::InsufficientData);
    }

    #[test]
    fn test_sessions_35_to_47_is_positive() {
        let snapshots = vec![
            snapshot(-6, metrics(30, 20, 40.0, 2.0, 3.0, 2.0)),
            snapshot(-2, metrics(40, 30, 40.0, 2.0, 3.0, 2.0)),
            snapshot(4, metrics(45, 35, 50.0, 3.0, 4.0, 3.0)),
            snapshot(11, metrics(49, 37, 50.0, 3.0, 4.0, 3.0)),
        ];
        let analysis = estimator(&snapshots).analyze(&lever(LeverType::Budget));

        let sessions = &analysis.impact[0];
        assert_eq!(sessions.metric, Metric::Sessions);
        assert!((sessions.before - 35.0).abs() < 1e-9);
        assert!((sessions.after - 47.0).abs() < 1e-9);
        assert!((sessions.change_pct - 34.2857).abs() < 1e-3);
        assert_eq!(sessions.direction, Direction::Positive);

        assert_eq!(analysis.impact.len(), 6);
        let significant_positive = analysis
            .impact
            .iter()
            .filter(|m| m.change_pct > 10.0 && m.direction == Direction::Positive)
            .count();
        assert_eq!(significant_positive, 6);
        assert_eq!(analysis.significance, Significance::Positive);
        assert_eq!(
            analysis.recommendation,
            "Budget change was successful. Consider similar adjustments."
        );
    }

    #[test]
    fn test_dead_band_and_minimal() {
        let snapshots = vec![
            snapshot(-3, metrics(100, 100, 40.0, 2.0, 3.0, 2.0)),
            snapshot(5, metrics(104, 97, 41.0, 2.05, 3.1, 2.05)),
        ];
        let analysis = estimator(&snapshots).analyze(&lever(LeverType::Tcpa));

        assert!(analysis.impact.iter().all(|m| m.direction == Direction::Neutral));
        assert_eq!(analysis.significance, Significance::Minimal);
        assert!(analysis.recommendation.starts_with("tCPA change had minimal impact"));
    }

    #[test]
    fn test_tie_is_mixed() {
        let snapshots = vec![
            snapshot(-3, metrics(100, 100, 40.0, 2.0, 3.0, 2.0)),
            snapshot(5, metrics(150, 50, 40.0, 2.0, 3.0, 2.0)),
        ];
        let analysis = estimator(&snapshots).analyze(&lever(LeverType::GeoTargeting));
        assert_eq!(analysis.significance, Significance::Mixed);
        assert!(analysis.recommendation.starts_with("Geo Targeting change had mixed results"));
    }

    #[test]
    fn test_negative_and_zero_baseline() {
        let snapshots = vec![
            snapshot(-3, metrics(100, 100, 40.0, 2.0, 0.0, 2.0)),
            snapshot(5, metrics(60, 70, 40.0, 2.0, 5.0, 2.0)),
        ];
        let analysis = estimator(&snapshots).analyze(&lever(LeverType::AssetGroup));

        let roas = analysis.impact.iter().find(|m| m.metric == Metric::Roas).unwrap();
        assert_eq!(roas.change_pct, 0.0);
        assert!((roas.change_abs - 5.0).abs() < 1e-9);
        assert_eq!(roas.direction, Direction::Neutral);
        assert_eq!(analysis.significance, Significance::Negative);
    }

    #[test]
    fn test_shorter_post_window() {
        let snapshots = vec![
            snapshot(-3, metrics(100, 100, 40.0, 2.0, 3.0, 2.0)),
            snapshot(10, metrics(200, 200, 40.0, 2.0, 3.0, 2.0)),
        ];
        let e = estimator(&snapshots);
        let l = lever(LeverType::Budget);
        assert_eq!(e.analyze_with(&l, 7).significance, Significance::InsufficientData);
        assert_eq!(e.analyze_with(&l, 14).significance, Significance::Positive);
    }

    #[test]
    fn test_out_of_range_windows_are_insufficient() {
        let snapshots = vec![
            snapshot(-3, metrics(100, 100, 40.0, 2.0, 3.0, 2.0)),
            snapshot(10, metrics(200, 200, 40.0, 2.0, 3.0, 2.0)),
        ];
        let l = lever(LeverType::Budget);
        let analysis = estimator(&snapshots).analyze_with(&l, i64::MAX);
        assert_eq!(analysis.significance, Significance::InsufficientData);
        assert_eq!(analysis.after.snapshots, 0);

        let config = ImpactConfig {
            days_before: i64::MAX,
            ..ImpactConfig::default()
        };
        let analysis = ImpactEstimator::new(&snapshots, config).analyze(&l);
        assert_eq!(analysis.significance, Significance::InsufficientData);
        assert_eq!(analysis.before.snapshots, 0);
    }

    #[test]
    fn test_analyze_and_save_writes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let levers = vec![lever(LeverType::Budget), lever(LeverType::Keyword)];
        let analyses = analyze_and_save(dir.path(), &levers, &[], &ImpactConfig::default()).unwrap();
        assert_eq!(analyses.len(), 2);

        let stored: Vec<ImpactAnalysis> = store::load_or_default(&dir.path().join(IMPACT_FILE)).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].significance, Significance::InsufficientData);
    }
}
