//! Change ledger: lever pulls and weekly performance snapshots
//!
//! Two JSON stores with different retention:
//!
//! | Store | File | Retention |
//! |-------|------|-----------|
//! | lever pulls | `lever_history.json` | records newer than `lever_days` (28) |
//! | weekly snapshots | `change_history.json` | last `snapshot_limit` (4) writes |
//!
//! Lever retention is applied on every lever write and physically drops older
//! records. Snapshot retention counts entries, so two runs in the same week
//! both occupy a slot.

use crate::config::RetentionConfig;
use crate::error::Result;
use crate::providers::{AnalyticsReport, CampaignSummary, UnifiedMetrics};
use crate::store;
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

pub const LEVER_FILE: &str = "lever_history.json";
pub const SNAPSHOT_FILE: &str = "change_history.json";

/// How many traffic sources and pages a snapshot keeps
const TOP_N: usize = 3;

/// Kind of campaign parameter a lever pull changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeverType {
    #[serde(rename = "budget")]
    Budget,
    #[serde(rename = "tCPA")]
    Tcpa,
    #[serde(rename = "geo_targeting")]
    GeoTargeting,
    #[serde(rename = "asset_group")]
    AssetGroup,
    #[serde(rename = "keyword")]
    Keyword,
    #[serde(rename = "bid_adjustment")]
    BidAdjustment,
}

impl LeverType {
    pub const ALL: [LeverType; 6] = [
        LeverType::Budget,
        LeverType::Tcpa,
        LeverType::GeoTargeting,
        LeverType::AssetGroup,
        LeverType::Keyword,
        LeverType::BidAdjustment,
    ];

    /// Stored spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            LeverType::Budget => "budget",
            LeverType::Tcpa => "tCPA",
            LeverType::GeoTargeting => "geo_targeting",
            LeverType::AssetGroup => "asset_group",
            LeverType::Keyword => "keyword",
            LeverType::BidAdjustment => "bid_adjustment",
        }
    }

    /// Display label for reports and recommendations
    pub fn label(&self) -> &'static str {
        match self {
            LeverType::Budget => "Budget",
            LeverType::Tcpa => "tCPA",
            LeverType::GeoTargeting => "Geo Targeting",
            LeverType::AssetGroup => "Asset Group",
            LeverType::Keyword => "Keyword",
            LeverType::BidAdjustment => "Bid Adjustment",
        }
    }
}

impl fmt::Display for LeverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeverType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        LeverType::ALL
            .iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| {
                let valid: Vec<&str> = LeverType::ALL.iter().map(|t| t.as_str()).collect();
                format!("Unknown lever type '{}'. Valid types: {}", s, valid.join(", "))
            })
    }
}

/// Old or new value of a lever: a number ($50, 120) or free text ("Denver Metro")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LeverValue {
    Number(f64),
    Text(String),
}

impl LeverValue {
    /// Parse CLI input, preferring a number when the text is numeric
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => LeverValue::Number(n),
            _ => LeverValue::Text(raw.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            LeverValue::Number(n) => Some(*n),
            LeverValue::Text(_) => None,
        }
    }
}

impl fmt::Display for LeverValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Integral numbers print without a trailing ".0"
            LeverValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            LeverValue::Number(n) => write!(f, "{}", n),
            LeverValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for LeverValue {
    fn from(n: f64) -> Self {
        LeverValue::Number(n)
    }
}

impl From<&str> for LeverValue {
    fn from(s: &str) -> Self {
        LeverValue::Text(s.to_string())
    }
}

impl From<String> for LeverValue {
    fn from(s: String) -> Self {
        LeverValue::Text(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeverStatus {
    Completed,
}

/// A discrete, approved change to a campaign parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeverPull {
    pub change_id: String,
    /// Write time, not the time the change took effect
    pub timestamp: DateTime<Local>,
    pub campaign_id: String,
    pub lever_type: LeverType,
    pub old_value: LeverValue,
    pub new_value: LeverValue,
    /// Human-readable delta from [`compute_change`]
    pub change: String,
    pub reason: String,
    pub impact_note: String,
    pub status: LeverStatus,
}

/// Metrics captured by one snapshot.
/// Bounce rate is in percent and session duration in minutes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetrics {
    pub sessions: u64,
    pub users: u64,
    pub bounce_rate: f64,
    pub session_duration: f64,
    pub roas: f64,
    pub conversion_rate: f64,
    pub cost_per_session: f64,
    pub paid_traffic_ratio: f64,
}

/// A ranked name/value pair (traffic source or page path)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopEntry {
    pub name: String,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySnapshot {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub timestamp: DateTime<Local>,
    pub metrics: SnapshotMetrics,
    pub top_traffic_sources: Vec<TopEntry>,
    pub top_pages: Vec<TopEntry>,
    pub detected_changes: Vec<String>,
}

/// Levers grouped by the Monday-based week they were pulled in
#[derive(Debug, Clone)]
pub struct WeekGroup<'a> {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub levers: Vec<&'a LeverPull>,
}

/// Describe the delta between two lever values.
///
/// Numeric values give a signed percentage (`+50.0%`), or `New: {new}` when
/// the old value is zero. Anything else renders as `{old} → {new}`.
pub fn compute_change(old: &LeverValue, new: &LeverValue) -> String {
    match (old.as_number(), new.as_number()) {
        (Some(o), Some(_)) if o == 0.0 => format!("New: {}", new),
        (Some(o), Some(n)) => format!("{:+.1}%", (n - o) / o * 100.0),
        _ => format!("{} → {}", old, new),
    }
}

/// Monday of the week containing `now`, and the Sunday after it
pub fn week_bounds(now: DateTime<Local>) -> (NaiveDate, NaiveDate) {
    let date = now.date_naive();
    let start = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    (start, start + Duration::days(6))
}

/// `t` moved by `days` (negative goes back), or `None` when the result
/// falls outside the representable calendar
pub fn shift_days(t: DateTime<Local>, days: i64) -> Option<DateTime<Local>> {
    Duration::try_days(days).and_then(|offset| t.checked_add_signed(offset))
}

fn pct_change(current: f64, previous: f64) -> f64 {
    if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    }
}

fn direction(delta: f64) -> &'static str {
    if delta > 0.0 {
        "increased"
    } else {
        "decreased"
    }
}

/// Flag significant moves against the previous snapshot.
///
/// Sessions and users trip at more than 20%, bounce rate at more than 10
/// points and session duration at more than 2 minutes.
pub fn detect_changes(current: &SnapshotMetrics, previous: Option<&WeeklySnapshot>) -> Vec<String> {
    let Some(previous) = previous else {
        return Vec::new();
    };
    let last = &previous.metrics;
    let mut changes = Vec::new();

    let sessions = pct_change(current.sessions as f64, last.sessions as f64);
    if sessions.abs() > 20.0 {
        changes.push(format!("Sessions {} by {:.1}%", direction(sessions), sessions.abs()));
    }

    let users = pct_change(current.users as f64, last.users as f64);
    if users.abs() > 20.0 {
        changes.push(format!("Users {} by {:.1}%", direction(users), users.abs()));
    }

    let bounce = current.bounce_rate - last.bounce_rate;
    if bounce.abs() > 10.0 {
        changes.push(format!(
            "Bounce rate {} by {:.1} points",
            direction(bounce),
            bounce.abs()
        ));
    }

    let duration = current.session_duration - last.session_duration;
    if duration.abs() > 2.0 {
        changes.push(format!(
            "Session duration {} by {:.1} minutes",
            direction(duration),
            duration.abs()
        ));
    }

    changes
}

/// Highest-valued entries first; ties break on name for stable output
fn top_entries(values: &HashMap<String, u64>, limit: usize) -> Vec<TopEntry> {
    let mut entries: Vec<TopEntry> = values
        .iter()
        .map(|(name, value)| TopEntry {
            name: name.clone(),
            value: *value,
        })
        .collect();
    entries.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
    entries.truncate(limit);
    entries
}

/// Persistent lever and snapshot history
#[derive(Debug)]
pub struct ChangeLedger {
    lever_path: PathBuf,
    snapshot_path: PathBuf,
    levers: Vec<LeverPull>,
    snapshots: Vec<WeeklySnapshot>,
    retention: RetentionConfig,
}

impl ChangeLedger {
    /// Open both stores under `dir`. Missing files start empty.
    pub fn open<P: AsRef<Path>>(dir: P, retention: RetentionConfig) -> Result<Self> {
        let dir = dir.as_ref();
        let lever_path = dir.join(LEVER_FILE);
        let snapshot_path = dir.join(SNAPSHOT_FILE);
        let levers = store::load_or_default(&lever_path)?;
        let snapshots = store::load_or_default(&snapshot_path)?;

        Ok(Self {
            lever_path,
            snapshot_path,
            levers,
            snapshots,
            retention,
        })
    }

    /// Every retained lever pull, oldest first
    pub fn levers(&self) -> &[LeverPull] {
        &self.levers
    }

    /// Every retained snapshot, oldest first
    pub fn snapshots(&self) -> &[WeeklySnapshot] {
        &self.snapshots
    }

    pub fn retention(&self) -> &RetentionConfig {
        &self.retention
    }

    /// Record a lever pull stamped with the current time
    pub fn record_lever(
        &mut self,
        lever_type: LeverType,
        old_value: LeverValue,
        new_value: LeverValue,
        campaign_id: &str,
        reason: &str,
        impact_note: &str,
    ) -> Result<LeverPull> {
        self.record_lever_at(
            Local::now(),
            lever_type,
            old_value,
            new_value,
            campaign_id,
            reason,
            impact_note,
        )
    }

    /// Record a lever pull at `now`, then drop everything older than the
    /// retention window and persist.
    pub fn record_lever_at(
        &mut self,
        now: DateTime<Local>,
        lever_type: LeverType,
        old_value: LeverValue,
        new_value: LeverValue,
        campaign_id: &str,
        reason: &str,
        impact_note: &str,
    ) -> Result<LeverPull> {
        let lever = LeverPull {
            change_id: Uuid::new_v4().to_string(),
            timestamp: now,
            campaign_id: campaign_id.to_string(),
            lever_type,
            change: compute_change(&old_value, &new_value),
            old_value,
            new_value,
            reason: reason.to_string(),
            impact_note: impact_note.to_string(),
            status: LeverStatus::Completed,
        };

        self.levers.push(lever.clone());

        let before = self.levers.len();
        if let Some(cutoff) = shift_days(now, self.retention.lever_days.saturating_neg()) {
            self.levers.retain(|record| record.timestamp > cutoff);
        }
        let pruned = before - self.levers.len();

        store::save(&self.lever_path, "lever history", &self.levers)?;
        tracing::info!(
            campaign = %lever.campaign_id,
            lever_type = %lever.lever_type,
            change = %lever.change,
            pruned,
            "lever pull recorded"
        );
        Ok(lever)
    }

    /// Levers pulled within the last `days` days
    pub fn get_recent(&self, days: i64) -> Vec<&LeverPull> {
        self.get_recent_at(Local::now(), days)
    }

    pub fn get_recent_at(&self, now: DateTime<Local>, days: i64) -> Vec<&LeverPull> {
        match shift_days(now, days.saturating_neg()) {
            Some(cutoff) => self.levers.iter().filter(|l| l.timestamp > cutoff).collect(),
            None if days < 0 => Vec::new(),
            // Window reaches past the start of the calendar
            None => self.levers.iter().collect(),
        }
    }

    /// Most recent pull on `campaign_id`, optionally of one lever type
    pub fn last_pull(&self, campaign_id: &str, lever_type: Option<LeverType>) -> Option<&LeverPull> {
        self.levers
            .iter()
            .filter(|l| l.campaign_id == campaign_id)
            .filter(|l| match lever_type {
                Some(t) => l.lever_type == t,
                None => true,
            })
            .max_by_key(|l| l.timestamp)
    }

    pub fn get_by_type(&self, lever_type: LeverType) -> Vec<&LeverPull> {
        self.levers
            .iter()
            .filter(|l| l.lever_type == lever_type)
            .collect()
    }

    /// Recent levers grouped by week, newest week first
    pub fn levers_by_week_at(&self, now: DateTime<Local>) -> Vec<WeekGroup<'_>> {
        let mut groups: Vec<WeekGroup<'_>> = Vec::new();
        for lever in self.get_recent_at(now, self.retention.lever_days) {
            let (week_start, week_end) = week_bounds(lever.timestamp);
            match groups.iter_mut().find(|g| g.week_start == week_start) {
                Some(group) => group.levers.push(lever),
                None => groups.push(WeekGroup {
                    week_start,
                    week_end,
                    levers: vec![lever],
                }),
            }
        }
        groups.sort_by(|a, b| b.week_start.cmp(&a.week_start));
        groups
    }

    /// Most recent snapshots, capped at the retention limit
    pub fn rolling_snapshots(&self) -> &[WeeklySnapshot] {
        let skip = self
            .snapshots
            .len()
            .saturating_sub(self.retention.snapshot_limit);
        &self.snapshots[skip..]
    }

    /// Record this week's snapshot stamped with the current time
    pub fn record_weekly_snapshot(
        &mut self,
        analytics: &AnalyticsReport,
        ads: &CampaignSummary,
        unified: &UnifiedMetrics,
    ) -> Result<WeeklySnapshot> {
        self.record_weekly_snapshot_at(Local::now(), analytics, ads, unified)
    }

    /// Build a snapshot at `now`, compare it against the previous one, append
    /// it and keep only the newest `snapshot_limit` entries.
    pub fn record_weekly_snapshot_at(
        &mut self,
        now: DateTime<Local>,
        analytics: &AnalyticsReport,
        ads: &CampaignSummary,
        unified: &UnifiedMetrics,
    ) -> Result<WeeklySnapshot> {
        let (week_start, week_end) = week_bounds(now);
        let summary = &analytics.summary;

        let metrics = SnapshotMetrics {
            sessions: summary.total_sessions,
            users: summary.total_users,
            bounce_rate: summary.avg_bounce_rate * 100.0,
            session_duration: summary.avg_session_duration / 60.0,
            roas: unified.roas,
            conversion_rate: unified.conversion_rate,
            cost_per_session: unified.cost_per_session,
            paid_traffic_ratio: unified.paid_traffic_ratio,
        };

        let snapshot = WeeklySnapshot {
            week_start,
            week_end,
            timestamp: now,
            detected_changes: detect_changes(&metrics, self.snapshots.last()),
            metrics,
            top_traffic_sources: top_entries(&analytics.traffic_sources, TOP_N),
            top_pages: top_entries(&analytics.top_pages, TOP_N),
        };

        self.snapshots.push(snapshot.clone());
        let excess = self
            .snapshots
            .len()
            .saturating_sub(self.retention.snapshot_limit);
        self.snapshots.drain(..excess);

        store::save(&self.snapshot_path, "change history", &self.snapshots)?;
        tracing::info!(
            week_start = %snapshot.week_start,
            sessions = snapshot.metrics.sessions,
            spend = ads.spend,
            changes = snapshot.detected_changes.len(),
            "weekly snapshot recorded"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::AnalyticsSummary;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn open(dir: &TempDir) -> ChangeLedger {
        ChangeLedger::open(dir.path(), RetentionConfig::default()).unwrap()
    }

    fn analytics(sessions: u64, users: u64, bounce: f64, duration_secs: f64) -> AnalyticsReport {
        AnalyticsReport {
            summary: AnalyticsSummary {
                total_sessions: sessions,
                total_users: users,
                avg_bounce_rate: bounce,
                avg_session_duration: duration_secs,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn metrics(sessions: u64, users: u64, bounce_rate: f64, session_duration: f64) -> SnapshotMetrics {
        SnapshotMetrics {
            sessions,
            users,
            bounce_rate,
            session_duration,
            ..Default::default()
        }
    }

    fn snapshot_with(metrics: SnapshotMetrics) -> WeeklySnapshot {
        let now = at(2025, 9, 1, 12);
        let (week_start, week_end) = week_bounds(now);
        WeeklySnapshot {
            week_start,
            week_end,
            timestamp: now,
            metrics,
            top_traffic_sources: Vec::new(),
            top_pages: Vec::new(),
            detected_changes: Vec::new(),
        }
    }

    #[test]
    fn test_compute_change() {
        assert_eq!(compute_change(&0.0.into(), &50.0.into()), "New: 50");
        assert_eq!(compute_change(&50.0.into(), &75.0.into()), "+50.0%");
        assert_eq!(compute_change(&80.0.into(), &60.0.into()), "-25.0%");
        assert_eq!(compute_change(&"A".into(), &"B".into()), "A → B");
        assert_eq!(compute_change(&40.0.into(), &"None".into()), "40 → None");
    }

    #[test]
    fn test_lever_value_parse_and_json() {
        assert_eq!(LeverValue::parse("50"), LeverValue::Number(50.0));
        assert_eq!(LeverValue::parse("$50/day"), LeverValue::Text("$50/day".to_string()));

        let json = serde_json::to_string(&vec![LeverValue::Number(12.5), "Denver".into()]).unwrap();
        assert_eq!(json, r#"[12.5,"Denver"]"#);
        let back: Vec<LeverValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back[1], LeverValue::Text("Denver".to_string()));
    }

    #[test]
    fn test_lever_type_spellings() {
        assert_eq!("tcpa".parse::<LeverType>().unwrap(), LeverType::Tcpa);
        assert_eq!("geo_targeting".parse::<LeverType>().unwrap(), LeverType::GeoTargeting);
        assert!("frequency_cap".parse::<LeverType>().is_err());
        assert_eq!(serde_json::to_string(&LeverType::Tcpa).unwrap(), r#""tCPA""#);
    }

    #[test]
    fn test_recorded_lever_is_recent_and_persisted() {
        let dir = TempDir::new().unwrap();
        let mut ledger = open(&dir);
        let lever = ledger
            .record_lever(LeverType::Budget, 40.0.into(), 50.0.into(), "L.R - PMax - General", "strong week", "")
            .unwrap();

        assert_eq!(lever.change, "+25.0%");
        assert!(ledger.get_recent(28).iter().any(|l| l.change_id == lever.change_id));

        let reopened = open(&dir);
        assert_eq!(reopened.levers(), &[lever]);
    }

    #[test]
    fn test_backdated_lever_pruned_on_next_write() {
        let dir = TempDir::new().unwrap();
        let mut ledger = open(&dir);
        let now = at(2025, 9, 30, 9);

        let old = ledger
            .record_lever_at(now - Duration::days(30), LeverType::Tcpa, "None".into(), 120.0.into(), "c1", "", "")
            .unwrap();
        assert_eq!(ledger.levers().len(), 1);

        ledger
            .record_lever_at(now, LeverType::Budget, 50.0.into(), 55.0.into(), "c1", "", "")
            .unwrap();
        assert_eq!(ledger.levers().len(), 1);
        assert!(ledger.levers().iter().all(|l| l.change_id != old.change_id));
        assert_eq!(open(&dir).levers().len(), 1);
    }

    #[test]
    fn test_get_recent_and_by_type() {
        let dir = TempDir::new().unwrap();
        let mut ledger = open(&dir);
        let now = at(2025, 9, 30, 9);

        ledger
            .record_lever_at(now - Duration::days(10), LeverType::Budget, 40.0.into(), 45.0.into(), "c1", "", "")
            .unwrap();
        ledger
            .record_lever_at(now - Duration::days(2), LeverType::GeoTargeting, "Denver".into(), "Denver + Boulder".into(), "c1", "", "")
            .unwrap();
        ledger
            .record_lever_at(now, LeverType::Budget, 45.0.into(), 50.0.into(), "c2", "", "")
            .unwrap();

        assert_eq!(ledger.get_recent_at(now, 7).len(), 2);
        assert_eq!(ledger.get_recent_at(now, 28).len(), 3);
        assert_eq!(ledger.get_by_type(LeverType::Budget).len(), 2);
        assert!(ledger.get_by_type(LeverType::Keyword).is_empty());
    }

    #[test]
    fn test_unbounded_windows_do_not_overflow() {
        let dir = TempDir::new().unwrap();
        let retention = RetentionConfig {
            lever_days: i64::MAX,
            ..RetentionConfig::default()
        };
        let mut ledger = ChangeLedger::open(dir.path(), retention).unwrap();
        let now = at(2025, 9, 30, 9);

        ledger
            .record_lever_at(now - Duration::days(400), LeverType::Budget, 40.0.into(), 45.0.into(), "c1", "", "")
            .unwrap();
        ledger
            .record_lever_at(now, LeverType::Budget, 45.0.into(), 50.0.into(), "c1", "", "")
            .unwrap();

        assert_eq!(ledger.levers().len(), 2);
        assert_eq!(ledger.get_recent_at(now, i64::MAX).len(), 2);
        assert_eq!(ledger.get_recent_at(now, i64::MIN).len(), 0);
        assert_eq!(ledger.levers_by_week_at(now).len(), 2);
        assert!(shift_days(now, i64::MAX).is_none());
        assert_eq!(shift_days(now, -1), Some(now - Duration::days(1)));
    }

    #[test]
    fn test_last_pull_by_campaign_and_type() {
        let dir = TempDir::new().unwrap();
        let mut ledger = open(&dir);
        let now = at(2025, 9, 30, 9);

        ledger
            .record_lever_at(now - Duration::days(9), LeverType::Tcpa, 100.0.into(), 110.0.into(), "c1", "", "")
            .unwrap();
        ledger
            .record_lever_at(now - Duration::days(3), LeverType::Budget, 40.0.into(), 45.0.into(), "c1", "", "")
            .unwrap();
        ledger
            .record_lever_at(now, LeverType::Tcpa, 90.0.into(), 95.0.into(), "c2", "", "")
            .unwrap();

        let last = ledger.last_pull("c1", None).unwrap();
        assert_eq!(last.lever_type, LeverType::Budget);
        let tcpa = ledger.last_pull("c1", Some(LeverType::Tcpa)).unwrap();
        assert_eq!(tcpa.timestamp, now - Duration::days(9));
        assert!(ledger.last_pull("c1", Some(LeverType::Keyword)).is_none());
        assert!(ledger.last_pull("c3", None).is_none());
    }

    #[test]
    fn test_levers_by_week() {
        let dir = TempDir::new().unwrap();
        let mut ledger = open(&dir);
        // Tuesday 2025-09-30
        let now = at(2025, 9, 30, 9);

        ledger
            .record_lever_at(at(2025, 9, 22, 9), LeverType::Budget, 40.0.into(), 45.0.into(), "c1", "", "")
            .unwrap();
        ledger
            .record_lever_at(at(2025, 9, 24, 9), LeverType::Keyword, "a".into(), "b".into(), "c1", "", "")
            .unwrap();
        ledger
            .record_lever_at(now, LeverType::Budget, 45.0.into(), 50.0.into(), "c1", "", "")
            .unwrap();

        let weeks = ledger.levers_by_week_at(now);
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].week_start, NaiveDate::from_ymd_opt(2025, 9, 29).unwrap());
        assert_eq!(weeks[0].levers.len(), 1);
        assert_eq!(weeks[1].week_start, NaiveDate::from_ymd_opt(2025, 9, 22).unwrap());
        assert_eq!(weeks[1].week_end, NaiveDate::from_ymd_opt(2025, 9, 28).unwrap());
        assert_eq!(weeks[1].levers.len(), 2);
    }

    #[test]
    fn test_week_bounds_start_on_monday() {
        // Sunday 2025-09-07 belongs to the week of Monday 2025-09-01
        let (start, end) = week_bounds(at(2025, 9, 7, 23));
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 9, 7).unwrap());
    }

    #[test]
    fn test_snapshot_store_keeps_last_four() {
        let dir = TempDir::new().unwrap();
        let mut ledger = open(&dir);
        let ads = CampaignSummary::default();
        let unified = UnifiedMetrics::default();

        for i in 0..5u64 {
            ledger
                .record_weekly_snapshot_at(at(2025, 9, 1, 8) + Duration::days(i as i64), &analytics(100 + i, 50, 0.5, 120.0), &ads, &unified)
                .unwrap();
        }

        let sessions: Vec<u64> = ledger.snapshots().iter().map(|s| s.metrics.sessions).collect();
        assert_eq!(sessions, vec![101, 102, 103, 104]);
        assert_eq!(open(&dir).snapshots().len(), 4);
        assert_eq!(ledger.rolling_snapshots().len(), 4);
    }

    #[test]
    fn test_snapshot_units_and_top_entries() {
        let dir = TempDir::new().unwrap();
        let mut ledger = open(&dir);

        let mut report = analytics(200, 150, 0.42, 150.0);
        report.traffic_sources = [("google / cpc", 90), ("google / organic", 60), ("(direct) / (none)", 30), ("bing / organic", 5)]
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        report.top_pages = [("/", 300), ("/buyers/", 120)]
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();

        let snapshot = ledger
            .record_weekly_snapshot_at(at(2025, 9, 3, 8), &report, &CampaignSummary::default(), &UnifiedMetrics::default())
            .unwrap();

        assert!((snapshot.metrics.bounce_rate - 42.0).abs() < 1e-9);
        assert!((snapshot.metrics.session_duration - 2.5).abs() < 1e-9);
        let sources: Vec<&str> = snapshot.top_traffic_sources.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(sources, vec!["google / cpc", "google / organic", "(direct) / (none)"]);
        assert_eq!(snapshot.top_pages.len(), 2);
        assert!(snapshot.detected_changes.is_empty());
    }

    #[test]
    fn test_detect_changes_thresholds() {
        let previous = snapshot_with(metrics(100, 100, 40.0, 3.0));

        let changes = detect_changes(&metrics(125, 110, 52.0, 0.5), Some(&previous));
        assert_eq!(
            changes,
            vec![
                "Sessions increased by 25.0%".to_string(),
                "Bounce rate increased by 12.0 points".to_string(),
                "Session duration decreased by 2.5 minutes".to_string(),
            ]
        );

        let quiet = detect_changes(&metrics(115, 85, 45.0, 4.5), Some(&previous));
        assert!(quiet.is_empty());
        assert!(detect_changes(&metrics(1, 1, 0.0, 0.0), None).is_empty());
    }

    #[test]
    fn test_detect_changes_ignores_zero_baseline() {
        let previous = snapshot_with(metrics(0, 0, 40.0, 3.0));
        assert!(detect_changes(&metrics(500, 400, 40.0, 3.0), Some(&previous)).is_empty());
    }
}
