//! Collaborator interfaces for the ads and analytics platforms
//!
//! The vendor clients live outside this crate. They are handed in as
//! explicit references so nothing here depends on a process-wide client.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Traffic source key whose sessions count as paid traffic
pub const PAID_SOURCE: &str = "google / cpc";

/// Campaign totals over a reporting window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignSummary {
    #[serde(default)]
    pub spend: f64,
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub impressions: u64,
    #[serde(default)]
    pub conversions: f64,
    #[serde(default)]
    pub cpc: f64,
    #[serde(default)]
    pub ctr: f64,
}

/// Site analytics totals over a reporting window.
/// `avg_bounce_rate` is a fraction and `avg_session_duration` is in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    #[serde(default)]
    pub total_sessions: u64,
    #[serde(default)]
    pub total_users: u64,
    #[serde(default)]
    pub total_page_views: u64,
    #[serde(default)]
    pub avg_bounce_rate: f64,
    #[serde(default)]
    pub avg_session_duration: f64,
    #[serde(default)]
    pub total_goals: u64,
}

/// Everything a weekly snapshot needs from analytics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    #[serde(default)]
    pub summary: AnalyticsSummary,
    /// Sessions keyed by "source / medium"
    #[serde(default)]
    pub traffic_sources: HashMap<String, u64>,
    /// Page views keyed by path
    #[serde(default)]
    pub top_pages: HashMap<String, u64>,
}

/// Cross-platform ratios derived from both summaries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedMetrics {
    #[serde(default)]
    pub roas: f64,
    #[serde(default)]
    pub conversion_rate: f64,
    #[serde(default)]
    pub cost_per_session: f64,
    #[serde(default)]
    pub paid_traffic_ratio: f64,
    #[serde(default)]
    pub goal_completion_rate: f64,
}

/// One collection run: the inputs to `ChangeLedger::record_weekly_snapshot`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectedData {
    #[serde(default)]
    pub ads: CampaignSummary,
    #[serde(default)]
    pub analytics: AnalyticsReport,
    #[serde(default)]
    pub unified: UnifiedMetrics,
}

pub trait AdsMetricsProvider {
    fn campaign_summary(&self, days: u32) -> Result<CampaignSummary>;
}

pub trait AnalyticsProvider {
    fn summary(&self, days: u32) -> Result<AnalyticsSummary>;
    fn traffic_sources(&self, days: u32) -> Result<HashMap<String, u64>>;
    fn top_pages(&self, days: u32, limit: usize) -> Result<HashMap<String, u64>>;
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Derive unified metrics; every ratio is zero when its divisor is zero
pub fn unified_metrics(ads: &CampaignSummary, analytics: &AnalyticsReport) -> UnifiedMetrics {
    let sessions = analytics.summary.total_sessions as f64;
    let goals = analytics.summary.total_goals as f64;
    let paid = analytics
        .traffic_sources
        .get(PAID_SOURCE)
        .copied()
        .unwrap_or(0) as f64;

    UnifiedMetrics {
        roas: ratio(ads.spend, goals),
        conversion_rate: ratio(ads.conversions, ads.clicks as f64) * 100.0,
        cost_per_session: ratio(ads.spend, sessions),
        paid_traffic_ratio: ratio(paid, sessions) * 100.0,
        goal_completion_rate: ratio(goals, sessions) * 100.0,
    }
}

/// Pull one reporting window from both providers
pub fn collect(
    ads: &dyn AdsMetricsProvider,
    analytics: &dyn AnalyticsProvider,
    days: u32,
    page_limit: usize,
) -> Result<CollectedData> {
    let ads_summary = ads.campaign_summary(days)?;
    let report = AnalyticsReport {
        summary: analytics.summary(days)?,
        traffic_sources: analytics.traffic_sources(days)?,
        top_pages: analytics.top_pages(days, page_limit)?,
    };
    let unified = unified_metrics(&ads_summary, &report);
    tracing::debug!(days, spend = ads_summary.spend, sessions = report.summary.total_sessions, "collected provider data");

    Ok(CollectedData {
        ads: ads_summary,
        analytics: report,
        unified,
    })
}
