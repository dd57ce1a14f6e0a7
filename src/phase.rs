//! Campaign phase progression
//!
//! A campaign moves from learning (phase 1) to tCPA bidding (phase 2) to
//! scaling (phase 3). Eligibility is judged on primary conversions only;
//! a conversion mapping that counts anything else fails before any gate
//! is looked at.

use crate::config::{PhaseRequirements, PhaseTimeline};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Initial setup and learning
    #[serde(rename = "phase_1")]
    Learning,
    /// tCPA introduced
    #[serde(rename = "phase_2")]
    Tcpa,
    /// Scaling and optimization
    #[serde(rename = "phase_3")]
    Scaling,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Learning => "phase_1",
            Phase::Tcpa => "phase_2",
            Phase::Scaling => "phase_3",
        }
    }

    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::Learning => Some(Phase::Tcpa),
            Phase::Tcpa => Some(Phase::Scaling),
            Phase::Scaling => None,
        }
    }

    /// Default timeline for this phase
    pub fn timeline(&self, requirements: &PhaseRequirements) -> PhaseTimeline {
        match self {
            Phase::Learning => requirements.phase_1,
            Phase::Tcpa => requirements.phase_2,
            Phase::Scaling => requirements.phase_3,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "phase_1" | "phase1" | "1" => Ok(Phase::Learning),
            "phase_2" | "phase2" | "2" => Ok(Phase::Tcpa),
            "phase_3" | "phase3" | "3" => Ok(Phase::Scaling),
            _ => Err(format!(
                "Unknown phase '{}'. Valid phases: phase_1, phase_2, phase_3",
                s
            )),
        }
    }
}

/// Campaign figures the phase gates look at
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseMetrics {
    /// Conversion actions marked primary in the ads account
    pub primary_conversions: Vec<String>,
    pub secondary_conversions: Vec<String>,
    pub primary_conversions_count: u32,
    /// Reported only; never counts toward a gate
    pub secondary_conversions_count: u32,
    pub campaign_age_days: u32,
    pub cpl_7d: f64,
    pub cpl_30d: f64,
    pub days_since_last_change: u32,
    pub days_under_tcpa: u32,
    pub current_cpl: f64,
    /// Share of leads tagged serious, in percent
    pub lead_quality_percent: f64,
    /// Spend as a fraction of budget
    pub current_pacing: f64,
}

impl PhaseMetrics {
    /// Gap between 7-day and 30-day CPL, in percent. Zero without a baseline.
    pub fn cpl_variation(&self) -> f64 {
        if self.cpl_30d == 0.0 {
            return 0.0;
        }
        ((self.cpl_7d - self.cpl_30d) / self.cpl_30d * 100.0).abs()
    }

    /// 7-day CPL has not risen more than `limit` percent over the 30-day CPL
    fn cpl_not_rising(&self, limit: f64) -> bool {
        if self.cpl_30d == 0.0 {
            return true;
        }
        (self.cpl_7d - self.cpl_30d) / self.cpl_30d * 100.0 <= limit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressionPath {
    Standard,
    /// Slow accounts that are old and steady enough
    TimeBased,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Eligibility {
    pub phase: Phase,
    pub eligible_for_next: bool,
    pub recommended_action: String,
    pub conversion_hygiene_ok: bool,
    pub blocking_factors: Vec<String>,
    /// Set when a phase 1 campaign is eligible
    pub progression_path: Option<ProgressionPath>,
    /// Phase 3 only
    pub optimization_opportunities: Vec<String>,
}

impl Eligibility {
    fn new(phase: Phase) -> Self {
        Self {
            phase,
            eligible_for_next: false,
            recommended_action: String::new(),
            conversion_hygiene_ok: true,
            blocking_factors: Vec::new(),
            progression_path: None,
            optimization_opportunities: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub days_in_phase: i64,
    /// Past the expected duration plus grace
    pub lagging: bool,
    /// Past the maximum duration
    pub lag_alert: bool,
    pub message: String,
}

/// Judges phase eligibility and timeline progress
#[derive(Debug, Clone, Default)]
pub struct PhaseManager {
    requirements: PhaseRequirements,
}

impl PhaseManager {
    pub fn new(requirements: PhaseRequirements) -> Self {
        Self { requirements }
    }

    pub fn check_eligibility(&self, metrics: &PhaseMetrics, phase: Phase) -> Eligibility {
        if let Err(reason) = self.check_conversion_hygiene(metrics) {
            let mut result = Eligibility::new(phase);
            result.conversion_hygiene_ok = false;
            result.recommended_action = format!("Fix conversion mapping: {}", reason);
            result.blocking_factors.push(reason);
            return result;
        }

        match phase {
            Phase::Learning => self.learning_to_tcpa(metrics),
            Phase::Tcpa => self.tcpa_to_scaling(metrics),
            Phase::Scaling => self.scaling_status(metrics),
        }
    }

    /// Only the allowed actions may be primary, and at least one must be
    fn check_conversion_hygiene(&self, metrics: &PhaseMetrics) -> Result<(), String> {
        let allowed = &self.requirements.allowed_primary_conversions;
        let invalid: Vec<&str> = metrics
            .primary_conversions
            .iter()
            .filter(|c| !allowed.contains(c))
            .map(String::as_str)
            .collect();

        if !invalid.is_empty() {
            return Err(format!(
                "Invalid primary conversions: {}. Only {} can be Primary.",
                invalid.join(", "),
                allowed.join(", ")
            ));
        }
        if !allowed.is_empty() && !allowed.iter().any(|a| metrics.primary_conversions.contains(a)) {
            return Err(format!("{} must be marked as Primary conversion.", allowed.join(" or ")));
        }
        Ok(())
    }

    fn learning_to_tcpa(&self, m: &PhaseMetrics) -> Eligibility {
        let req = &self.requirements;
        let mut result = Eligibility::new(Phase::Learning);
        let variation = m.cpl_variation();
        let steady = m.cpl_not_rising(req.cpl_stability_percent);

        let enough_conversions = m.primary_conversions_count >= req.min_conversions;
        let old_enough = m.campaign_age_days >= req.min_days;
        let cpl_stable = variation <= req.cpl_stability_percent;
        let quiet = m.days_since_last_change >= req.no_changes_days;
        let standard = enough_conversions && old_enough && cpl_stable && quiet;

        let time_age = m.campaign_age_days >= req.time_based_min_age_days;
        let time_conversions = m.primary_conversions_count >= req.time_based_min_conversions;
        let time_based = time_age && time_conversions && steady;

        if !standard {
            if !enough_conversions {
                result.blocking_factors.push(format!(
                    "Insufficient primary conversions: {}/{}",
                    m.primary_conversions_count, req.min_conversions
                ));
            }
            if !old_enough {
                result.blocking_factors.push(format!(
                    "Campaign too new: {}/{} days",
                    m.campaign_age_days, req.min_days
                ));
            }
            if !cpl_stable {
                result.blocking_factors.push(format!(
                    "CPL unstable: {:.1}% variation (max {}%)",
                    variation, req.cpl_stability_percent
                ));
            }
            if !quiet {
                result.blocking_factors.push(format!(
                    "Recent changes detected: {} days ago (min {} days)",
                    m.days_since_last_change, req.no_changes_days
                ));
            }
        }
        if !time_based {
            if !time_age {
                result.blocking_factors.push(format!(
                    "Time-based: campaign too new: {}/{} days",
                    m.campaign_age_days, req.time_based_min_age_days
                ));
            }
            if !time_conversions {
                result.blocking_factors.push(format!(
                    "Time-based: insufficient conversions: {}/{}",
                    m.primary_conversions_count, req.time_based_min_conversions
                ));
            }
            if !steady {
                result
                    .blocking_factors
                    .push("Time-based: performance not stable enough".to_string());
            }
        }

        result.eligible_for_next = standard || time_based;
        result.recommended_action = if standard {
            result.progression_path = Some(ProgressionPath::Standard);
            "Safe to introduce tCPA at $100-$150 (standard progression)".to_string()
        } else if time_based {
            result.progression_path = Some(ProgressionPath::TimeBased);
            "Safe to introduce tCPA at $100-$150 (time-based progression)".to_string()
        } else {
            "Continue Phase 1 optimization - address blocking factors".to_string()
        };
        result
    }

    fn tcpa_to_scaling(&self, m: &PhaseMetrics) -> Eligibility {
        let req = &self.requirements;
        let mut result = Eligibility::new(Phase::Tcpa);

        if m.days_under_tcpa < req.min_tcpa_days {
            result.blocking_factors.push(format!(
                "Insufficient tCPA time: {}/{} days",
                m.days_under_tcpa, req.min_tcpa_days
            ));
        }
        if m.current_cpl < req.cpl_min {
            result.blocking_factors.push(format!(
                "CPL too low: ${:.2} (min ${:.2})",
                m.current_cpl, req.cpl_min
            ));
        } else if m.current_cpl > req.cpl_max {
            result.blocking_factors.push(format!(
                "CPL too high: ${:.2} (max ${:.2})",
                m.current_cpl, req.cpl_max
            ));
        }
        if m.lead_quality_percent < req.lead_quality_percent {
            result.blocking_factors.push(format!(
                "Low lead quality: {:.1}% (min {}% of leads tagged as 'serious')",
                m.lead_quality_percent, req.lead_quality_percent
            ));
        }
        if m.current_pacing < req.pacing_threshold {
            result.blocking_factors.push(format!(
                "Pacing constrained: {:.1}% (min {:.1}%)",
                m.current_pacing * 100.0,
                req.pacing_threshold * 100.0
            ));
        }

        result.eligible_for_next = result.blocking_factors.is_empty();
        result.recommended_action = if result.eligible_for_next {
            "Safe to scale budget by +20-30%".to_string()
        } else {
            "Continue Phase 2 optimization - address blocking factors".to_string()
        };
        result
    }

    /// Final phase: never eligible, lists what is worth optimizing
    fn scaling_status(&self, m: &PhaseMetrics) -> Eligibility {
        let req = &self.requirements;
        let mut result = Eligibility::new(Phase::Scaling);

        if m.current_cpl > req.cpl_max {
            result
                .optimization_opportunities
                .push("High CPL - consider tCPA adjustment".to_string());
        }
        if m.current_pacing < req.pacing_threshold {
            result
                .optimization_opportunities
                .push("Pacing constrained - consider budget increase".to_string());
        }
        if m.lead_quality_percent < req.lead_quality_percent {
            result
                .optimization_opportunities
                .push("Low lead quality - review targeting".to_string());
        }

        result.recommended_action = "Phase 3 optimization - focus on efficiency and scale".to_string();
        if !result.optimization_opportunities.is_empty() {
            result.recommended_action = format!(
                "{} | Opportunities: {}",
                result.recommended_action,
                result.optimization_opportunities.join(", ")
            );
        }
        result
    }

    /// Where a campaign stands against the phase timeline. `timeline`
    /// overrides the configured one.
    pub fn check_progress(
        &self,
        start: NaiveDate,
        today: NaiveDate,
        eligibility: &Eligibility,
        timeline: Option<PhaseTimeline>,
    ) -> PhaseProgress {
        let timeline = timeline.unwrap_or_else(|| eligibility.phase.timeline(&self.requirements));
        let days = today.signed_duration_since(start).num_days();
        let expected = timeline.expected_days;
        let grace_end = expected.saturating_add(self.requirements.grace_period_days);
        let eligible = eligibility.eligible_for_next;

        let (lagging, lag_alert, message) = if days <= expected {
            let remaining = expected - days;
            let message = if eligible {
                format!("Phase progressing well - eligible for next phase after {} more days", remaining)
            } else {
                format!("Phase progressing normally - {} days remaining to expected completion", remaining)
            };
            (false, false, message)
        } else if days <= grace_end {
            let message = if eligible {
                "Phase slightly behind but eligible for next phase".to_string()
            } else {
                format!(
                    "Phase slightly behind expected timeline ({} days over) - within grace period",
                    days - expected
                )
            };
            (false, false, message)
        } else if days <= timeline.max_days {
            let message = if eligible {
                format!(
                    "Phase lagging but eligible for next phase ({} days behind expected)",
                    days - expected
                )
            } else {
                format!(
                    "Phase lagging - {} days past expected completion. Address blocking factors.",
                    days - expected
                )
            };
            (true, false, message)
        } else {
            let over = days - timeline.max_days;
            let message = if eligible {
                format!(
                    "CRITICAL: Phase exceeded maximum duration ({} days over max) but eligible for next phase. Proceed immediately.",
                    over
                )
            } else if eligibility.blocking_factors.is_empty() {
                format!(
                    "CRITICAL: Phase exceeded maximum duration by {} days! Immediate action required.",
                    over
                )
            } else {
                format!(
                    "CRITICAL: Phase exceeded maximum duration by {} days! Blocking factors: {}. Immediate action required.",
                    over,
                    eligibility.blocking_factors.join(", ")
                )
            };
            tracing::warn!(phase = %eligibility.phase, days, max_days = timeline.max_days, "phase over maximum duration");
            (true, true, message)
        };

        PhaseProgress {
            days_in_phase: days,
            lagging,
            lag_alert,
            message,
        }
    }
}
