//! Gate a proposed lever pull before it is applied
//!
//! Unlike [`crate::cadence`], which only reports, the gate returns a hard
//! approve/deny. Checks run in a fixed order and the first denial wins:
//! stop-loss freeze, one lever per week, then the per-lever rules (range,
//! step size, frequency, conversion floor). An approved change is held for
//! the configured change window before `execute_after`.

use crate::config::{GateLimits, RangeLimits};
use crate::ledger::{ChangeLedger, LeverPull, LeverType, LeverValue};
use crate::validate::{CampaignState, RuleValidator, Verdict};
use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};

/// A lever pull that has not been recorded yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub campaign_id: String,
    pub lever_type: LeverType,
    pub old_value: LeverValue,
    pub new_value: LeverValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub approved: bool,
    /// Why the change was denied, or a single confirmation when approved
    pub reasons: Vec<String>,
    /// Soft-threshold breaches on an approved change
    pub warnings: Vec<String>,
    /// Stop-loss conditions seen on the campaign, denied or not
    pub alerts: Vec<String>,
    /// Largest allowed step toward the requested value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute_after: Option<DateTime<Local>>,
}

impl GateVerdict {
    fn deny(mut self, reason: String) -> Self {
        self.approved = false;
        self.reasons.push(reason);
        self
    }
}

/// Approves or denies lever pulls against the ledger history
pub struct ChangeGate<'a> {
    ledger: &'a ChangeLedger,
    validator: &'a RuleValidator,
}

impl<'a> ChangeGate<'a> {
    pub fn new(ledger: &'a ChangeLedger, validator: &'a RuleValidator) -> Self {
        Self { ledger, validator }
    }

    fn limits(&self) -> &GateLimits {
        &self.validator.config().gates
    }

    pub fn evaluate(&self, request: &ChangeRequest, state: &CampaignState) -> GateVerdict {
        self.evaluate_at(Local::now(), request, state)
    }

    pub fn evaluate_at(
        &self,
        now: DateTime<Local>,
        request: &ChangeRequest,
        state: &CampaignState,
    ) -> GateVerdict {
        let mut verdict = GateVerdict::default();

        if let Some(stop) = self.validator.check_stop_loss(state) {
            verdict.alerts.push(stop.message());
            if stop.freezes_changes() {
                tracing::warn!(campaign = %request.campaign_id, "change denied by stop-loss");
                let reason = format!("Safety stop-loss triggered: {}", stop.message());
                return verdict.deny(reason);
            }
        }

        let cadence_days = self.ledger.retention().cadence_days;
        if let Some(last) = self.ledger.last_pull(&request.campaign_id, None) {
            let days = days_since(now, last);
            if days < cadence_days {
                return verdict.deny(format!(
                    "One lever per week rule: {} changed {} days ago (minimum {} days)",
                    last.lever_type.label(),
                    days,
                    cadence_days
                ));
            }
        }

        let verdict = match request.lever_type {
            LeverType::Budget => self.check_numeric(
                now,
                request,
                verdict,
                &self.validator.config().budget,
                self.limits().budget_frequency_days,
            ),
            LeverType::Tcpa => {
                let floor = self.limits().tcpa_min_conversions;
                if state.total_conversions < floor {
                    return verdict.deny(format!(
                        "Only {} conversions (minimum {})",
                        state.total_conversions, floor
                    ));
                }
                self.check_numeric(
                    now,
                    request,
                    verdict,
                    &self.validator.config().tcpa,
                    self.limits().tcpa_frequency_days,
                )
            }
            LeverType::GeoTargeting => self.check_geo(now, request, verdict),
            LeverType::AssetGroup | LeverType::Keyword | LeverType::BidAdjustment => verdict,
        };

        if !verdict.reasons.is_empty() {
            return verdict;
        }
        self.approve(now, request, verdict)
    }

    /// Range, step size and frequency for budget and tCPA
    fn check_numeric(
        &self,
        now: DateTime<Local>,
        request: &ChangeRequest,
        verdict: GateVerdict,
        limits: &RangeLimits,
        frequency_days: i64,
    ) -> GateVerdict {
        let label = request.lever_type.label();
        let Some(new) = request.new_value.as_number() else {
            return verdict.deny(format!("{} value '{}' is not a number", label, request.new_value));
        };
        let old = request.old_value.as_number().unwrap_or(0.0);

        let range = match request.lever_type {
            LeverType::Tcpa => self.validator.validate_tcpa(0.0, new),
            _ => self.validator.validate_budget(0.0, new),
        };
        let Verdict { missing, warnings, .. } = range;
        if let Some(reason) = missing.into_iter().next() {
            return verdict.deny(reason);
        }

        if old > 0.0 {
            let step = ((new - old) / old * 100.0).abs();
            if step > limits.max_step_percent {
                let mut verdict = verdict.deny(format!(
                    "{} adjustment {:.1}% exceeds maximum {:.0}%",
                    label, step, limits.max_step_percent
                ));
                verdict.suggested_value = Some(clamp_step(old, new, limits));
                return verdict;
            }
        }

        if let Some(last) = self.ledger.last_pull(&request.campaign_id, Some(request.lever_type)) {
            let days = days_since(now, last);
            if days < frequency_days {
                return verdict.deny(format!(
                    "{} changed {} days ago (minimum {} days)",
                    label, days, frequency_days
                ));
            }
        }

        GateVerdict { warnings, ..verdict }
    }

    fn check_geo(&self, now: DateTime<Local>, request: &ChangeRequest, verdict: GateVerdict) -> GateVerdict {
        let limits = self.limits();
        let recent: Vec<&LeverPull> = self
            .ledger
            .get_recent_at(now, limits.geo_period_days)
            .into_iter()
            .filter(|l| l.campaign_id == request.campaign_id && l.lever_type == LeverType::GeoTargeting)
            .collect();

        if recent.len() >= limits.geo_max_changes {
            return verdict.deny(format!(
                "Geo targeting changed {} time(s) in the last {} days (maximum {})",
                recent.len(),
                limits.geo_period_days,
                limits.geo_max_changes
            ));
        }
        verdict
    }

    fn approve(&self, now: DateTime<Local>, request: &ChangeRequest, mut verdict: GateVerdict) -> GateVerdict {
        let hold = Duration::try_hours(self.limits().change_window_hours)
            .and_then(|window| now.checked_add_signed(window))
            .unwrap_or(now);

        verdict.approved = true;
        verdict.execute_after = Some(hold);
        verdict.reasons.push(format!(
            "{} change meets all guardrail requirements",
            request.lever_type.label()
        ));
        tracing::info!(
            campaign = %request.campaign_id,
            lever_type = %request.lever_type,
            execute_after = %hold,
            "change approved"
        );
        verdict
    }
}

/// Whole days since `lever`; a pull stamped in the future counts as today
fn days_since(now: DateTime<Local>, lever: &LeverPull) -> i64 {
    now.signed_duration_since(lever.timestamp).num_days().max(0)
}

/// Move from `old` toward `new` by at most the allowed step, kept in range
fn clamp_step(old: f64, new: f64, limits: &RangeLimits) -> f64 {
    let step = old * limits.max_step_percent / 100.0;
    let stepped = if new > old { old + step } else { old - step };
    stepped.clamp(limits.min, limits.max)
}
