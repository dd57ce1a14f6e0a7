//! One lever per campaign per week
//!
//! Advisory: a violation is reported, never enforced. Whoever applies the
//! change decides whether to proceed.

use crate::ledger::{ChangeLedger, LeverPull};
use chrono::{DateTime, Local};

/// Result of a cadence check for one campaign
#[derive(Debug, Clone)]
pub struct CadenceReport<'a> {
    pub violated: bool,
    pub count: usize,
    pub levers: Vec<&'a LeverPull>,
    pub message: String,
}

pub struct CadenceGuard<'a> {
    ledger: &'a ChangeLedger,
    window_days: i64,
}

impl<'a> CadenceGuard<'a> {
    /// Guard over `ledger` using its configured cadence window
    pub fn new(ledger: &'a ChangeLedger) -> Self {
        Self {
            ledger,
            window_days: ledger.retention().cadence_days,
        }
    }

    pub fn with_window(ledger: &'a ChangeLedger, window_days: i64) -> Self {
        Self { ledger, window_days }
    }

    pub fn check_cadence(&self, campaign_id: &str) -> CadenceReport<'a> {
        self.check_cadence_at(Local::now(), campaign_id)
    }

    pub fn check_cadence_at(&self, now: DateTime<Local>, campaign_id: &str) -> CadenceReport<'a> {
        let ledger: &'a ChangeLedger = self.ledger;
        let levers: Vec<&'a LeverPull> = ledger
            .get_recent_at(now, self.window_days)
            .into_iter()
            .filter(|l| l.campaign_id == campaign_id)
            .collect();
        let count = levers.len();
        let violated = count > 1;

        let message = if violated {
            tracing::warn!(campaign = campaign_id, count, "cadence violated");
            format!(
                "Multiple levers ({}) pulled in last {} days",
                count, self.window_days
            )
        } else {
            "One lever per week rule followed".to_string()
        };

        CadenceReport {
            violated,
            count,
            levers,
            message,
        }
    }
}
