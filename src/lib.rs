//! Leverlog - Change governance for paid-search campaigns
//!
//! Validate a proposed change, check it against the weekly cadence, record
//! it, and later compare the metrics around it.
//!
//! # Overview
//!
//! Every deliberate change to a campaign ("pulling a lever") is checked
//! against business rules, logged with its before/after values, and scored
//! against weekly metric snapshots once enough data exists on both sides.
//! Nothing here talks to the ads or analytics platforms directly; those are
//! collaborator traits in [`providers`].
//!
//! # Components
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `validate` | Budget, tCPA, asset, URL, geo and naming rules |
//! | `ledger` | Lever history and rolling weekly snapshots |
//! | `cadence` | One lever per campaign per week |
//! | `guardrails` | Approve or deny a proposed pull before it is applied |
//! | `phase` | Phase 1 → 2 → 3 eligibility and timeline tracking |
//! | `impact` | Before/after metric comparison around a lever pull |
//! | `interventions` | Manual task backlog |
//! | `providers` | Ads/analytics collaborator traits and unified metrics |
//!
//! # Quick Start
//!
//! ```no_run
//! use leverlog::{CadenceGuard, ChangeLedger, Config, LeverType, RuleValidator};
//!
//! let config = Config::load();
//! let verdict = RuleValidator::new(config.clone()).validate_budget(50.0, 60.0);
//! assert!(verdict.valid);
//!
//! let mut ledger = ChangeLedger::open(leverlog::config::data_dir(), config.retention).unwrap();
//! if !CadenceGuard::new(&ledger).check_cadence("L.R - PMax - General").violated {
//!     ledger
//!         .record_lever(LeverType::Budget, 50.0.into(), 60.0.into(), "L.R - PMax - General", "scale", "")
//!         .unwrap();
//! }
//! ```

pub mod cadence;
pub mod config;
pub mod error;
pub mod guardrails;
pub mod impact;
pub mod interventions;
pub mod ledger;
pub mod phase;
pub mod providers;
pub mod store;
pub mod validate;

pub use cadence::{CadenceGuard, CadenceReport};
pub use config::Config;
pub use error::{LedgerError, Result};
pub use guardrails::{ChangeGate, ChangeRequest, GateVerdict};
pub use impact::{analyze_and_save, Direction, ImpactAnalysis, ImpactEstimator, Metric, MetricImpact, Significance};
pub use interventions::{InterventionItem, InterventionQueue, InterventionStatus, Priority};
pub use ledger::{
    compute_change, detect_changes, week_bounds, ChangeLedger, LeverPull, LeverStatus, LeverType,
    LeverValue, SnapshotMetrics, WeeklySnapshot,
};
pub use phase::{Eligibility, Phase, PhaseManager, PhaseMetrics, PhaseProgress, ProgressionPath};
pub use providers::{
    collect, unified_metrics, AdsMetricsProvider, AnalyticsProvider, AnalyticsReport, CampaignSummary,
    CollectedData, UnifiedMetrics,
};
pub use validate::{CampaignConfig, CampaignState, RuleValidator, StopLoss, StructureReport, Verdict};
