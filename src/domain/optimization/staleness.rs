//! Go/no-go check run at the start of every cycle.
//!
//! The gate only looks at timestamps: how old the candle snapshot behind the
//! active record is, whether a record exists at all, and whether the operator
//! forced a run.

use super::cycle_outcome::TriggerReason;
use chrono::{DateTime, Duration, Utc};

/// What is known about the data behind the active record.
#[derive(Debug, Clone, PartialEq)]
pub enum Freshness {
    /// No active record for the key yet.
    ColdStart,
    Known {
        last_data_at: DateTime<Utc>,
        last_evaluated_at: Option<DateTime<Utc>>,
    },
    /// The freshness source could not be read.
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StalenessDecision {
    Run(TriggerReason),
    Skip {
        data_age: Duration,
        evaluated_ago: Option<Duration>,
    },
    DataUnknown(String),
}

impl StalenessDecision {
    pub fn should_run(&self) -> bool {
        matches!(self, StalenessDecision::Run(_))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CandleDataGate {
    stale_threshold: Duration,
}

impl CandleDataGate {
    pub fn new(stale_threshold: Duration) -> Self {
        Self { stale_threshold }
    }

    pub fn stale_threshold(&self) -> Duration {
        self.stale_threshold
    }

    /// Force wins over everything, including an unreadable freshness source.
    pub fn evaluate(&self, now: DateTime<Utc>, freshness: &Freshness, force: bool) -> StalenessDecision {
        if force {
            return StalenessDecision::Run(TriggerReason::Forced);
        }

        match freshness {
            Freshness::ColdStart => StalenessDecision::Run(TriggerReason::ColdStart),
            Freshness::Unavailable(reason) => StalenessDecision::DataUnknown(reason.clone()),
            Freshness::Known {
                last_data_at,
                last_evaluated_at,
            } => {
                // Clock skew can put the snapshot in the future; treat that as brand new.
                let data_age = (now - *last_data_at).max(Duration::zero());
                if data_age >= self.stale_threshold {
                    StalenessDecision::Run(TriggerReason::StaleData)
                } else {
                    StalenessDecision::Skip {
                        data_age,
                        evaluated_ago: last_evaluated_at.map(|at| (now - at).max(Duration::zero())),
                    }
                }
            }
        }
    }

    /// Boolean form of [`CandleDataGate::evaluate`]. `None` for the data
    /// timestamp means cold start.
    pub fn should_reoptimize(
        &self,
        now: DateTime<Utc>,
        last_data_at: Option<DateTime<Utc>>,
        last_evaluated_at: Option<DateTime<Utc>>,
        force: bool,
    ) -> bool {
        let freshness = match last_data_at {
            Some(last_data_at) => Freshness::Known {
                last_data_at,
                last_evaluated_at,
            },
            None => Freshness::ColdStart,
        };
        self.evaluate(now, &freshness, force).should_run()
    }
}
