//! Budget enforcement.
//!
//! Spend is tracked per budget day and per month in USD. The budget day
//! starts at the policy's `reset_hour` UTC, and the month of a spend is the
//! month of its budget day. Limits are read from the live cost control policy
//! on every call.
//!
//! An accepted spend returns a [`BudgetCharge`] naming the periods it landed
//! in. Refunds and late adjustments go through the charge, so a request that
//! settles after a period boundary never touches the new period's totals.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use gateway_config::{CostControlPolicy, SharedPolicy};
use gateway_core::{Clock, SystemClock};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a spend was refused
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum BudgetRejection {
    /// Single request over the per-request cap
    #[error("request cost ${amount:.4} exceeds per-request limit ${limit:.2}")]
    PerRequestLimit {
        /// Requested amount
        amount: f64,
        /// Cap
        limit: f64,
    },

    /// Daily cap would be exceeded
    #[error("daily budget exceeded: ${spent:.4} spent + ${amount:.4} requested > ${limit:.2}")]
    DailyLimit {
        /// Already spent today
        spent: f64,
        /// Requested amount
        amount: f64,
        /// Cap
        limit: f64,
    },

    /// Monthly cap would be exceeded
    #[error("monthly budget exceeded: ${spent:.4} spent + ${amount:.4} requested > ${limit:.2}")]
    MonthlyLimit {
        /// Already spent this month
        spent: f64,
        /// Requested amount
        amount: f64,
        /// Cap
        limit: f64,
    },
}

impl BudgetRejection {
    /// Short label, used as a metric dimension
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::PerRequestLimit { .. } => "per_request",
            Self::DailyLimit { .. } => "daily",
            Self::MonthlyLimit { .. } => "monthly",
        }
    }
}

/// Budget period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPeriod {
    /// Current budget day
    Daily,
    /// Current month
    Monthly,
    /// Both
    All,
}

impl BudgetPeriod {
    /// Period name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Monthly => "monthly",
            Self::All => "all",
        }
    }
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BudgetPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" | "day" => Ok(Self::Daily),
            "monthly" | "month" => Ok(Self::Monthly),
            "all" => Ok(Self::All),
            other => Err(format!("unknown budget period '{other}'")),
        }
    }
}

/// Spend in the current periods
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Spending {
    /// Current budget day
    pub daily: f64,
    /// Current month
    pub monthly: f64,
}

/// Configured caps
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetLimits {
    /// Whether the caps are enforced
    pub enabled: bool,
    /// Daily cap
    pub daily: f64,
    /// Monthly cap
    pub monthly: f64,
    /// Per-request cap
    pub per_request: f64,
}

/// A spend accepted by [`BudgetTracker::record_spending`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetCharge {
    /// Amount written to the ledger; zero when nothing was recorded
    pub amount: f64,
    /// Budget day the amount was charged to
    pub day: NaiveDate,
    /// Month the amount was charged to
    pub month: String,
}

/// Budget day containing `now` for a day starting at `reset_hour` UTC
#[must_use]
pub fn budget_day(now: DateTime<Utc>, reset_hour: u32) -> NaiveDate {
    let date = now.date_naive();
    if now.hour() < reset_hour {
        date.pred_opt().unwrap_or(date)
    } else {
        date
    }
}

/// `YYYY-MM` of a budget day
#[must_use]
pub fn month_key(day: NaiveDate) -> String {
    format!("{:04}-{:02}", day.year(), day.month())
}

#[derive(Debug, Default)]
struct BudgetLedger {
    daily: HashMap<NaiveDate, f64>,
    monthly: HashMap<String, f64>,
    current_day: Option<NaiveDate>,
    last_reset: Option<DateTime<Utc>>,
}

impl BudgetLedger {
    /// Move to the period containing `day`, dropping stale totals
    fn roll(&mut self, day: NaiveDate, month: &str, now: DateTime<Utc>) {
        if self.current_day == Some(day) {
            return;
        }
        if let Some(previous) = self.current_day {
            info!(from = %previous, to = %day, "Budget day rolled over");
        }
        self.daily.retain(|d, _| *d == day);
        self.monthly.retain(|m, _| m == month);
        self.current_day = Some(day);
        self.last_reset = Some(now);
    }

    /// Subtract from one period pair, flooring at zero; missing periods are
    /// already gone and are left alone
    fn subtract(&mut self, day: NaiveDate, month: &str, amount: f64) {
        if let Some(daily) = self.daily.get_mut(&day) {
            *daily = (*daily - amount).max(0.0);
        }
        if let Some(monthly) = self.monthly.get_mut(month) {
            *monthly = (*monthly - amount).max(0.0);
        }
    }

    fn spending(&self, day: NaiveDate, month: &str) -> Spending {
        Spending {
            daily: self.daily.get(&day).copied().unwrap_or(0.0),
            monthly: self.monthly.get(month).copied().unwrap_or(0.0),
        }
    }
}

/// Tracks spend against the policy's caps
#[derive(Debug)]
pub struct BudgetTracker {
    policy: SharedPolicy<CostControlPolicy>,
    clock: Arc<dyn Clock>,
    ledger: Mutex<BudgetLedger>,
}

impl BudgetTracker {
    /// Create a tracker on the system clock
    #[must_use]
    pub fn new(policy: SharedPolicy<CostControlPolicy>) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    /// Create a tracker with an explicit clock
    #[must_use]
    pub fn with_clock(policy: SharedPolicy<CostControlPolicy>, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            ledger: Mutex::new(BudgetLedger::default()),
        }
    }

    /// Period keys for the current time
    fn periods(&self, reset_hour: u32) -> (DateTime<Utc>, NaiveDate, String) {
        let now = self.clock.now();
        let day = budget_day(now, reset_hour);
        let month = month_key(day);
        (now, day, month)
    }

    /// Authorize and record a spend.
    ///
    /// Disabled budgets and non-positive amounts are always allowed and come
    /// back as a zero charge. Only an accepted spend changes the ledger.
    ///
    /// # Errors
    /// Returns the first cap the spend would break: per-request, then daily,
    /// then monthly.
    pub fn record_spending(&self, amount: f64) -> Result<BudgetCharge, BudgetRejection> {
        let budget = self.policy.load().budget;
        if !budget.enabled || amount.is_nan() || amount <= 0.0 {
            let (_, day, month) = self.periods(budget.reset_hour);
            return Ok(BudgetCharge {
                amount: 0.0,
                day,
                month,
            });
        }

        if amount > budget.per_request_limit {
            let rejection = BudgetRejection::PerRequestLimit {
                amount,
                limit: budget.per_request_limit,
            };
            warn!(amount, limit = budget.per_request_limit, "Budget rejected request");
            return Err(rejection);
        }

        let (now, day, month) = self.periods(budget.reset_hour);
        let mut ledger = self.ledger.lock();
        ledger.roll(day, &month, now);
        let spent = ledger.spending(day, &month);

        if spent.daily + amount > budget.daily_limit {
            warn!(spent = spent.daily, amount, limit = budget.daily_limit, "Daily budget exhausted");
            return Err(BudgetRejection::DailyLimit {
                spent: spent.daily,
                amount,
                limit: budget.daily_limit,
            });
        }
        if spent.monthly + amount > budget.monthly_limit {
            warn!(spent = spent.monthly, amount, limit = budget.monthly_limit, "Monthly budget exhausted");
            return Err(BudgetRejection::MonthlyLimit {
                spent: spent.monthly,
                amount,
                limit: budget.monthly_limit,
            });
        }

        *ledger.daily.entry(day).or_insert(0.0) += amount;
        *ledger.monthly.entry(month.clone()).or_insert(0.0) += amount;
        debug!(amount, daily = spent.daily + amount, "Recorded spend");
        Ok(BudgetCharge { amount, day, month })
    }

    /// Return part of `charge` to the periods it was charged to.
    ///
    /// Totals never go below zero. Periods that have since rolled over are
    /// gone and absorb nothing.
    pub fn refund(&self, charge: &BudgetCharge, amount: f64) {
        if amount.is_nan() || amount <= 0.0 || charge.amount <= 0.0 {
            return;
        }

        let reset_hour = self.policy.load().budget.reset_hour;
        let (now, day, month) = self.periods(reset_hour);
        let mut ledger = self.ledger.lock();
        ledger.roll(day, &month, now);
        ledger.subtract(charge.day, &charge.month, amount);
        debug!(amount, day = %charge.day, month = %charge.month, "Refunded spend");
    }

    /// Charge `amount` on top of an earlier `charge`.
    ///
    /// The amount lands in whichever of the charge's periods are still
    /// current, and only those periods' caps are checked.
    ///
    /// # Errors
    /// Returns the first cap the extra would break, leaving the ledger
    /// untouched.
    pub fn record_additional(&self, charge: &BudgetCharge, amount: f64) -> Result<(), BudgetRejection> {
        let budget = self.policy.load().budget;
        if !budget.enabled || amount.is_nan() || amount <= 0.0 {
            return Ok(());
        }
        if amount > budget.per_request_limit {
            warn!(amount, limit = budget.per_request_limit, "Budget rejected additional spend");
            return Err(BudgetRejection::PerRequestLimit {
                amount,
                limit: budget.per_request_limit,
            });
        }

        let (now, day, month) = self.periods(budget.reset_hour);
        let mut ledger = self.ledger.lock();
        ledger.roll(day, &month, now);
        let spent = ledger.spending(day, &month);
        let same_day = charge.day == day;
        let same_month = charge.month == month;

        if same_day && spent.daily + amount > budget.daily_limit {
            return Err(BudgetRejection::DailyLimit {
                spent: spent.daily,
                amount,
                limit: budget.daily_limit,
            });
        }
        if same_month && spent.monthly + amount > budget.monthly_limit {
            return Err(BudgetRejection::MonthlyLimit {
                spent: spent.monthly,
                amount,
                limit: budget.monthly_limit,
            });
        }

        if same_day {
            *ledger.daily.entry(day).or_insert(0.0) += amount;
        }
        if same_month {
            *ledger.monthly.entry(month).or_insert(0.0) += amount;
        }
        debug!(amount, same_day, same_month, "Recorded additional spend");
        Ok(())
    }

    /// Spend in the current periods
    #[must_use]
    pub fn current_spending(&self) -> Spending {
        let reset_hour = self.policy.load().budget.reset_hour;
        let (now, day, month) = self.periods(reset_hour);
        let mut ledger = self.ledger.lock();
        ledger.roll(day, &month, now);
        ledger.spending(day, &month)
    }

    /// Caps from the current policy
    #[must_use]
    pub fn limits(&self) -> BudgetLimits {
        let budget = self.policy.load().budget;
        BudgetLimits {
            enabled: budget.enabled,
            daily: budget.daily_limit,
            monthly: budget.monthly_limit,
            per_request: budget.per_request_limit,
        }
    }

    /// When the ledger last moved to a new period
    #[must_use]
    pub fn last_reset(&self) -> Option<DateTime<Utc>> {
        self.ledger.lock().last_reset
    }

    /// Zero the current period's totals
    pub fn reset(&self, period: BudgetPeriod) {
        let reset_hour = self.policy.load().budget.reset_hour;
        let (now, day, month) = self.periods(reset_hour);
        let mut ledger = self.ledger.lock();
        ledger.roll(day, &month, now);
        if matches!(period, BudgetPeriod::Daily | BudgetPeriod::All) {
            ledger.daily.remove(&day);
        }
        if matches!(period, BudgetPeriod::Monthly | BudgetPeriod::All) {
            ledger.monthly.remove(&month);
        }
        ledger.last_reset = Some(now);
        info!(period = %period, "Budget reset");
    }
}
