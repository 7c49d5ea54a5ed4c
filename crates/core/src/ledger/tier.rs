//! Pay-config tiers and the daily spending window.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::error::LedgerError;

/// A score band mapping to fee rate, score accrual rate and daily limit.
///
/// Bands are half-open: `[min_score, max_score)`, with `None` meaning unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayTier {
    /// Tier level, for display.
    pub level: i16,
    /// Inclusive lower score bound.
    pub min_score: i64,
    /// Exclusive upper score bound.
    pub max_score: Option<i64>,
    /// Maximum daily spend for payers in this tier.
    pub daily_limit: Option<Decimal>,
    /// Fee withheld from payees in this tier.
    pub fee_rate: Decimal,
    /// Score accrued per unit received by payees in this tier.
    pub score_rate: Decimal,
}

impl PayTier {
    /// Returns true if `score` falls in this band.
    #[must_use]
    pub fn contains(&self, score: i64) -> bool {
        score >= self.min_score && self.max_score.is_none_or(|max| score < max)
    }

    /// Daily limit, if one is actually enforced.
    ///
    /// A zero or negative limit means unlimited and must not take the limit lock.
    #[must_use]
    pub fn enforced_daily_limit(&self) -> Option<Decimal> {
        self.daily_limit.filter(|limit| *limit > Decimal::ZERO)
    }
}

/// Picks the tier covering `score`.
///
/// # Errors
///
/// Returns `LedgerError::PayConfigNotFound` if no band covers the score.
pub fn select_tier(tiers: &[PayTier], score: i64) -> Result<&PayTier, LedgerError> {
    tiers
        .iter()
        .filter(|tier| tier.contains(score))
        .max_by_key(|tier| tier.min_score)
        .ok_or(LedgerError::PayConfigNotFound(score))
}

/// Parses an IANA time zone name.
///
/// # Errors
///
/// Returns `LedgerError::Internal` for an unknown zone.
pub fn parse_timezone(name: &str) -> Result<Tz, LedgerError> {
    name.parse::<Tz>()
        .map_err(|_| LedgerError::Internal(format!("unknown time zone: {name}")))
}

/// The local calendar day a daily limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyWindow {
    /// Local midnight, in UTC.
    pub start: DateTime<Utc>,
    /// Next local midnight, in UTC.
    pub end: DateTime<Utc>,
    /// Local date as `yyyymmdd`.
    pub bucket: u32,
}

impl DailyWindow {
    /// Returns the local day in `tz` that contains `now`.
    #[must_use]
    pub fn containing(now: DateTime<Utc>, tz: Tz) -> Self {
        let date = now.with_timezone(&tz).date_naive();
        let start = local_midnight(date, tz);
        let end = date
            .succ_opt()
            .map_or(start + Duration::days(1), |next| local_midnight(next, tz));
        let year = u32::try_from(date.year()).unwrap_or(0);

        Self {
            start,
            end,
            bucket: year * 10_000 + date.month() * 100 + date.day(),
        }
    }
}

fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .map_or_else(|| naive.and_utc(), |dt| dt.with_timezone(&Utc))
}
