//! Daily capture quota.
//!
//! The window is the calendar day of the clock passed in, from local
//! midnight to the next local midnight, so counts reset at the midnight
//! boundary of that clock.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Result of a daily quota check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuotaStatus {
    pub can_capture: bool,
    pub count: u32,
    pub limit: u32,
}

impl QuotaStatus {
    pub fn evaluate(count: u32, limit: u32) -> Self {
        Self {
            can_capture: count < limit,
            count,
            limit,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.count)
    }
}

/// Half-open UTC window `[start, end)` covering the calendar day of `now`
/// in `now`'s own time zone.
pub fn day_window<Tz: TimeZone>(now: &DateTime<Tz>) -> (DateTime<Utc>, DateTime<Utc>) {
    let tz = now.timezone();
    let today = now.date_naive();
    let start = local_midnight(&tz, today).unwrap_or_else(|| now.with_timezone(&Utc));
    let end = today
        .succ_opt()
        .and_then(|tomorrow| local_midnight(&tz, tomorrow))
        .unwrap_or_else(|| start + Duration::days(1));
    (start, end)
}

// Midnight can be skipped by a DST transition; take the earliest valid
// instant of that day in that case.
fn local_midnight<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> Option<DateTime<Utc>> {
    (0..24).find_map(|hour| {
        let naive = day.and_hms_opt(hour, 0, 0)?;
        tz.from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    })
}
