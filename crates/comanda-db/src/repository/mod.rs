//! # Repository Implementations
//!
//! One repository per aggregate. Repositories hold a pool clone and are
//! cheap to construct; multi-step mutations open their own transaction.

use chrono::{DateTime, NaiveDate, Utc};

pub mod attendance;
pub mod expense;
pub mod order;
pub mod outbox;
pub mod product;
pub mod register;
pub mod report;
pub mod reservation;
pub mod table;

/// UTC instant range covering one calendar day: `[00:00, next 00:00)`.
pub(crate) fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc();
    let end = date
        .succ_opt()
        .expect("date overflow")
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc();
    (start, end)
}
