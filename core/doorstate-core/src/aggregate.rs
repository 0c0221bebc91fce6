//! Open-time aggregation over opening periods.
//!
//! Periods are stored as UTC epoch seconds; this module is the only place
//! that converts them to wall-clock time, in a caller-chosen timezone.
//! Day and week labels come from the local wall clock, but credited
//! durations are always differences between instants, so a
//! daylight-saving shift never inflates or shrinks a total. Both
//! aggregations treat a still-open period as ending at the
//! caller-supplied `now`.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use chrono_tz::Tz;

use crate::door::OpeningPeriod;

/// Open time attributed to one local calendar day, as fractional hours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DaySegment {
    pub date: NaiveDate,
    pub start_hour: f64,
    pub end_hour: f64,
}

/// Splits periods into per-day segments of fractional hours.
///
/// An hour fraction is `hour + minute / 60`; seconds are ignored. A period
/// that stays within one local calendar day yields a single segment. A
/// period that crosses midnight yields exactly two: the tail of the start
/// day up to 24.0 and the head of the end day from 0.0. Spans covering
/// more than one midnight still yield only those two segments; the days in
/// between are not credited.
pub fn open_segments_by_day(periods: &[OpeningPeriod], now: i64, tz: Tz) -> Vec<DaySegment> {
    let mut segments = Vec::new();
    for period in periods {
        let end_ts = period.end_or(now);
        if end_ts <= period.opened {
            continue;
        }
        let start = match to_local(period.opened, tz) {
            Some(dt) => dt,
            None => continue,
        };
        let end = match to_local(end_ts, tz) {
            Some(dt) => dt,
            None => continue,
        };

        let start_hour = hour_fraction(&start);
        let end_hour = hour_fraction(&end);
        if start.date() == end.date() {
            segments.push(DaySegment {
                date: start.date(),
                start_hour,
                end_hour,
            });
        } else {
            segments.push(DaySegment {
                date: start.date(),
                start_hour,
                end_hour: 24.0,
            });
            segments.push(DaySegment {
                date: end.date(),
                start_hour: 0.0,
                end_hour,
            });
        }
    }
    segments
}

/// Sums open time into calendar-week buckets, keyed by the local Monday
/// the week starts on, in fractional hours.
///
/// Each period is swept forward through week boundaries: the slice up to
/// the next local Monday 00:00 is credited to the current bucket, then
/// the cursor advances. Slices are measured between instants, not wall
/// readings, so the buckets of a week containing a daylight-saving shift
/// still sum to the period's true duration. The sweep is bounded by the
/// period length, so long spans terminate without recursion.
pub fn open_hours_by_week(
    periods: &[OpeningPeriod],
    now: i64,
    tz: Tz,
) -> BTreeMap<NaiveDate, f64> {
    let mut seconds: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for period in periods {
        let end = period.end_or(now);
        if end <= period.opened {
            continue;
        }

        let mut cursor = period.opened;
        while cursor < end {
            let local = match to_local(cursor, tz) {
                Some(dt) => dt,
                None => break,
            };
            let bucket = week_start(local);
            let slice_end = match instant_of(bucket + Duration::days(7), tz) {
                Some(next) if next < end => next,
                _ => end,
            };
            if slice_end <= cursor {
                // A zone transition sitting exactly on the boundary would
                // stall the sweep; credit the rest here and stop.
                *seconds.entry(bucket.date()).or_insert(0) += end - cursor;
                break;
            }
            *seconds.entry(bucket.date()).or_insert(0) += slice_end - cursor;
            cursor = slice_end;
        }
    }
    seconds
        .into_iter()
        .map(|(week, total)| (week, total as f64 / 3600.0))
        .collect()
}

fn to_local(timestamp: i64, tz: Tz) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(timestamp, 0).map(|utc| utc.with_timezone(&tz).naive_local())
}

/// Instant at which the local wall clock reads `local`. A reading inside
/// a spring-forward gap resolves to the end of the gap; an ambiguous
/// fall-back reading resolves to its first occurrence.
fn instant_of(local: NaiveDateTime, tz: Tz) -> Option<i64> {
    for shift in 0..=3 {
        let candidate = local + Duration::hours(shift);
        if let Some(instant) = tz.from_local_datetime(&candidate).earliest() {
            return Some(instant.timestamp());
        }
    }
    None
}

fn hour_fraction(local: &NaiveDateTime) -> f64 {
    local.hour() as f64 + local.minute() as f64 / 60.0
}

/// Most recent Monday 00:00 at or before `local`.
fn week_start(local: NaiveDateTime) -> NaiveDateTime {
    let monday = local.date() - Duration::days(local.weekday().num_days_from_monday() as i64);
    monday.and_time(NaiveTime::MIN)
}
