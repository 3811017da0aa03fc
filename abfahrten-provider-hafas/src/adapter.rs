//! Conversion of station board journeys into canonical departures.

use std::sync::Arc;

use abfahrten_core::{CanonicalDeparture, FeedAdapter, MalformedRecord, Normalizer, line_number};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone};
use chrono_tz::Tz;

use crate::wire::{Journey, StationBoardResult};

const DATE_FORMAT: &str = "%Y%m%d";

/// A journey with its product and location references resolved.
#[derive(Debug, Clone)]
pub struct HafasDeparture {
    /// The raw journey.
    pub journey: Journey,
    /// Product name such as `STR 3`, if the product reference resolved.
    pub line_label: Option<String>,
    /// Name of the stop the journey departs from.
    pub stop_name: Option<String>,
}

/// Decode each journey and resolve the index references of a station board
/// into self-contained records.
pub(crate) fn resolve_records(
    board: StationBoardResult,
    fallback_stop: &str,
) -> Vec<Result<HafasDeparture, MalformedRecord>> {
    let StationBoardResult { common, journeys } = board;

    journeys
        .into_iter()
        .map(|value| {
            let journey = serde_json::from_value::<Journey>(value)
                .map_err(|err| MalformedRecord::Undecodable(err.to_string()))?;
            let line_label = journey
                .product_index
                .and_then(|index| common.products.get(index))
                .and_then(|product| product.name.clone().or_else(|| product.short_name.clone()));
            let stop_name = journey
                .stop
                .location_index
                .and_then(|index| common.locations.get(index))
                .and_then(|location| location.name.clone())
                .or_else(|| Some(fallback_stop.to_owned()));
            Ok(HafasDeparture {
                journey,
                line_label,
                stop_name,
            })
        })
        .collect()
}

/// Feed adapter for HAFAS station boards.
#[derive(Debug, Clone)]
pub struct HafasAdapter {
    normalizer: Arc<Normalizer>,
    timezone: Tz,
}

impl HafasAdapter {
    /// Adapter normalizing labels with `normalizer` and reading wall-clock times in `timezone`.
    #[must_use]
    pub fn new(normalizer: Arc<Normalizer>, timezone: Tz) -> Self {
        Self {
            normalizer,
            timezone,
        }
    }
}

impl FeedAdapter for HafasAdapter {
    type Raw = HafasDeparture;

    fn normalize(&self, raw: &HafasDeparture) -> Result<CanonicalDeparture, MalformedRecord> {
        let journey = &raw.journey;
        let stop = &journey.stop;

        let label = raw
            .line_label
            .as_deref()
            .ok_or(MalformedRecord::MissingField("prodL.name"))?;
        let number = line_number(label)?;

        let date = journey
            .date
            .as_deref()
            .ok_or(MalformedRecord::MissingField("date"))?;
        let date = NaiveDate::parse_from_str(date, DATE_FORMAT).map_err(|_err| {
            MalformedRecord::InvalidTime {
                field: "date",
                value: date.to_owned(),
            }
        })?;

        let scheduled = stop
            .time_scheduled
            .as_deref()
            .ok_or(MalformedRecord::MissingField("dTimeS"))?;
        let scheduled_time =
            parse_time(date, scheduled, "dTimeS", stop.tz_offset, self.timezone)?;
        let realtime_time = stop
            .time_realtime
            .as_deref()
            .map(|realtime| parse_time(date, realtime, "dTimeR", stop.tz_offset, self.timezone))
            .transpose()?;

        let platform = stop
            .platform_realtime
            .as_ref()
            .and_then(|platform| platform.txt.clone())
            .or_else(|| {
                stop.platform_scheduled
                    .as_ref()
                    .and_then(|platform| platform.txt.clone())
            })
            .or_else(|| stop.legacy_platform_realtime.clone())
            .or_else(|| stop.legacy_platform_scheduled.clone());

        Ok(CanonicalDeparture {
            stop_name: self
                .normalizer
                .place(raw.stop_name.as_deref().unwrap_or_default()),
            platform,
            line: self.normalizer.line(label),
            line_number: number,
            direction: self
                .normalizer
                .place(journey.direction.as_deref().unwrap_or_default()),
            scheduled_time,
            realtime_time,
            cancelled: stop.cancelled || journey.cancelled,
        })
    }
}

/// Parse `HHMMSS` or `DDHHMMSS` relative to `date`.
///
/// `tz_offset` (minutes east of UTC) pins the offset when the server sends
/// one; otherwise the time is read as wall-clock time in `timezone`.
fn parse_time(
    date: NaiveDate,
    value: &str,
    field: &'static str,
    tz_offset: Option<i32>,
    timezone: Tz,
) -> Result<DateTime<Tz>, MalformedRecord> {
    let invalid = || MalformedRecord::InvalidTime {
        field,
        value: value.to_owned(),
    };

    if !value.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(invalid());
    }
    let (days, clock) = match value.len() {
        6 => ("0", value),
        8 => value.split_at_checked(2).ok_or_else(invalid)?,
        _ => return Err(invalid()),
    };
    let days = days.parse::<i64>().map_err(|_err| invalid())?;
    let time = NaiveTime::parse_from_str(clock, "%H%M%S").map_err(|_err| invalid())?;
    let local = NaiveDateTime::new(date, time) + TimeDelta::days(days);

    match tz_offset {
        Some(minutes) => minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .and_then(|offset| offset.from_local_datetime(&local).single())
            .map(|instant| instant.with_timezone(&timezone))
            .ok_or_else(|| MalformedRecord::InvalidTime {
                field: "dTZOffset",
                value: minutes.to_string(),
            }),
        None => timezone
            .from_local_datetime(&local)
            .earliest()
            .ok_or(MalformedRecord::NonexistentLocalTime(local, timezone)),
    }
}
