//! Provider implementation for db-rest, which serves HAFAS data as FPTF JSON.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta};
use chrono_tz::Tz;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use abfahrten_core::{
    CanonicalDeparture, DepartureQuery, DeparturePort, FeedAdapter, MalformedRecord, Normalizer,
    PortError, ProviderId, ProviderMeta, ProviderPlugin, StopRef, line_number,
};

/// Public db-rest instance.
pub const DEFAULT_BASE_URL: &str = "https://v6.db.transport.rest";

/// Departure as returned by `/stops/{id}/departures`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FptfDeparture {
    /// Trip id.
    pub trip_id: Option<String>,
    /// Stop the departure is reported for.
    pub stop: Option<FptfStop>,
    /// Realtime departure when known, otherwise planned; `null` when cancelled.
    pub when: Option<String>,
    /// Planned departure.
    pub planned_when: Option<String>,
    /// Delay in seconds; `null` when no realtime data exists.
    pub delay: Option<i64>,
    /// Realtime platform.
    pub platform: Option<String>,
    /// Planned platform.
    pub planned_platform: Option<String>,
    /// Destination text.
    pub direction: Option<String>,
    /// Line served.
    pub line: Option<FptfLine>,
    /// Cancelled at this stop.
    #[serde(default)]
    pub cancelled: bool,
}

/// Stop or station object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FptfStop {
    /// Stop id.
    pub id: Option<String>,
    /// Stop name.
    pub name: Option<String>,
}

/// Line object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FptfLine {
    /// Display label such as `STR 3`.
    pub name: Option<String>,
}

/// db-rest v6 wraps departures in an object, older versions return a bare list.
///
/// Entries stay untyped here and are decoded one by one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DeparturesBody {
    Wrapped { departures: Vec<Value> },
    Bare(Vec<Value>),
}

impl DeparturesBody {
    fn into_departures(self) -> Vec<Result<FptfDeparture, MalformedRecord>> {
        let (DeparturesBody::Wrapped { departures } | DeparturesBody::Bare(departures)) = self;
        departures
            .into_iter()
            .map(|value| {
                serde_json::from_value(value)
                    .map_err(|err| MalformedRecord::Undecodable(err.to_string()))
            })
            .collect()
    }
}

/// Entry of `/locations`.
#[derive(Debug, Deserialize)]
struct FptfLocation {
    #[serde(rename = "type")]
    kind: Option<String>,
    id: Option<String>,
    name: Option<String>,
}

/// Feed adapter for FPTF departures.
#[derive(Debug, Clone)]
pub struct FptfAdapter {
    normalizer: Arc<Normalizer>,
    timezone: Tz,
}

impl FptfAdapter {
    /// Adapter normalizing labels with `normalizer`, expressing times in `timezone`.
    #[must_use]
    pub fn new(normalizer: Arc<Normalizer>, timezone: Tz) -> Self {
        Self {
            normalizer,
            timezone,
        }
    }

    fn parse_time(
        &self,
        field: &'static str,
        value: Option<&str>,
    ) -> Result<Option<DateTime<Tz>>, MalformedRecord> {
        value
            .map(|value| {
                DateTime::parse_from_rfc3339(value)
                    .map(|instant| instant.with_timezone(&self.timezone))
                    .map_err(|_err| MalformedRecord::InvalidTime {
                        field,
                        value: value.to_owned(),
                    })
            })
            .transpose()
    }
}

impl FeedAdapter for FptfAdapter {
    type Raw = FptfDeparture;

    fn normalize(&self, raw: &FptfDeparture) -> Result<CanonicalDeparture, MalformedRecord> {
        let label = raw
            .line
            .as_ref()
            .and_then(|line| line.name.as_deref())
            .ok_or(MalformedRecord::MissingField("line.name"))?;
        let number = line_number(label)?;

        let when = self.parse_time("when", raw.when.as_deref())?;
        let planned = self.parse_time("plannedWhen", raw.planned_when.as_deref())?;
        let invalid_delay = || MalformedRecord::InvalidTime {
            field: "delay",
            value: raw.delay.map(|seconds| seconds.to_string()).unwrap_or_default(),
        };
        let delay = raw
            .delay
            .map(|seconds| TimeDelta::try_seconds(seconds).ok_or_else(invalid_delay))
            .transpose()?;

        // Older servers omit plannedWhen and only report when plus delay.
        let scheduled_time = match (planned, when, delay) {
            (Some(planned), _, _) => planned,
            (None, Some(when), Some(delay)) => {
                when.checked_sub_signed(delay).ok_or_else(invalid_delay)?
            }
            (None, Some(when), None) => when,
            (None, None, _) => return Err(MalformedRecord::MissingField("plannedWhen")),
        };
        let realtime_time = match (delay, when) {
            (None, _) => None,
            (Some(_), Some(when)) => Some(when),
            (Some(delay), None) => Some(
                scheduled_time
                    .checked_add_signed(delay)
                    .ok_or_else(invalid_delay)?,
            ),
        };

        let platform = raw
            .platform
            .clone()
            .or_else(|| raw.planned_platform.clone());
        let stop_name = raw
            .stop
            .as_ref()
            .and_then(|stop| stop.name.as_deref())
            .unwrap_or_default();

        Ok(CanonicalDeparture {
            stop_name: self.normalizer.place(stop_name),
            platform,
            line: self.normalizer.line(label),
            line_number: number,
            direction: self
                .normalizer
                .place(raw.direction.as_deref().unwrap_or_default()),
            scheduled_time,
            realtime_time,
            cancelled: raw.cancelled,
        })
    }
}

/// Departure feed backed by a db-rest instance.
pub struct DbRestPort {
    client: Client,
    base_url: String,
    adapter: FptfAdapter,
    meta: ProviderMeta,
}

impl DbRestPort {
    /// Create a port for the instance at `base_url`.
    #[must_use]
    pub fn new(client: Client, base_url: &str, normalizer: Arc<Normalizer>, timezone: Tz) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            adapter: FptfAdapter::new(normalizer, timezone),
            meta: provider_meta(),
        }
    }
}

#[async_trait]
impl DeparturePort for DbRestPort {
    fn provider(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn resolve_stop(&self, query: &str) -> Result<StopRef, PortError> {
        let query = query.trim();
        if !query.is_empty() && query.chars().all(|ch| ch.is_ascii_digit()) {
            return Ok(StopRef {
                id: query.to_owned(),
                name: query.to_owned(),
            });
        }

        let req = self
            .client
            .get(format!("{}/locations", self.base_url))
            .query(&[
                ("query", query),
                ("results", "1"),
                ("stops", "true"),
                ("addresses", "false"),
                ("poi", "false"),
            ]);

        let locations = fetch_json::<Vec<FptfLocation>>(req).await?;

        locations
            .into_iter()
            .filter(|location| {
                matches!(location.kind.as_deref(), Some("stop" | "station") | None)
            })
            .find_map(|location| {
                let id = location.id?;
                Some(StopRef {
                    name: location.name.unwrap_or_else(|| id.clone()),
                    id,
                })
            })
            .ok_or_else(|| PortError::StopNotFound(query.to_owned()))
    }

    async fn departures(
        &self,
        stop: &StopRef,
        query: &DepartureQuery,
    ) -> Result<Vec<CanonicalDeparture>, PortError> {
        let when = query.reference_time.fixed_offset().to_rfc3339();
        let duration = query.lookahead_minutes().to_string();
        let results = query.max_results.to_string();
        debug!(provider = %self.meta.id, stop = %stop.id, %when, "requesting departures");

        let req = self
            .client
            .get(format!("{}/stops/{}/departures", self.base_url, stop.id))
            .query(&[
                ("when", when.as_str()),
                ("duration", duration.as_str()),
                ("results", results.as_str()),
                ("remarks", "false"),
                ("language", "de"),
            ]);

        let body = fetch_json::<DeparturesBody>(req).await?;

        Ok(self.adapter.normalize_decoded(body.into_departures()))
    }
}

/// Build the plugin bundle for the db-rest provider.
#[must_use]
pub fn plugin(
    client: Client,
    normalizer: Arc<Normalizer>,
    timezone: Tz,
    base_url: Option<&str>,
) -> ProviderPlugin {
    let port = DbRestPort::new(
        client,
        base_url.unwrap_or(DEFAULT_BASE_URL),
        normalizer,
        timezone,
    );
    ProviderPlugin::new(Arc::new(port))
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta {
        id: ProviderId(String::from("dbrest")),
        name: String::from("Deutsche Bahn (db-rest)"),
    }
}

// Small helper to fetch and decode JSON with status handling.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, PortError> {
    req.send()
        .await
        .map_err(PortError::from)?
        .error_for_status()
        .map_err(PortError::from)?
        .json()
        .await
        .map_err(PortError::from)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono_tz::Europe::Berlin;

    use super::*;

    const DEPARTURES: &str = r#"{
        "departures": [
            {
                "tripId": "1|1|0|80|6052024",
                "stop": {"type": "stop", "id": "25000350", "name": "Bahnstrift, Hannover"},
                "when": "2024-05-06T14:33:10+02:00",
                "plannedWhen": "2024-05-06T14:32:00+02:00",
                "delay": 70,
                "platform": null,
                "plannedPlatform": "1",
                "direction": "Hannover/Alte Heide",
                "line": {"type": "line", "id": "str-3", "name": "STR 3", "productName": "STR"}
            },
            {
                "tripId": "1|2|0|80|6052024",
                "stop": {"type": "stop", "id": "25000350", "name": "Bahnstrift, Hannover"},
                "when": null,
                "plannedWhen": "2024-05-06T14:40:00+02:00",
                "delay": null,
                "direction": "Lahe (Hannover)",
                "line": {"type": "line", "id": "bus-135", "name": "Bus 135"},
                "cancelled": true
            },
            {
                "tripId": "1|3|0|80|6052024",
                "stop": {"type": "stop", "id": "25000350", "name": "Bahnstrift, Hannover"},
                "when": "2024-05-06T14:45:00+02:00",
                "plannedWhen": "2024-05-06T14:45:00+02:00",
                "delay": null,
                "direction": "Wettbergen",
                "line": {"type": "line", "id": "sev", "name": "Ersatzverkehr"}
            }
        ],
        "realtimeDataUpdatedAt": 1714998700
    }"#;

    fn adapter() -> FptfAdapter {
        FptfAdapter::new(Arc::new(Normalizer::default()), Berlin)
    }

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Tz> {
        Berlin
            .with_ymd_and_hms(2024, 5, 6, hour, minute, second)
            .unwrap()
    }

    #[test]
    fn departures_fixture_normalizes() {
        let body: DeparturesBody = serde_json::from_str(DEPARTURES).unwrap();
        let records = body.into_departures();
        assert_eq!(records.len(), 3);

        let departures = adapter().normalize_decoded(records);

        assert_eq!(departures.len(), 2);

        let tram = &departures[0];
        assert_eq!(tram.stop_name, "Bahnstrift");
        assert_eq!(tram.line, "3");
        assert_eq!(tram.direction, "Alte Heide");
        assert_eq!(tram.platform.as_deref(), Some("1"));
        assert_eq!(tram.scheduled_time, at(14, 32, 0));
        assert_eq!(tram.realtime_time, Some(at(14, 33, 10)));

        let bus = &departures[1];
        assert_eq!(bus.line, "135");
        assert_eq!(bus.direction, "Lahe");
        assert!(bus.cancelled);
        assert_eq!(bus.realtime_time, None);
    }

    #[test]
    fn bare_list_is_accepted() {
        let body: DeparturesBody = serde_json::from_str("[]").unwrap();

        assert!(body.into_departures().is_empty());
    }

    #[test]
    fn scheduled_time_recovered_from_delay() {
        let raw = FptfDeparture {
            when: Some("2024-05-06T14:35:00+02:00".to_owned()),
            delay: Some(180),
            line: Some(FptfLine {
                name: Some("STR 7".to_owned()),
            }),
            ..FptfDeparture::default()
        };

        let departure = adapter().normalize(&raw).unwrap();

        assert_eq!(departure.scheduled_time, at(14, 32, 0));
        assert_eq!(departure.realtime_time, Some(at(14, 35, 0)));
    }

    #[test]
    fn zero_delay_is_realtime_without_visible_delay() {
        let raw = FptfDeparture {
            when: Some("2024-05-06T14:32:00+02:00".to_owned()),
            planned_when: Some("2024-05-06T14:32:00+02:00".to_owned()),
            delay: Some(0),
            line: Some(FptfLine {
                name: Some("Bus 135".to_owned()),
            }),
            ..FptfDeparture::default()
        };

        let departure = adapter().normalize(&raw).unwrap();

        assert_eq!(departure.realtime_time, Some(at(14, 32, 0)));
        assert!(!departure.has_visible_delay());
    }

    #[test]
    fn utc_timestamps_are_converted() {
        let raw = FptfDeparture {
            planned_when: Some("2024-05-06T12:32:00Z".to_owned()),
            line: Some(FptfLine {
                name: Some("STR 3".to_owned()),
            }),
            ..FptfDeparture::default()
        };

        let departure = adapter().normalize(&raw).unwrap();

        assert_eq!(departure.scheduled_time, at(14, 32, 0));
        assert_eq!(departure.scheduled_time.timezone(), Berlin);
    }

    #[test]
    fn record_of_wrong_shape_is_dropped_alone() {
        let body: DeparturesBody = serde_json::from_str(
            r#"[
                {"plannedWhen": "2024-05-06T14:32:00+02:00", "delay": null, "line": {"name": "STR 3"}},
                {"plannedWhen": "2024-05-06T14:36:00+02:00", "delay": "n/a", "line": {"name": "STR 7"}},
                {"plannedWhen": "2024-05-06T14:40:00+02:00", "delay": 120, "line": {"name": "Bus 135"}}
            ]"#,
        )
        .unwrap();

        let records = body.into_departures();
        let departures = adapter().normalize_decoded(records.clone());

        assert!(matches!(records[1], Err(MalformedRecord::Undecodable(_))));
        let lines = departures
            .iter()
            .map(|departure| departure.line.as_str())
            .collect::<Vec<_>>();
        assert_eq!(lines, ["3", "135"]);
        assert_eq!(departures[1].realtime_time, Some(at(14, 42, 0)));
    }

    #[test]
    fn out_of_range_delay_is_malformed() {
        let huge = FptfDeparture {
            planned_when: Some("2024-05-06T14:32:00+02:00".to_owned()),
            delay: Some(i64::MAX),
            line: Some(FptfLine {
                name: Some("STR 3".to_owned()),
            }),
            ..FptfDeparture::default()
        };
        let overflowing = FptfDeparture {
            when: Some("2024-05-06T14:32:00+02:00".to_owned()),
            delay: Some(i64::MAX / 1_000),
            ..huge.clone()
        };
        let fine = FptfDeparture {
            planned_when: Some("2024-05-06T14:40:00+02:00".to_owned()),
            delay: Some(60),
            line: Some(FptfLine {
                name: Some("STR 7".to_owned()),
            }),
            ..FptfDeparture::default()
        };

        assert!(matches!(
            adapter().normalize(&huge),
            Err(MalformedRecord::InvalidTime { field: "delay", .. })
        ));
        assert!(matches!(
            adapter().normalize(&FptfDeparture {
                planned_when: None,
                ..overflowing
            }),
            Err(MalformedRecord::InvalidTime { field: "delay", .. })
        ));

        let departures = adapter().normalize_all(&[huge, fine]);
        assert_eq!(departures.len(), 1);
        assert_eq!(departures[0].line, "7");
    }

    #[test]
    fn missing_times_are_malformed() {
        let raw = FptfDeparture {
            line: Some(FptfLine {
                name: Some("STR 3".to_owned()),
            }),
            ..FptfDeparture::default()
        };

        assert!(matches!(
            adapter().normalize(&raw),
            Err(MalformedRecord::MissingField("plannedWhen"))
        ));
    }

    #[test]
    fn invalid_timestamp_is_malformed() {
        let raw = FptfDeparture {
            planned_when: Some("today 14:32".to_owned()),
            line: Some(FptfLine {
                name: Some("STR 3".to_owned()),
            }),
            ..FptfDeparture::default()
        };

        assert!(matches!(
            adapter().normalize(&raw),
            Err(MalformedRecord::InvalidTime { field: "plannedWhen", .. })
        ));
    }
}
