//! Provider implementation for HAFAS mgate backends, preconfigured for GVH Hannover.

mod adapter;
mod profile;
mod wire;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use serde::de::DeserializeOwned;
use tracing::debug;

use abfahrten_core::{
    CanonicalDeparture, DepartureQuery, DeparturePort, FeedAdapter, Normalizer, PortError,
    ProviderId, ProviderMeta, ProviderPlugin, StopRef,
};

pub use adapter::{HafasAdapter, HafasDeparture};
pub use profile::{Auth, ClientInfo, HafasProfile, gvh_products};
pub use wire::{BoardStop, Journey, Platform};

use crate::adapter::resolve_records;
use crate::wire::{
    JourneyFilter, LocMatchInput, LocMatchQuery, LocMatchRequest, LocMatchResult, Location,
    LocationRef,
    MgateRequest, MgateResponse, OK, ServiceRequest, StationBoardRequest, StationBoardResult,
};

/// Prefix of HAFAS location ids (`A=1@O=…@L=…@`).
const LID_PREFIX: &str = "A=";
/// Location type of stations.
const STATION: &str = "S";
/// Candidates requested per stop search; the first station among them wins.
const LOC_MATCH_RESULTS: usize = 5;

/// Departure feed backed by a HAFAS mgate endpoint.
pub struct HafasPort {
    client: Client,
    profile: HafasProfile,
    adapter: HafasAdapter,
    meta: ProviderMeta,
}

impl HafasPort {
    /// Create a port for `profile` bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, profile: HafasProfile, normalizer: Arc<Normalizer>) -> Self {
        let adapter = HafasAdapter::new(normalizer, profile.timezone);
        let meta = ProviderMeta {
            id: ProviderId(profile.id.clone()),
            name: profile.name.clone(),
        };
        Self {
            client,
            profile,
            adapter,
            meta,
        }
    }

    async fn call<T: DeserializeOwned>(&self, request: ServiceRequest<'_>) -> Result<T, PortError> {
        let body = MgateRequest {
            client: &self.profile.client,
            ver: &self.profile.version,
            lang: &self.profile.language,
            auth: &self.profile.auth,
            service_requests: [request],
        };

        let response = self
            .client
            .post(&self.profile.endpoint)
            .header(USER_AGENT, &self.profile.user_agent)
            .json(&body)
            .send()
            .await
            .map_err(PortError::from)?
            .error_for_status()
            .map_err(PortError::from)?
            .json::<MgateResponse<T>>()
            .await
            .map_err(PortError::from)?;

        unwrap_result(response)
    }
}

/// Extract the single service result, turning any error code into [`PortError::Backend`].
fn unwrap_result<T>(response: MgateResponse<T>) -> Result<T, PortError> {
    check(response.err.as_deref(), response.err_txt)?;
    let result = response
        .service_results
        .into_iter()
        .next()
        .ok_or_else(|| PortError::Backend {
            code: "EMPTY".to_owned(),
            message: "no service result".to_owned(),
        })?;
    check(result.err.as_deref(), result.err_txt)?;
    result.res.ok_or_else(|| PortError::Backend {
        code: "EMPTY".to_owned(),
        message: "service result without body".to_owned(),
    })
}

fn first_station(locations: Vec<Location>) -> Option<StopRef> {
    locations
        .into_iter()
        .filter(|location| location.kind.as_deref().is_none_or(|kind| kind == STATION))
        .find_map(|location| {
            let lid = location.lid?;
            Some(StopRef {
                name: location.name.unwrap_or_else(|| lid.clone()),
                id: lid,
            })
        })
}

fn check(code: Option<&str>, message: Option<String>) -> Result<(), PortError> {
    match code {
        None | Some(OK) => Ok(()),
        Some(code) => Err(PortError::Backend {
            code: code.to_owned(),
            message: message.unwrap_or_default(),
        }),
    }
}

#[async_trait]
impl DeparturePort for HafasPort {
    fn provider(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn resolve_stop(&self, query: &str) -> Result<StopRef, PortError> {
        let query = query.trim();
        if query.starts_with(LID_PREFIX) {
            return Ok(StopRef {
                id: query.to_owned(),
                name: query.to_owned(),
            });
        }

        let result = self
            .call::<LocMatchResult>(ServiceRequest::LocMatch(LocMatchRequest {
                input: LocMatchInput {
                    loc: LocMatchQuery {
                        kind: STATION,
                        name: query,
                    },
                    max_locations: LOC_MATCH_RESULTS,
                    field: STATION,
                },
            }))
            .await?;

        first_station(result.matched.locations)
            .ok_or_else(|| PortError::StopNotFound(query.to_owned()))
    }

    async fn departures(
        &self,
        stop: &StopRef,
        query: &DepartureQuery,
    ) -> Result<Vec<CanonicalDeparture>, PortError> {
        let local = query.reference_time.with_timezone(&self.profile.timezone);
        let request = StationBoardRequest {
            kind: "DEP",
            station: LocationRef { lid: &stop.id },
            max_journeys: query.max_results,
            date: local.format("%Y%m%d").to_string(),
            time: local.format("%H%M%S").to_string(),
            dur: query.lookahead_minutes(),
            journey_filters: vec![JourneyFilter::products(self.profile.products)],
        };
        debug!(
            provider = %self.meta.id,
            stop = %stop.id,
            date = %request.date,
            time = %request.time,
            "requesting station board"
        );

        let board = self
            .call::<StationBoardResult>(ServiceRequest::StationBoard(request))
            .await?;
        let records = resolve_records(board, &stop.name);

        Ok(self.adapter.normalize_decoded(records))
    }
}

/// Build the plugin bundle for the GVH provider.
///
/// `endpoint` replaces the profile's default mgate URL when given.
#[must_use]
pub fn plugin(client: Client, normalizer: Arc<Normalizer>, endpoint: Option<&str>) -> ProviderPlugin {
    let profile = match endpoint {
        Some(endpoint) => HafasProfile::gvh().with_endpoint(endpoint),
        None => HafasProfile::gvh(),
    };
    ProviderPlugin::new(Arc::new(HafasPort::new(client, profile, normalizer)))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono_tz::Europe::Berlin;

    use super::*;

    const STATION_BOARD: &str = r#"{
        "ver": "1.62",
        "lang": "deu",
        "err": "OK",
        "svcResL": [{
            "meth": "StationBoard",
            "err": "OK",
            "res": {
                "common": {
                    "locL": [
                        {"lid": "A=1@O=Bahnstrift, Hannover@L=25000350@", "type": "S", "name": "Bahnstrift, Hannover"}
                    ],
                    "prodL": [
                        {"name": "STR 3", "nameS": "3", "cls": 256},
                        {"name": "Bus 135", "nameS": "135", "cls": 32},
                        {"name": "Ersatzverkehr", "cls": 32}
                    ]
                },
                "type": "DEP",
                "jnyL": [
                    {
                        "jid": "1|1|0|80|6052024", "date": "20240506", "prodX": 0,
                        "dirTxt": "Hannover/Alte Heide",
                        "stbStop": {"locX": 0, "dTimeS": "143200", "dTimeR": "143310", "dPltfS": {"type": "PL", "txt": "1"}}
                    },
                    {
                        "jid": "1|2|0|80|6052024", "date": "20240506", "prodX": 1,
                        "dirTxt": "Lahe (Hannover)",
                        "stbStop": {"locX": 0, "dTimeS": "144000", "dPlatfS": "B", "dCncl": true}
                    },
                    {
                        "jid": "1|3|0|80|6052024", "date": "20240506", "prodX": 2,
                        "dirTxt": "Wettbergen",
                        "stbStop": {"locX": 0, "dTimeS": "144500"}
                    }
                ]
            }
        }]
    }"#;

    #[test]
    fn station_board_fixture_normalizes() {
        let response: MgateResponse<StationBoardResult> = serde_json::from_str(STATION_BOARD).unwrap();
        let board = unwrap_result(response).unwrap();
        let records = resolve_records(board, "Bahnstrift");
        let adapter = HafasAdapter::new(Arc::new(Normalizer::default()), Berlin);

        assert_eq!(records.len(), 3);

        let departures = adapter.normalize_decoded(records);

        assert_eq!(departures.len(), 2);

        let tram = &departures[0];
        assert_eq!(tram.stop_name, "Bahnstrift");
        assert_eq!(tram.line, "3");
        assert_eq!(tram.direction, "Alte Heide");
        assert_eq!(tram.platform.as_deref(), Some("1"));
        assert_eq!(
            tram.realtime_time,
            Some(Berlin.with_ymd_and_hms(2024, 5, 6, 14, 33, 10).unwrap())
        );

        let bus = &departures[1];
        assert_eq!(bus.line, "135");
        assert_eq!(bus.direction, "Lahe");
        assert_eq!(bus.platform.as_deref(), Some("B"));
        assert!(bus.cancelled);
        assert_eq!(bus.realtime_time, None);
    }

    #[test]
    fn backend_error_code_is_reported() {
        let body = r#"{"err": "OK", "svcResL": [{"meth": "StationBoard", "err": "LOCATION", "errTxt": "unknown location"}]}"#;
        let response: MgateResponse<StationBoardResult> = serde_json::from_str(body).unwrap();

        assert!(matches!(
            unwrap_result(response),
            Err(PortError::Backend { code, message }) if code == "LOCATION" && message == "unknown location"
        ));
    }

    #[test]
    fn top_level_error_code_is_reported() {
        let body = r#"{"err": "AUTH", "errTxt": "invalid aid"}"#;
        let response: MgateResponse<StationBoardResult> = serde_json::from_str(body).unwrap();

        assert!(matches!(
            unwrap_result(response),
            Err(PortError::Backend { code, .. }) if code == "AUTH"
        ));
    }

    #[test]
    fn station_board_request_shape() {
        let profile = HafasProfile::gvh();
        let body = MgateRequest {
            client: &profile.client,
            ver: &profile.version,
            lang: &profile.language,
            auth: &profile.auth,
            service_requests: [ServiceRequest::StationBoard(StationBoardRequest {
                kind: "DEP",
                station: LocationRef { lid: "A=1@L=25000350@" },
                max_journeys: 40,
                date: "20240506".to_owned(),
                time: "143000".to_owned(),
                dur: 40,
                journey_filters: vec![JourneyFilter::products(profile.products)],
            })],
        };

        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["auth"]["aid"], "IKSEvZ1SsVdfIRSK");
        assert_eq!(json["client"]["type"], "WEB");
        assert_eq!(json["svcReqL"][0]["meth"], "StationBoard");
        assert_eq!(json["svcReqL"][0]["req"]["stbLoc"]["lid"], "A=1@L=25000350@");
        assert_eq!(json["svcReqL"][0]["req"]["maxJny"], 40);
        assert_eq!(json["svcReqL"][0]["req"]["jnyFltrL"][0]["value"], "831");
    }

    #[test]
    fn loc_match_fixture_parses() {
        let body = r#"{"err": "OK", "svcResL": [{"meth": "LocMatch", "err": "OK", "res": {"match": {"locL": [
            {"lid": "A=1@O=Alte Heide, Hannover@L=25000012@", "type": "S", "name": "Alte Heide, Hannover"}
        ]}}}]}"#;
        let response: MgateResponse<LocMatchResult> = serde_json::from_str(body).unwrap();

        let result = unwrap_result(response).unwrap();

        assert_eq!(result.matched.locations.len(), 1);
        assert_eq!(
            result.matched.locations[0].name.as_deref(),
            Some("Alte Heide, Hannover")
        );
    }

    #[test]
    fn first_station_skips_other_location_types() {
        let body = r#"{"err": "OK", "svcResL": [{"meth": "LocMatch", "err": "OK", "res": {"match": {"locL": [
            {"lid": "A=2@O=Alte Heide 1, Hannover@", "type": "A", "name": "Alte Heide 1, Hannover"},
            {"lid": "A=4@O=Alte Heide Kleingärten@", "type": "P", "name": "Alte Heide Kleingärten"},
            {"lid": "A=1@O=Alte Heide, Hannover@L=25000012@", "type": "S", "name": "Alte Heide, Hannover"},
            {"lid": "A=1@O=Alter Flughafen, Hannover@L=25000013@", "type": "S", "name": "Alter Flughafen, Hannover"}
        ]}}}]}"#;
        let response: MgateResponse<LocMatchResult> = serde_json::from_str(body).unwrap();

        let stop = first_station(unwrap_result(response).unwrap().matched.locations).unwrap();

        assert_eq!(stop.id, "A=1@O=Alte Heide, Hannover@L=25000012@");
        assert_eq!(stop.name, "Alte Heide, Hannover");
    }

    #[test]
    fn no_station_among_candidates() {
        let locations = vec![Location {
            lid: Some("A=2@O=Alte Heide 1, Hannover@".to_owned()),
            name: Some("Alte Heide 1, Hannover".to_owned()),
            kind: Some("A".to_owned()),
        }];

        assert!(first_station(locations).is_none());
    }

    #[test]
    fn loc_match_requests_several_candidates() {
        let request = ServiceRequest::LocMatch(LocMatchRequest {
            input: LocMatchInput {
                loc: LocMatchQuery {
                    kind: STATION,
                    name: "Alte Heide, Hannover",
                },
                max_locations: LOC_MATCH_RESULTS,
                field: STATION,
            },
        });

        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["meth"], "LocMatch");
        assert!(json["req"]["input"]["maxLoc"].as_u64().unwrap() > 1);
    }
}
