//! Request and response bodies of the mgate JSON protocol.

use serde::{Deserialize, Serialize};

use crate::profile::{Auth, ClientInfo};

/// Status value of a successful request.
pub(crate) const OK: &str = "OK";

#[derive(Debug, Serialize)]
pub(crate) struct MgateRequest<'a> {
    pub(crate) client: &'a ClientInfo,
    pub(crate) ver: &'a str,
    pub(crate) lang: &'a str,
    pub(crate) auth: &'a Auth,
    #[serde(rename = "svcReqL")]
    pub(crate) service_requests: [ServiceRequest<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(tag = "meth", content = "req")]
pub(crate) enum ServiceRequest<'a> {
    StationBoard(StationBoardRequest<'a>),
    LocMatch(LocMatchRequest<'a>),
}

#[derive(Debug, Serialize)]
pub(crate) struct StationBoardRequest<'a> {
    #[serde(rename = "type")]
    pub(crate) kind: &'static str,
    #[serde(rename = "stbLoc")]
    pub(crate) station: LocationRef<'a>,
    #[serde(rename = "maxJny")]
    pub(crate) max_journeys: usize,
    /// `YYYYMMDD`
    pub(crate) date: String,
    /// `HHMMSS`
    pub(crate) time: String,
    /// Minutes.
    pub(crate) dur: i64,
    #[serde(rename = "jnyFltrL")]
    pub(crate) journey_filters: Vec<JourneyFilter>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LocationRef<'a> {
    pub(crate) lid: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct JourneyFilter {
    #[serde(rename = "type")]
    pub(crate) kind: &'static str,
    pub(crate) mode: &'static str,
    pub(crate) value: String,
}

impl JourneyFilter {
    pub(crate) fn products(mask: u32) -> Self {
        Self {
            kind: "PROD",
            mode: "INC",
            value: mask.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct LocMatchRequest<'a> {
    pub(crate) input: LocMatchInput<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LocMatchInput<'a> {
    pub(crate) loc: LocMatchQuery<'a>,
    #[serde(rename = "maxLoc")]
    pub(crate) max_locations: usize,
    pub(crate) field: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct LocMatchQuery<'a> {
    #[serde(rename = "type")]
    pub(crate) kind: &'static str,
    pub(crate) name: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MgateResponse<T> {
    pub(crate) err: Option<String>,
    #[serde(rename = "errTxt")]
    pub(crate) err_txt: Option<String>,
    #[serde(rename = "svcResL", default = "Vec::new")]
    pub(crate) service_results: Vec<ServiceResult<T>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServiceResult<T> {
    pub(crate) err: Option<String>,
    #[serde(rename = "errTxt")]
    pub(crate) err_txt: Option<String>,
    pub(crate) res: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Common {
    #[serde(rename = "locL", default)]
    pub(crate) locations: Vec<Location>,
    #[serde(rename = "prodL", default)]
    pub(crate) products: Vec<Product>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Location {
    pub(crate) lid: Option<String>,
    pub(crate) name: Option<String>,
    /// `S` for stations.
    #[serde(rename = "type")]
    pub(crate) kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Product {
    pub(crate) name: Option<String>,
    #[serde(rename = "nameS")]
    pub(crate) short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StationBoardResult {
    #[serde(default)]
    pub(crate) common: Common,
    /// Decoded one by one so a single odd journey cannot spoil the board.
    #[serde(rename = "jnyL", default)]
    pub(crate) journeys: Vec<serde_json::Value>,
}

/// One entry of a station board.
#[derive(Debug, Clone, Deserialize)]
pub struct Journey {
    /// Journey id.
    pub jid: Option<String>,
    /// Operating day, `YYYYMMDD`.
    pub date: Option<String>,
    /// Index into the product list.
    #[serde(rename = "prodX")]
    pub product_index: Option<usize>,
    /// Destination text.
    #[serde(rename = "dirTxt")]
    pub direction: Option<String>,
    /// Whole journey cancelled.
    #[serde(rename = "isCncl", default)]
    pub cancelled: bool,
    /// Call at the requested stop.
    #[serde(rename = "stbStop")]
    pub stop: BoardStop,
}

/// Departure details at the board's stop.
///
/// Older servers report platforms as plain strings under `dPlatfS`/`dPlatfR`,
/// newer ones as objects under `dPltfS`/`dPltfR`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoardStop {
    /// Index into the location list.
    #[serde(rename = "locX")]
    pub location_index: Option<usize>,
    /// Scheduled time, `HHMMSS` or `DDHHMMSS`.
    #[serde(rename = "dTimeS")]
    pub time_scheduled: Option<String>,
    /// Realtime time, same format.
    #[serde(rename = "dTimeR")]
    pub time_realtime: Option<String>,
    /// UTC offset of the times in minutes.
    #[serde(rename = "dTZOffset")]
    pub tz_offset: Option<i32>,
    /// Scheduled platform, newer servers.
    #[serde(rename = "dPltfS")]
    pub platform_scheduled: Option<Platform>,
    /// Realtime platform, newer servers.
    #[serde(rename = "dPltfR")]
    pub platform_realtime: Option<Platform>,
    /// Scheduled platform, older servers.
    #[serde(rename = "dPlatfS")]
    pub legacy_platform_scheduled: Option<String>,
    /// Realtime platform, older servers.
    #[serde(rename = "dPlatfR")]
    pub legacy_platform_realtime: Option<String>,
    /// Cancelled at this stop.
    #[serde(rename = "dCncl", default)]
    pub cancelled: bool,
}

/// Platform object of newer servers.
#[derive(Debug, Clone, Deserialize)]
pub struct Platform {
    /// Platform label.
    pub txt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LocMatchResult {
    #[serde(rename = "match")]
    pub(crate) matched: LocMatchList,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LocMatchList {
    #[serde(rename = "locL", default)]
    pub(crate) locations: Vec<Location>,
}
