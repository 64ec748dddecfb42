use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// Whether the station is lit by the sun at the time of a sample.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Visibility {
    Daylight,
    Eclipsed,
}

impl Visibility {
    pub fn is_daylight(self) -> bool {
        matches!(self, Visibility::Daylight)
    }

    pub fn is_eclipsed(self) -> bool {
        matches!(self, Visibility::Eclipsed)
    }
}

/// One position report of the tracked satellite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PositionSample {
    pub name: String,
    pub satellite_id: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub velocity: f64,
    pub visibility: Visibility,
    pub footprint: f64,
    pub timestamp: DateTime<Utc>,
    pub daynum: f64,
    pub solar_lat: f64,
    pub solar_lon: f64,
    pub units: String,
}
