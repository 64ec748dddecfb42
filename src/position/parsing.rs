use chrono::DateTime;
use serde::Deserialize;

use super::error::RecordError;
use super::types::{PositionSample, Visibility};

/// Position report as served by the upstream API.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PositionRecord {
    pub name: String,
    pub id: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub velocity: f64,
    pub visibility: Visibility,
    pub footprint: f64,
    pub timestamp: i64,
    pub daynum: f64,
    pub solar_lat: f64,
    pub solar_lon: f64,
    pub units: String,
}

impl PositionRecord {
    pub fn from_json(value: serde_json::Value) -> Result<Self, RecordError> {
        Ok(serde_json::from_value(value)?)
    }
}

impl TryFrom<PositionRecord> for PositionSample {
    type Error = RecordError;

    fn try_from(record: PositionRecord) -> Result<Self, Self::Error> {
        let timestamp = DateTime::from_timestamp(record.timestamp, 0)
            .ok_or(RecordError::Timestamp(record.timestamp))?;

        Ok(PositionSample {
            name: record.name,
            satellite_id: record.id,
            latitude: record.latitude,
            longitude: record.longitude,
            altitude: record.altitude,
            velocity: record.velocity,
            visibility: record.visibility,
            footprint: record.footprint,
            timestamp,
            daynum: record.daynum,
            solar_lat: record.solar_lat,
            solar_lon: record.solar_lon,
            units: record.units,
        })
    }
}

impl PositionSample {
    pub fn from_json(value: serde_json::Value) -> Result<Self, RecordError> {
        PositionRecord::from_json(value)?.try_into()
    }
}
