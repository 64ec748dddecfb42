use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::position::PositionSample;
use crate::storage::{SampleSource, SampleStore, StorageError};
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::state::AppState;
use crate::windows::{daylight_windows, TimeRange, Window};

#[derive(Debug, Serialize, ToSchema)]
pub struct WelcomeResponse {
    pub message: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SunQuery {
    /// Start of the range (RFC 3339, or ISO 8601 without offset for UTC).
    /// Defaults to `end_time - time_window_size`.
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    #[param(value_type = Option<String>)]
    pub start_time: Option<DateTime<Utc>>,
    /// End of the range. Defaults to the time of the request.
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    #[param(value_type = Option<String>)]
    pub end_time: Option<DateTime<Utc>>,
    /// Range length in seconds, ignored when `start_time` is given.
    #[serde(default)]
    pub time_window_size: Option<i64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PositionQuery {
    /// Return the full position report instead of coordinates only.
    #[serde(default)]
    pub detailed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BriefPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum PositionResponse {
    Brief(BriefPosition),
    Detailed(PositionSample),
}

#[utoipa::path(
    get,
    path = "/",
    tag = "iss",
    responses(
        (status = 200, description = "Service greeting", body = WelcomeResponse)
    )
)]
pub async fn read_root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Welcome to the ISS Tracker!".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/iss/sun",
    tag = "iss",
    params(SunQuery),
    responses(
        (status = 200, description = "Windows during which the ISS was in daylight", body = Vec<Window>),
        (status = 400, description = "Invalid parameters", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    )
)]
pub async fn read_sun(
    State(state): State<AppState>,
    Query(query): Query<SunQuery>,
) -> ApiResult<Json<Vec<Window>>> {
    let span_seconds = query
        .time_window_size
        .unwrap_or(state.config.api.default_time_window_seconds);
    let span = Duration::try_seconds(span_seconds)
        .filter(|d| *d > Duration::zero())
        .ok_or_else(|| ApiError::Validation("time_window_size must be positive".into()))?;

    let range = TimeRange::resolve(query.start_time, query.end_time, span, Utc::now())
        .ok_or_else(|| {
            ApiError::Validation("time_window_size reaches before the earliest supported time".into())
        })?;
    let samples = with_store(&state, move |store| {
        store.samples_between(range.start, range.end)
    })
    .await?;
    log::debug!(
        "Computing daylight windows from {} samples between {} and {}",
        samples.len(),
        range.start,
        range.end
    );

    Ok(Json(daylight_windows(&samples)))
}

#[utoipa::path(
    get,
    path = "/iss/position",
    tag = "iss",
    params(PositionQuery),
    responses(
        (status = 200, description = "Latest stored position", body = PositionResponse),
        (status = 404, description = "No position stored yet", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    )
)]
pub async fn read_position(
    State(state): State<AppState>,
    Query(query): Query<PositionQuery>,
) -> ApiResult<Json<PositionResponse>> {
    let latest = with_store(&state, |store| store.latest_sample())
        .await?
        .ok_or(ApiError::NotFound("position_not_found"))?;

    let response = if query.detailed {
        PositionResponse::Detailed(latest)
    } else {
        PositionResponse::Brief(BriefPosition {
            latitude: latest.latitude,
            longitude: latest.longitude,
            timestamp: latest.timestamp,
        })
    };
    Ok(Json(response))
}

/// Runs a store query on the blocking pool.
async fn with_store<F, R>(state: &AppState, query: F) -> ApiResult<R>
where
    F: FnOnce(&SampleStore) -> Result<R, StorageError> + Send + 'static,
    R: Send + 'static,
{
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || query(&store))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

fn deserialize_optional_datetime<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(s) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    parse_datetime(&s).map(Some).map_err(serde::de::Error::custom)
}

/// Accepts RFC 3339, or a naive ISO 8601 timestamp interpreted as UTC.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.and_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_offset_and_naive_timestamps() {
        let expected = DateTime::parse_from_rfc3339("2023-11-11T01:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parse_datetime("2023-11-11T01:00:00Z").unwrap(), expected);
        assert_eq!(parse_datetime("2023-11-11T02:00:00+01:00").unwrap(), expected);
        assert_eq!(parse_datetime("2023-11-11T01:00:00").unwrap(), expected);
        assert!(parse_datetime("yesterday").is_err());
    }
}
