use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

use crate::poller::SampleSink;
use crate::position::{PositionSample, Visibility};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid visibility in row: {0}")]
    Visibility(String),
    #[error("invalid timestamp in row: {0}")]
    Timestamp(i64),
}

/// Read access to stored samples, ordered by ascending timestamp.
pub trait SampleSource {
    /// Samples with `start <= timestamp <= end`.
    fn samples_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PositionSample>, StorageError>;

    fn latest_sample(&self) -> Result<Option<PositionSample>, StorageError>;
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS iss_positions (
        name TEXT NOT NULL,
        satellite_id INTEGER NOT NULL,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL,
        altitude REAL NOT NULL,
        velocity REAL NOT NULL,
        visibility TEXT NOT NULL,
        footprint REAL NOT NULL,
        timestamp INTEGER NOT NULL,
        daynum REAL NOT NULL,
        solar_lat REAL NOT NULL,
        solar_lon REAL NOT NULL,
        units TEXT NOT NULL,
        PRIMARY KEY (satellite_id, timestamp)
    );

    CREATE INDEX IF NOT EXISTS idx_positions_timestamp ON iss_positions(timestamp);
"#;

const COLUMNS: &str = "name, satellite_id, latitude, longitude, altitude, velocity, visibility, \
                       footprint, timestamp, daynum, solar_lat, solar_lon, units";

/// SQLite-backed position history.
pub struct SampleStore {
    conn: Mutex<Connection>,
}

impl SampleStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    /// Opens a database that already exists, without creating one.
    /// Returns `None` when nothing is stored at `path` yet.
    pub fn open_existing<P: AsRef<Path>>(path: P) -> Result<Option<Self>, StorageError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::with_connection(conn).map(Some)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn insert(&self, sample: &PositionSample) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO iss_positions ({}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                COLUMNS
            ),
            params![
                sample.name,
                sample.satellite_id,
                sample.latitude,
                sample.longitude,
                sample.altitude,
                sample.velocity,
                sample.visibility.to_string(),
                sample.footprint,
                sample.timestamp.timestamp(),
                sample.daynum,
                sample.solar_lat,
                sample.solar_lon,
                sample.units,
            ],
        )?;
        Ok(())
    }
}

impl SampleSink for SampleStore {
    type Error = StorageError;

    fn add_sample(&self, sample: &PositionSample) -> Result<(), Self::Error> {
        self.insert(sample)
    }
}

impl SampleSource for SampleStore {
    fn samples_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PositionSample>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM iss_positions \
             WHERE timestamp BETWEEN ?1 AND ?2 \
             ORDER BY timestamp ASC",
            COLUMNS
        ))?;

        let rows = stmt.query_map(params![start.timestamp(), end.timestamp()], read_row)?;
        let mut samples = Vec::new();
        for row in rows {
            samples.push(row?.into_sample()?);
        }
        Ok(samples)
    }

    fn latest_sample(&self) -> Result<Option<PositionSample>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM iss_positions ORDER BY timestamp DESC LIMIT 1",
                    COLUMNS
                ),
                [],
                read_row,
            )
            .optional()?;
        row.map(StoredRow::into_sample).transpose()
    }
}

/// Raw column values; decoding into domain types happens outside rusqlite.
struct StoredRow {
    name: String,
    satellite_id: u32,
    latitude: f64,
    longitude: f64,
    altitude: f64,
    velocity: f64,
    visibility: String,
    footprint: f64,
    timestamp: i64,
    daynum: f64,
    solar_lat: f64,
    solar_lon: f64,
    units: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<StoredRow> {
    Ok(StoredRow {
        name: row.get(0)?,
        satellite_id: row.get(1)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        altitude: row.get(4)?,
        velocity: row.get(5)?,
        visibility: row.get(6)?,
        footprint: row.get(7)?,
        timestamp: row.get(8)?,
        daynum: row.get(9)?,
        solar_lat: row.get(10)?,
        solar_lon: row.get(11)?,
        units: row.get(12)?,
    })
}

impl StoredRow {
    fn into_sample(self) -> Result<PositionSample, StorageError> {
        let visibility: Visibility = self
            .visibility
            .parse()
            .map_err(|_| StorageError::Visibility(self.visibility.clone()))?;
        let timestamp = DateTime::from_timestamp(self.timestamp, 0)
            .ok_or(StorageError::Timestamp(self.timestamp))?;

        Ok(PositionSample {
            name: self.name,
            satellite_id: self.satellite_id,
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude,
            velocity: self.velocity,
            visibility,
            footprint: self.footprint,
            timestamp,
            daynum: self.daynum,
            solar_lat: self.solar_lat,
            solar_lon: self.solar_lon,
            units: self.units,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn sample(timestamp: i64, visibility: Visibility) -> PositionSample {
        PositionSample {
            name: "iss".into(),
            satellite_id: 25544,
            latitude: 3.7993878441372,
            longitude: 100.21269424675,
            altitude: 418.710774125,
            velocity: 27581.144139331,
            visibility,
            footprint: 4500.8986337084,
            timestamp: at(timestamp),
            daynum: 2460259.4678472,
            solar_lat: -17.276144046636,
            solar_lon: 187.56023046706,
            units: "kilometers".into(),
        }
    }

    #[test]
    fn stored_samples_come_back_intact() {
        let store = SampleStore::open_in_memory().unwrap();
        let original = sample(1_699_658_022, Visibility::Daylight);

        store.add_sample(&original).unwrap();

        assert_eq!(store.latest_sample().unwrap(), Some(original));
    }

    #[test]
    fn range_query_is_inclusive_and_ascending() {
        let store = SampleStore::open_in_memory().unwrap();
        for ts in [400, 100, 300, 200, 500] {
            store.add_sample(&sample(ts, Visibility::Eclipsed)).unwrap();
        }

        let found: Vec<i64> = store
            .samples_between(at(200), at(400))
            .unwrap()
            .iter()
            .map(|s| s.timestamp.timestamp())
            .collect();

        assert_eq!(found, vec![200, 300, 400]);
    }

    #[test]
    fn latest_sample_of_empty_store_is_none() {
        let store = SampleStore::open_in_memory().unwrap();
        assert_eq!(store.latest_sample().unwrap(), None);
    }

    #[test]
    fn latest_sample_picks_greatest_timestamp() {
        let store = SampleStore::open_in_memory().unwrap();
        store.add_sample(&sample(300, Visibility::Daylight)).unwrap();
        store.add_sample(&sample(100, Visibility::Eclipsed)).unwrap();

        let latest = store.latest_sample().unwrap().unwrap();
        assert_eq!(latest.timestamp, at(300));
        assert_eq!(latest.visibility, Visibility::Daylight);
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let store = SampleStore::open_in_memory().unwrap();
        store.add_sample(&sample(100, Visibility::Daylight)).unwrap();

        let result = store.add_sample(&sample(100, Visibility::Eclipsed));
        assert!(matches!(result, Err(StorageError::Sqlite(_))));
    }

    #[test]
    fn unknown_visibility_column_is_reported() {
        let store = SampleStore::open_in_memory().unwrap();
        store.add_sample(&sample(100, Visibility::Daylight)).unwrap();
        store
            .conn
            .lock()
            .unwrap()
            .execute("UPDATE iss_positions SET visibility = 'dusk'", [])
            .unwrap();

        assert!(matches!(
            store.latest_sample(),
            Err(StorageError::Visibility(v)) if v == "dusk"
        ));
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let store = SampleStore::open(tmp.path()).unwrap();
            store.add_sample(&sample(100, Visibility::Daylight)).unwrap();
        }

        let store = SampleStore::open(tmp.path()).unwrap();
        assert_eq!(store.samples_between(at(0), at(1_000)).unwrap().len(), 1);
    }

    #[test]
    fn open_existing_does_not_create_a_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locations.db");

        assert!(SampleStore::open_existing(&path).unwrap().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn open_existing_reads_recorded_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locations.db");
        SampleStore::open(&path)
            .unwrap()
            .add_sample(&sample(100, Visibility::Daylight))
            .unwrap();

        let store = SampleStore::open_existing(&path).unwrap().unwrap();
        assert_eq!(store.samples_between(at(0), at(1_000)).unwrap().len(), 1);
    }
}
